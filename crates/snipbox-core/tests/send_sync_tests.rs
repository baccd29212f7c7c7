//! Tests to verify that all public types are Send + Sync as required.

use snipbox_core::stats::EngineStats;
use snipbox_core::*;

const fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_domain_types_are_send_sync() {
    assert_send_sync::<ModuleName>();
    assert_send_sync::<SessionId>();
    assert_send_sync::<MemoryLimit>();
    assert_send_sync::<Diagnostic>();
}

#[test]
fn test_config_types_are_send_sync() {
    assert_send_sync::<EngineConfig>();
    assert_send_sync::<ResolverConfig>();
    assert_send_sync::<TerminalConfig>();
    assert_send_sync::<EngineStats>();
}

#[test]
fn test_error_is_send_sync() {
    assert_send_sync::<Error>();
}
