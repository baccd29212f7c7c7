//! Shared Wasmtime engine.

use snipbox_core::{Error, Result};
use wasmtime::{Config, Engine, OptLevel, Strategy, WasmBacktraceDetails};

/// Creates the engine every compile and run in the process shares.
///
/// Async support lets host functions await the terminal, and epoch
/// interruption lets long-running guest loops yield so cancellation and
/// timeouts are observed.
///
/// # Errors
///
/// Returns [`Error::WasmError`] if Wasmtime rejects the configuration.
pub fn build_engine() -> Result<Engine> {
    let mut config = Config::new();
    config.async_support(true);
    config.epoch_interruption(true);
    config.strategy(Strategy::Cranelift);
    config.cranelift_opt_level(OptLevel::Speed);
    config.wasm_backtrace_details(WasmBacktraceDetails::Enable);

    Engine::new(&config).map_err(|e| Error::WasmError {
        message: format!("failed to create Wasmtime engine: {e}"),
    })
}

/// Core wasm binary header: `\0asm` magic followed by version 1.
pub const WASM_HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

/// Whether `bytes` start with the core wasm header.
#[must_use]
pub fn has_wasm_header(bytes: &[u8]) -> bool {
    bytes.starts_with(&WASM_HEADER)
}
