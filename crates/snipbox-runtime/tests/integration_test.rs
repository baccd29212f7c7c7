//! End-to-end tests: compile and run snippets against an in-memory terminal.

use async_trait::async_trait;
use snipbox_core::{EngineConfig, ResolverConfig, Result, TerminalConfig};
use snipbox_runtime::resolver::ModuleFetcher;
use snipbox_runtime::{RunOutcome, RunSession, RunState, SnippetEngine};
use snipbox_terminal::{MemoryTransport, ambient};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct StaticFiles {
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl StaticFiles {
    fn with_module(mut self, name: &str, text: &str) -> Self {
        let bytes = wat::parse_str(text).expect("valid library");
        self.files.insert(format!("_framework/{name}.wasm"), bytes);
        self
    }
}

#[async_trait]
impl ModuleFetcher for StaticFiles {
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.get(path).cloned())
    }
}

const MATH: &str = r#"(module
  (func (export "square") (param i32) (result i32)
    local.get 0
    local.get 0
    i32.mul))"#;

const SPIN: &str = "(loop $forever (br $forever))";

fn engine_with(config: EngineConfig, files: StaticFiles) -> (Arc<SnippetEngine>, Arc<StaticFiles>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("snipbox_runtime=debug")
        .with_test_writer()
        .try_init();

    let files = Arc::new(files);
    let resolver = ResolverConfig::new("static").with_fingerprint_manifest(None);
    let engine = SnippetEngine::with_fetcher(
        config,
        resolver,
        TerminalConfig::default(),
        files.clone(),
    )
    .expect("engine starts");
    (Arc::new(engine), files)
}

fn engine() -> Arc<SnippetEngine> {
    engine_with(EngineConfig::default(), StaticFiles::default().with_module("math", MATH)).0
}

fn open(engine: &Arc<SnippetEngine>) -> (Arc<RunSession>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let session = Arc::new(engine.open_session(transport.clone()));
    (session, transport)
}

#[tokio::test]
async fn test_bare_hello_prints_one_line() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run("(data (i32.const 16) \"Hello\")\n(call $println (i32.const 16) (i32.const 5))\n")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 0 });
    assert!(report.compile.unwrap().success);
    assert_eq!(transport.output(), "Hello\n");
    assert_eq!(session.state(), RunState::Completed);
    assert!(!ambient::is_installed(session.terminal().output()));

    let boundaries = engine.boundary_stats();
    assert_eq!(boundaries.created, 1);
    assert_eq!(boundaries.unloaded, 1);
    assert_eq!(boundaries.active, 0);
}

#[tokio::test]
async fn test_snippet_with_private_memory_can_print() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run("(memory 1)\n(data (i32.const 0) \"Hi\")\n(call $println (i32.const 0) (i32.const 2))")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 0 });
    assert_eq!(transport.output(), "Hi\n");
}

#[tokio::test]
async fn test_snippet_failure_is_reported_and_ambient_restored() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run("(data (i32.const 0) \"boom\")\n(call $fail (i32.const 0) (i32.const 4))")
        .await
        .unwrap();

    match report.outcome {
        RunOutcome::Failed { message, .. } => assert_eq!(message, "boom"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(transport.output().contains("boom"));
    assert!(!ambient::is_installed(session.terminal().output()));
    assert_eq!(session.state(), RunState::Failed);
}

#[tokio::test]
async fn test_trap_reports_trace() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run(
            r#"(module
  (func $explode unreachable)
  (func (export "main") (call $explode)))"#,
        )
        .await
        .unwrap();

    let RunOutcome::Failed { message, trace } = report.outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("unreachable"));
    assert!(!trace.is_empty());
    assert!(transport.output().contains("Error: "));
}

#[tokio::test]
async fn test_cancel_mid_run() {
    let engine = engine();
    let (session, transport) = open(&engine);
    let mut states = session.subscribe();

    let (report, ()) = tokio::join!(session.run(SPIN), async {
        states
            .wait_for(|state| *state == RunState::Executing)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.cancel();
    });

    assert_eq!(report.unwrap().outcome, RunOutcome::Cancelled);
    assert!(transport.output().contains("Execution cancelled."));
    assert!(!ambient::is_installed(session.terminal().output()));

    let boundaries = engine.boundary_stats();
    assert_eq!(boundaries.created, 1);
    assert_eq!(boundaries.unloaded, 1);
    assert_eq!(boundaries.active, 0);
}

#[tokio::test]
async fn test_cancel_during_key_read() {
    let engine = engine();
    let (session, _transport) = open(&engine);
    let mut states = session.subscribe();

    let (report, ()) = tokio::join!(session.run("(drop (call $read_key))"), async {
        states
            .wait_for(|state| *state == RunState::Executing)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.cancel();
    });

    assert_eq!(report.unwrap().outcome, RunOutcome::Cancelled);
    assert!(!session.terminal().input().is_read_pending());
}

#[tokio::test]
async fn test_new_run_supersedes_active_run() {
    let engine = engine();
    let (session, transport) = open(&engine);
    let mut states = session.subscribe();

    let (first, second) = tokio::join!(session.run(SPIN), async {
        states
            .wait_for(|state| *state == RunState::Executing)
            .await
            .unwrap();
        session.run("(call $print_i32 (i32.const 2))").await
    });

    assert_eq!(first.unwrap().outcome, RunOutcome::Cancelled);
    assert_eq!(second.unwrap().outcome, RunOutcome::Completed { exit_code: 0 });
    assert!(transport.output().ends_with('2'));
    assert_eq!(engine.boundary_stats().created, 2);
    assert_eq!(engine.boundary_stats().active, 0);
}

#[tokio::test]
async fn test_timeout_fails_run() {
    let config = EngineConfig::builder()
        .execution_timeout(Duration::from_millis(100))
        .build();
    let (engine, _) = engine_with(config, StaticFiles::default());
    let (session, _transport) = open(&engine);

    let report = session.run(SPIN).await.unwrap();
    let RunOutcome::Failed { message, .. } = report.outcome else {
        panic!("expected timeout failure");
    };
    assert!(message.contains("timed out"));
    assert_eq!(engine.boundary_stats().active, 0);
}

#[tokio::test]
async fn test_missing_reference_is_a_diagnostic() {
    let (engine, files) = engine_with(
        EngineConfig::default(),
        StaticFiles::default().with_module("math", MATH),
    );

    let references = engine.ensure_references().await;
    assert_eq!(references.len(), 1);
    assert_eq!(references.failures().len(), 1);
    assert!(references.failures()[0].is_reference_failure());

    let fetches = files.fetches.load(Ordering::SeqCst);
    engine.ensure_references().await;
    assert_eq!(files.fetches.load(Ordering::SeqCst), fetches);

    let (session, _transport) = open(&engine);
    let report = session
        .run(r#"(import "text" "upper" (func $upper (param i32 i32)))"#)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::CompileFailed);
    let compile = report.compile.unwrap();
    assert!(!compile.success);
    assert!(compile.diagnostics.iter().any(|d| d.message.contains("`text`")));
    assert_eq!(engine.boundary_stats().created, 0);
    assert_eq!(session.state(), RunState::CompileFailed);
}

#[tokio::test]
async fn test_reference_module_call() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run(
            r#"(import "math" "square" (func $square (param i32) (result i32)))
(call $print_i32 (call $square (i32.const 7)))"#,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 0 });
    assert_eq!(transport.output(), "49");
}

#[tokio::test]
async fn test_exit_code_and_cache() {
    let engine = engine();
    let (session, _transport) = open(&engine);
    let source = r#"(module (func (export "main") (result i32) i32.const 7))"#;

    for _ in 0..2 {
        let report = session.run(source).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 7 });
    }

    let stats = engine.stats();
    assert_eq!(stats.compilations, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.references_loaded, 1);
}

#[tokio::test]
async fn test_missing_entry_point_loads_nothing() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session.run("(module (func $helper))").await.unwrap();
    let RunOutcome::Failed { message, .. } = report.outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("No entry point"));
    assert!(transport.output().contains("No entry point"));
    assert_eq!(engine.boundary_stats().created, 0);
}

#[tokio::test]
async fn test_compile_failure_never_executes() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session.run("(call $no_such_function)").await.unwrap();
    assert_eq!(report.outcome, RunOutcome::CompileFailed);
    assert!(transport.events().is_empty());
    assert_eq!(engine.stats().runs, 0);
    assert_eq!(engine.stats().compile_failures, 1);
    assert_eq!(engine.boundary_stats().created, 0);
}

#[tokio::test]
async fn test_read_line_echoes_and_returns_text() {
    let engine = engine();
    let (session, transport) = open(&engine);
    transport.push_text("hi\n");

    let report = session
        .run(
            r#"(module
  (import "console" "read_line" (func $read_line (param i32 i32) (result i32)))
  (import "console" "print" (func $print (param i32 i32)))
  (memory (export "memory") 1)
  (func (export "main")
    (local $n i32)
    (local.set $n (call $read_line (i32.const 0) (i32.const 64)))
    (call $print (i32.const 0) (local.get $n))))"#,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 0 });
    assert_eq!(transport.output(), "hi\nhi");
}

#[tokio::test]
async fn test_markup_and_cursor_functions() {
    let engine = engine();
    let (session, transport) = open(&engine);

    let report = session
        .run(
            r#"(data (i32.const 0) "[bold]hi[/]")
(call $markup_line (i32.const 0) (i32.const 11))
(call $cursor_up (i32.const 1))
(call $clear (i32.const 1))"#,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed { exit_code: 0 });
    let output = transport.output();
    assert!(output.contains("\x1b[1mhi\x1b[0m"));
    assert!(output.contains("\x1b[1A"));
    assert_eq!(transport.clear_count(), 1);
    assert_eq!(session.terminal().output().cursor(), (0, 0));
}
