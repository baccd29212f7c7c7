//! Engine facade tying the resolver, compiler and execution host together.

use crate::boundary::BoundaryStats;
use crate::cache::ArtifactCache;
use crate::compiler::{CompiledArtifact, compile};
use crate::engine::build_engine;
use crate::executor::{ExecutionHost, RunOutcome};
use crate::resolver::{ModuleFetcher, ReferenceResolver, ReferenceSet};
use crate::session::RunSession;
use snipbox_core::stats::EngineStats;
use snipbox_core::{EngineConfig, ResolverConfig, Result, TerminalConfig};
use snipbox_terminal::{TerminalSession, TerminalTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use wasmtime::Engine;

#[derive(Debug, Default)]
struct Counters {
    compilations: AtomicU32,
    compile_failures: AtomicU32,
    cache_hits: AtomicU32,
    runs: AtomicU32,
    completed: AtomicU32,
    failed: AtomicU32,
    cancelled: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Compiles and runs snippets.
///
/// One engine serves the whole process: the reference set is loaded once
/// and shared by every compile, while each run gets its own boundary.
///
/// # Examples
///
/// ```no_run
/// use snipbox_core::{EngineConfig, ResolverConfig, TerminalConfig};
/// use snipbox_runtime::SnippetEngine;
/// use snipbox_terminal::MemoryTransport;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Arc::new(SnippetEngine::new(
///     EngineConfig::default(),
///     ResolverConfig::new("https://example.com/app"),
///     TerminalConfig::default(),
/// )?);
///
/// let transport = Arc::new(MemoryTransport::new());
/// let session = engine.open_session(transport.clone());
/// let report = session.run(r#"(call $println (i32.const 0) (i32.const 0))"#).await?;
/// println!("{:?}", report.outcome);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SnippetEngine {
    engine: Engine,
    terminal: TerminalConfig,
    resolver: ReferenceResolver,
    host: ExecutionHost,
    cache: ArtifactCache,
    counters: Counters,
}

impl SnippetEngine {
    /// Creates an engine fetching references from the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`snipbox_core::Error::ConfigError`] for invalid settings and
    /// [`snipbox_core::Error::WasmError`] if Wasmtime cannot start.
    pub fn new(config: EngineConfig, resolver: ResolverConfig, terminal: TerminalConfig) -> Result<Self> {
        resolver.validate()?;
        let engine = build_engine()?;
        let resolver = ReferenceResolver::new(resolver, engine.clone());
        Self::assemble(engine, config, resolver, terminal)
    }

    /// Creates an engine with an explicit reference fetcher.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_fetcher(
        config: EngineConfig,
        resolver: ResolverConfig,
        terminal: TerminalConfig,
        fetcher: Arc<dyn ModuleFetcher>,
    ) -> Result<Self> {
        resolver.validate()?;
        let engine = build_engine()?;
        let resolver = ReferenceResolver::with_fetcher(resolver, engine.clone(), fetcher);
        Self::assemble(engine, config, resolver, terminal)
    }

    fn assemble(
        engine: Engine,
        config: EngineConfig,
        resolver: ReferenceResolver,
        terminal: TerminalConfig,
    ) -> Result<Self> {
        config.validate()?;
        terminal.validate()?;

        let cache = ArtifactCache::new(config.artifact_cache_size);
        let host = ExecutionHost::new(engine.clone(), config)?;
        Ok(Self {
            engine,
            terminal,
            resolver,
            host,
            cache,
            counters: Counters::default(),
        })
    }

    /// Loads the reference set on first use.
    pub async fn ensure_references(&self) -> Arc<ReferenceSet> {
        self.resolver.ensure_loaded().await
    }

    /// Compiles `text`, reusing a cached artifact when possible.
    pub async fn compile(&self, text: &str) -> Arc<CompiledArtifact> {
        let references = self.ensure_references().await;
        Counters::bump(&self.counters.compilations);

        if let Some(artifact) = self.cache.get(text) {
            Counters::bump(&self.counters.cache_hits);
            tracing::debug!(hash = %artifact.hash(), "compile cache hit");
            return artifact;
        }

        let artifact = Arc::new(compile(&self.engine, &references, text));
        if !artifact.success() {
            Counters::bump(&self.counters.compile_failures);
        }
        self.cache.insert(Arc::clone(&artifact));
        artifact
    }

    /// Runs a compiled artifact against `session`.
    ///
    /// # Errors
    ///
    /// See [`ExecutionHost::execute`].
    pub async fn execute(
        &self,
        artifact: &CompiledArtifact,
        session: &TerminalSession,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let references = self.ensure_references().await;
        Counters::bump(&self.counters.runs);

        let result = self.host.execute(artifact, &references, session, cancel).await;
        match &result {
            Ok(RunOutcome::Completed { .. }) => Counters::bump(&self.counters.completed),
            Ok(RunOutcome::Cancelled) => Counters::bump(&self.counters.cancelled),
            Ok(RunOutcome::Failed { .. }) | Err(_) => Counters::bump(&self.counters.failed),
            Ok(RunOutcome::CompileFailed) => {}
        }
        result
    }

    /// Opens a terminal session over `transport` and wraps it in a
    /// [`RunSession`].
    #[must_use]
    pub fn open_session(self: &Arc<Self>, transport: Arc<dyn TerminalTransport>) -> RunSession {
        let terminal = TerminalSession::open(transport, &self.terminal);
        RunSession::new(Arc::clone(self), terminal)
    }

    /// Terminal settings sessions are opened with.
    #[must_use]
    pub const fn terminal_config(&self) -> &TerminalConfig {
        &self.terminal
    }

    /// The reference set, if loaded.
    #[must_use]
    pub fn references(&self) -> Option<Arc<ReferenceSet>> {
        self.resolver.loaded()
    }

    /// Boundary counters.
    #[must_use]
    pub fn boundary_stats(&self) -> BoundaryStats {
        self.host.boundary_stats()
    }

    /// Snapshot of every counter.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let load = |counter: &AtomicU32| counter.load(Ordering::Relaxed);
        EngineStats {
            compilations: load(&self.counters.compilations),
            compile_failures: load(&self.counters.compile_failures),
            cache_hits: load(&self.counters.cache_hits),
            runs: load(&self.counters.runs),
            completed: load(&self.counters.completed),
            failed: load(&self.counters.failed),
            cancelled: load(&self.counters.cancelled),
            references_loaded: self
                .resolver
                .loaded()
                .map_or(0, |set| u32::try_from(set.len()).unwrap_or(u32::MAX)),
        }
    }
}
