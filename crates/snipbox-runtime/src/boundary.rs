//! Execution boundaries.
//!
//! A boundary is one [`Store`] holding every instance a run creates: the
//! snippet plus private instances of the reference modules it imports.
//! Dropping the boundary releases all of them at once.

use crate::compiler::{EntryPoint, EntrySignature};
use crate::host_functions::{CONSOLE_MODULE, HostState, link_console};
use crate::resolver::ReferenceSet;
use serde::{Deserialize, Serialize};
use snipbox_core::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use wasmtime::{Engine, Instance, Linker, Module, Store};

/// Counts boundaries as they are created and unloaded.
#[derive(Debug, Default)]
pub struct BoundaryTracker {
    created: AtomicU64,
    unloaded: AtomicU64,
}

impl BoundaryTracker {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts.
    #[must_use]
    pub fn stats(&self) -> BoundaryStats {
        let created = self.created.load(Ordering::Acquire);
        let unloaded = self.unloaded.load(Ordering::Acquire);
        BoundaryStats {
            created,
            unloaded,
            active: created.saturating_sub(unloaded),
        }
    }
}

/// Snapshot of a [`BoundaryTracker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryStats {
    /// Boundaries created so far
    pub created: u64,
    /// Boundaries unloaded so far
    pub unloaded: u64,
    /// Boundaries alive right now
    pub active: u64,
}

/// Background thread advancing the engine epoch.
///
/// Running wasm yields back to the async runtime whenever the epoch
/// moves, which is what lets cancellation and timeouts interrupt a busy
/// loop. The ticker is an OS thread: on a current-thread runtime a task
/// would never get scheduled while the guest is spinning.
#[derive(Debug)]
pub struct EpochTicker {
    stop: Arc<AtomicBool>,
}

impl EpochTicker {
    /// Starts ticking `engine` every `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WasmError`] if the thread cannot be spawned.
    pub fn start(engine: &Engine, tick: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let engine = engine.clone();

        std::thread::Builder::new()
            .name("snipbox-epoch".to_string())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    std::thread::sleep(tick);
                    engine.increment_epoch();
                }
            })
            .map_err(|e| Error::WasmError {
                message: format!("failed to start epoch ticker: {e}"),
            })?;

        Ok(Self { stop })
    }
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// One run's isolated loading context.
pub struct ExecutionBoundary {
    store: Store<HostState>,
    linker: Linker<HostState>,
    instance: Option<Instance>,
    tracker: Arc<BoundaryTracker>,
}

impl std::fmt::Debug for ExecutionBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionBoundary")
            .field("loaded", &self.instance.is_some())
            .field("host_calls", &self.store.data().host_calls())
            .finish_non_exhaustive()
    }
}

impl ExecutionBoundary {
    /// Creates an empty boundary whose host functions talk to `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WasmError`] if the console functions cannot be
    /// linked.
    pub fn create(engine: &Engine, state: HostState, tracker: Arc<BoundaryTracker>) -> Result<Self> {
        let mut store = Store::new(engine, state);
        store.limiter(|state| &mut state.limiter);
        store.epoch_deadline_async_yield_and_update(1);

        let mut linker = Linker::new(engine);
        link_console(&mut linker).map_err(|e| Error::WasmError {
            message: format!("failed to link console functions: {e}"),
        })?;

        tracker.created.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("execution boundary created");

        Ok(Self {
            store,
            linker,
            instance: None,
            tracker,
        })
    }

    /// Instantiates `module` together with the reference modules it needs.
    ///
    /// Reference modules are instantiated privately for this boundary, each
    /// after the references it imports itself.
    ///
    /// # Errors
    ///
    /// Returns the instantiation failure, including traps raised by a
    /// start function.
    pub async fn load(&mut self, module: &Module, references: &ReferenceSet) -> anyhow::Result<()> {
        let needed = required_references(module, references);
        let mut pending: Vec<_> = references
            .iter()
            .filter(|r| needed.contains(r.name().as_str()))
            .collect();
        let mut defined: HashSet<&str> = HashSet::new();

        while !pending.is_empty() {
            let ready = pending.iter().position(|r| {
                reference_imports(r.module())
                    .iter()
                    .all(|dep| defined.contains(dep.as_str()))
            });
            let Some(index) = ready else {
                anyhow::bail!("reference modules import each other in a cycle");
            };

            let reference = pending.remove(index);
            let instance = self
                .linker
                .instantiate_async(&mut self.store, reference.module())
                .await?;
            self.linker
                .instance(&mut self.store, reference.name().as_str(), instance)?;
            defined.insert(reference.name().as_str());
            tracing::debug!(module = %reference.name(), "reference module instantiated");
        }

        let instance = self.linker.instantiate_async(&mut self.store, module).await?;
        self.instance = Some(instance);
        Ok(())
    }

    /// Calls the entry point and returns the exit code.
    ///
    /// # Errors
    ///
    /// Returns the trap or host failure raised by the snippet.
    pub async fn invoke(&mut self, entry: &EntryPoint) -> anyhow::Result<i32> {
        let instance = self
            .instance
            .ok_or_else(|| anyhow::anyhow!("boundary has no loaded module"))?;
        let store = &mut self.store;

        match entry.signature {
            EntrySignature::StartOnly => Ok(0),
            EntrySignature::Unit => {
                let func = instance.get_typed_func::<(), ()>(&mut *store, &entry.name)?;
                func.call_async(store, ()).await?;
                Ok(0)
            }
            EntrySignature::ExitCode => {
                let func = instance.get_typed_func::<(), i32>(&mut *store, &entry.name)?;
                func.call_async(store, ()).await
            }
            EntrySignature::Args => {
                let func = instance.get_typed_func::<(i32, i32), ()>(&mut *store, &entry.name)?;
                func.call_async(store, (0, 0)).await?;
                Ok(0)
            }
            EntrySignature::ArgsExitCode => {
                let func = instance.get_typed_func::<(i32, i32), i32>(&mut *store, &entry.name)?;
                func.call_async(store, (0, 0)).await
            }
        }
    }

    /// Console calls the snippet has made so far.
    #[must_use]
    pub fn host_calls(&self) -> u64 {
        self.store.data().host_calls()
    }
}

impl Drop for ExecutionBoundary {
    fn drop(&mut self) {
        self.tracker.unloaded.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("execution boundary unloaded");
    }
}

fn reference_imports(module: &Module) -> Vec<String> {
    let mut names: Vec<String> = module
        .imports()
        .map(|import| import.module().to_string())
        .filter(|name| name != CONSOLE_MODULE)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Names of the reference modules `module` needs, transitively.
fn required_references(module: &Module, references: &ReferenceSet) -> HashSet<String> {
    let mut needed = HashSet::new();
    let mut queue = reference_imports(module);

    while let Some(name) = queue.pop() {
        if !needed.insert(name.clone()) {
            continue;
        }
        if let Some(reference) = references.get(&name) {
            queue.extend(reference_imports(reference.module()));
        }
    }
    needed
}
