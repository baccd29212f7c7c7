//! Process-wide "current console" slot.
//!
//! Code that cannot be handed an [`OutputBridge`] explicitly writes through
//! [`current`]. A run installs its bridge for its duration and the returned
//! [`AmbientGuard`] removes it again on every exit path, including panics
//! and cancellation.

use crate::output::OutputBridge;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

static SLOT: Mutex<Vec<(u64, OutputBridge)>> = Mutex::new(Vec::new());
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn slot() -> MutexGuard<'static, Vec<(u64, OutputBridge)>> {
    SLOT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Restores the previous occupant of the slot when dropped.
#[derive(Debug)]
#[must_use = "the bridge is uninstalled as soon as the guard is dropped"]
pub struct AmbientGuard {
    id: u64,
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        let mut slot = slot();
        if let Some(pos) = slot.iter().rposition(|(id, _)| *id == self.id) {
            slot.remove(pos);
        }
    }
}

/// Makes `bridge` the current console until the guard drops.
pub fn install(bridge: OutputBridge) -> AmbientGuard {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    slot().push((id, bridge));
    AmbientGuard { id }
}

/// The bridge currently installed, if any.
#[must_use]
pub fn current() -> Option<OutputBridge> {
    slot().last().map(|(_, bridge)| bridge.clone())
}

/// Whether `bridge` is installed anywhere in the slot.
#[must_use]
pub fn is_installed(bridge: &OutputBridge) -> bool {
    slot().iter().any(|(_, b)| b.same_bridge(bridge))
}
