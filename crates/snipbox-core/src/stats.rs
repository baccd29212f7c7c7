//! Engine statistics.
//!
//! Snapshots are plain serializable values captured from the runtime's atomic
//! counters, so they can be printed by the CLI or shipped to a host page.
//!
//! # Examples
//!
//! ```
//! use snipbox_core::stats::EngineStats;
//!
//! let stats = EngineStats {
//!     compilations: 4,
//!     compile_failures: 1,
//!     cache_hits: 1,
//!     runs: 3,
//!     completed: 2,
//!     failed: 1,
//!     cancelled: 0,
//!     references_loaded: 2,
//! };
//! assert_eq!(stats.cache_hit_rate(), Some(0.25));
//! ```

use serde::{Deserialize, Serialize};

/// Counters describing everything the engine did since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Compile requests, including cache hits.
    pub compilations: u32,

    /// Compile requests that produced error diagnostics.
    pub compile_failures: u32,

    /// Compile requests served from the artifact cache.
    pub cache_hits: u32,

    /// Runs that reached the execution host.
    pub runs: u32,

    /// Runs whose entry point returned normally.
    pub completed: u32,

    /// Runs that ended with a runtime failure or missing entry point.
    pub failed: u32,

    /// Runs stopped by a cancellation signal.
    pub cancelled: u32,

    /// Modules in the frozen reference set.
    pub references_loaded: u32,
}

impl EngineStats {
    /// Fraction of compile requests served from the cache.
    ///
    /// Returns `None` before the first compilation.
    #[must_use]
    pub fn cache_hit_rate(&self) -> Option<f64> {
        if self.compilations == 0 {
            return None;
        }
        Some(f64::from(self.cache_hits) / f64::from(self.compilations))
    }

    /// Fraction of runs that completed normally.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.runs == 0 {
            return None;
        }
        Some(f64::from(self.completed) / f64::from(self.runs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_empty() {
        let stats = EngineStats::default();
        assert_eq!(stats.cache_hit_rate(), None);
        assert_eq!(stats.success_rate(), None);
    }

    #[test]
    fn test_success_rate() {
        let stats = EngineStats {
            runs: 4,
            completed: 3,
            ..EngineStats::default()
        };
        assert_eq!(stats.success_rate(), Some(0.75));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = EngineStats {
            runs: 1,
            ..EngineStats::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["runs"], 1);
        assert_eq!(json["cancelled"], 0);
    }
}
