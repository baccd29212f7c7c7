//! Strong domain types for the snippet engine.
//!
//! Newtypes over primitives keep reference module names, session identities
//! and memory budgets from being mixed up with arbitrary strings and numbers.
//!
//! # Examples
//!
//! ```
//! use snipbox_core::{MemoryLimit, ModuleName, SessionId};
//!
//! let module = ModuleName::new("math");
//! let session = SessionId::generate();
//! let limit = MemoryLimit::from_mb(64).unwrap();
//!
//! assert_eq!(module.as_str(), "math");
//! assert_ne!(session, SessionId::generate());
//! assert_eq!(limit.bytes(), 64 * 1024 * 1024);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a reference module from the resolver manifest.
///
/// This is the name snippets import from (`(import "math" "sqrt" ...)`) and
/// the value substituted for `{name}` in candidate fetch paths.
///
/// # Examples
///
/// ```
/// use snipbox_core::ModuleName;
///
/// let name = ModuleName::new("text");
/// assert_eq!(name.to_string(), "text");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Creates a new module name.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the module name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ModuleName` and returns the inner `String`.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of one remote terminal surface.
///
/// Generated from a random v4 UUID so identities cannot be guessed or
/// collide between concurrently connected surfaces.
///
/// # Examples
///
/// ```
/// use snipbox_core::SessionId;
///
/// let id = SessionId::generate();
/// assert!(id.as_str().starts_with("term_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("term_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Linear memory budget for one execution boundary.
///
/// # Examples
///
/// ```
/// use snipbox_core::MemoryLimit;
///
/// assert!(MemoryLimit::from_mb(0).is_none());
/// assert_eq!(MemoryLimit::default().megabytes(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryLimit(usize);

impl MemoryLimit {
    const MB: usize = 1024 * 1024;

    /// Upper bound accepted by [`MemoryLimit::from_mb`]: 4 GiB, the wasm32 maximum.
    pub const MAX_MB: usize = 4096;

    /// Creates a limit from megabytes; `None` for zero or above [`Self::MAX_MB`].
    #[must_use]
    pub const fn from_mb(mb: usize) -> Option<Self> {
        if mb == 0 || mb > Self::MAX_MB {
            None
        } else {
            Some(Self(mb * Self::MB))
        }
    }

    /// Returns the limit in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> usize {
        self.0
    }

    /// Returns the limit in whole megabytes.
    #[inline]
    #[must_use]
    pub const fn megabytes(self) -> usize {
        self.0 / Self::MB
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self(64 * Self::MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name_creation() {
        let name = ModuleName::new("math");
        assert_eq!(name.as_str(), "math");
        assert_eq!(name.clone().into_inner(), "math");
    }

    #[test]
    fn test_module_name_from_conversions() {
        assert_eq!(ModuleName::from("a"), ModuleName::from("a".to_string()));
    }

    #[test]
    fn test_module_name_ordering() {
        let mut names = vec![ModuleName::new("text"), ModuleName::new("math")];
        names.sort();
        assert_eq!(names[0].as_str(), "math");
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), "term_".len() + 32);
    }

    #[test]
    fn test_memory_limit_bounds() {
        assert!(MemoryLimit::from_mb(0).is_none());
        assert!(MemoryLimit::from_mb(MemoryLimit::MAX_MB + 1).is_none());
        let limit = MemoryLimit::from_mb(16).unwrap();
        assert_eq!(limit.megabytes(), 16);
        assert_eq!(limit.bytes(), 16 * 1024 * 1024);
    }

    #[test]
    fn test_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModuleName>();
        assert_send_sync::<SessionId>();
        assert_send_sync::<MemoryLimit>();
    }
}
