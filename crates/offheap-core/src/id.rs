//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`ArrayId`] allocation.
static ARRAY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for an unmanaged array.
///
/// Allocated from a monotonic atomic counter via [`ArrayId::next`]. Two
/// arrays never share an ID within a process, even if one reuses the
/// other's freed address. Appears in log fields and `Debug` output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

impl ArrayId {
    /// Allocate a fresh, unique array ID. Thread-safe.
    pub fn next() -> Self {
        Self(ARRAY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a stream view inside its array's view registry.
///
/// A key pairs a slot index with the slot's generation at insertion time.
/// When the view is removed the slot's generation advances, so the old key
/// can never resolve to a later view that reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewKey {
    /// Index into the registry's slot vector.
    pub slot: u32,
    /// Generation of the slot when the view was registered.
    pub generation: u32,
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_ids_are_unique_and_increasing() {
        let a = ArrayId::next();
        let b = ArrayId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn view_key_display() {
        let key = ViewKey {
            slot: 3,
            generation: 7,
        };
        assert_eq!(key.to_string(), "3v7");
    }
}
