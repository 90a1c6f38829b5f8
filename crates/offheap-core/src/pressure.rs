//! External memory-pressure accounting.
//!
//! Arrays report every successful construction and every disposal to an
//! optional [`PressureCounter`]. The counter is diagnostic only: nothing in
//! the array's correctness depends on it, and it is never consulted.
//!
//! [`MemoryPressure`] is a lock-free implementation suitable for sharing
//! across threads and arrays.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver of allocation and release events.
///
/// Each array calls [`notify_allocated`](PressureCounter::notify_allocated)
/// exactly once after construction succeeds and
/// [`notify_freed`](PressureCounter::notify_freed) exactly once when it is
/// disposed, both with the array's byte length.
pub trait PressureCounter: Send + Sync {
    /// `bytes` of unmanaged memory were claimed.
    fn notify_allocated(&self, bytes: u64);

    /// `bytes` of unmanaged memory were released.
    fn notify_freed(&self, bytes: u64);
}

/// Point-in-time copy of a [`MemoryPressure`] counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressureSnapshot {
    /// Bytes currently outstanding.
    pub outstanding_bytes: u64,
    /// Highest value `outstanding_bytes` has reached.
    pub peak_bytes: u64,
    /// Number of allocation notifications received.
    pub allocations: u64,
    /// Number of free notifications received.
    pub frees: u64,
}

/// Atomic pressure counter tracking outstanding and peak bytes.
#[derive(Debug, Default)]
pub struct MemoryPressure {
    outstanding: AtomicU64,
    peak: AtomicU64,
    allocations: AtomicU64,
    frees: AtomicU64,
}

// Compile-time assertion: MemoryPressure must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<MemoryPressure>();
};

impl MemoryPressure {
    /// Create a counter with everything at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently outstanding.
    pub fn outstanding_bytes(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Read all counters.
    ///
    /// Fields are loaded independently, so a snapshot taken while other
    /// threads allocate may mix values from adjacent events.
    pub fn snapshot(&self) -> PressureSnapshot {
        PressureSnapshot {
            outstanding_bytes: self.outstanding.load(Ordering::Acquire),
            peak_bytes: self.peak.load(Ordering::Acquire),
            allocations: self.allocations.load(Ordering::Acquire),
            frees: self.frees.load(Ordering::Acquire),
        }
    }
}

impl PressureCounter for MemoryPressure {
    fn notify_allocated(&self, bytes: u64) {
        let now = self.outstanding.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn notify_freed(&self, bytes: u64) {
        // Saturate rather than wrap if a caller frees more than it claimed.
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_sub(bytes))
            });
        self.frees.fetch_add(1, Ordering::Relaxed);
    }
}
