//! Pin-counted ownership of one unmanaged allocation.
//!
//! [`SafeBuffer`] is the single owner of an array's memory. Readers pin it
//! (see [`ScopedPointer`](crate::ScopedPointer)) for as long as they hold a
//! raw address, and closing the buffer never frees memory out from under a
//! pin: if pins are outstanding when [`close`](SafeBuffer::close) runs, the
//! buffer is marked closed immediately and the allocation is released by
//! whichever unpin brings the count back to zero.
//!
//! The pressure counter is notified exactly once on construction and
//! exactly once on release.

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use offheap_core::{ArrayId, PressureCounter};
use tracing::debug;

use crate::raw::RawAllocation;

struct BufferState {
    /// `None` once released.
    allocation: Option<RawAllocation>,
    /// Outstanding pins.
    pins: usize,
    /// Set by the first `close`; never cleared.
    closed: bool,
}

/// An unmanaged allocation guarded by a pin count.
pub struct SafeBuffer {
    id: ArrayId,
    byte_length: usize,
    state: Mutex<BufferState>,
    /// Serialises byte copies made through pinned accessors.
    io: Mutex<()>,
    pressure: Option<Arc<dyn PressureCounter>>,
}

// Compile-time assertion: SafeBuffer must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SafeBuffer>();
};

impl SafeBuffer {
    /// Take ownership of `allocation` and report it to `pressure`.
    pub(crate) fn new(
        id: ArrayId,
        allocation: RawAllocation,
        pressure: Option<Arc<dyn PressureCounter>>,
    ) -> Self {
        let byte_length = allocation.len();
        if let Some(p) = &pressure {
            p.notify_allocated(byte_length as u64);
        }
        debug!(array = %id, bytes = byte_length, "claimed unmanaged memory");
        Self {
            id,
            byte_length,
            state: Mutex::new(BufferState {
                allocation: Some(allocation),
                pins: 0,
                closed: false,
            }),
            io: Mutex::new(()),
            pressure,
        }
    }

    /// Identifier of the array that owns this buffer.
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// Size of the allocation in bytes. Constant for the buffer's lifetime.
    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Whether [`close`](SafeBuffer::close) has run.
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Number of pins currently outstanding.
    pub fn pin_count(&self) -> usize {
        self.lock_state().pins
    }

    /// Whether the memory is still allocated. Stays `true` after `close`
    /// while pins are outstanding.
    pub fn is_allocated(&self) -> bool {
        self.lock_state().allocation.is_some()
    }

    /// Increment the pin count and return the base address, or `None` if
    /// the buffer is closed.
    pub(crate) fn pin(&self) -> Option<NonNull<u8>> {
        let mut state = self.lock_state();
        if state.closed {
            return None;
        }
        let ptr = state.allocation.as_ref()?.ptr();
        state.pins += 1;
        Some(ptr)
    }

    /// Decrement the pin count, releasing the memory if this was the last
    /// pin on a closed buffer.
    pub(crate) fn unpin(&self) {
        let released = {
            let mut state = self.lock_state();
            debug_assert!(state.pins > 0, "unpin without matching pin");
            state.pins = state.pins.saturating_sub(1);
            if state.closed && state.pins == 0 {
                state.allocation.take()
            } else {
                None
            }
        };
        if let Some(allocation) = released {
            self.release(allocation);
        }
    }

    /// Close the buffer. Returns `false` if it was already closed.
    ///
    /// After this returns no new pin can be taken. The memory is released
    /// now if nothing is pinned, otherwise by the last unpin.
    pub(crate) fn close(&self) -> bool {
        let (released, pins) = {
            let mut state = self.lock_state();
            if state.closed {
                return false;
            }
            state.closed = true;
            let released = if state.pins == 0 {
                state.allocation.take()
            } else {
                None
            };
            (released, state.pins)
        };
        match released {
            Some(allocation) => self.release(allocation),
            None => debug!(array = %self.id, pins, "release deferred until pins drain"),
        }
        true
    }

    pub(crate) fn lock_io(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        // The state is plain counters and an Option; a panic while holding
        // the lock cannot leave it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, allocation: RawAllocation) {
        let bytes = allocation.len();
        drop(allocation);
        if let Some(p) = &self.pressure {
            p.notify_freed(bytes as u64);
        }
        debug!(array = %self.id, bytes, "released unmanaged memory");
    }
}

impl Drop for SafeBuffer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SafeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SafeBuffer")
            .field("id", &self.id)
            .field("byte_length", &self.byte_length)
            .field("pins", &state.pins)
            .field("closed", &state.closed)
            .finish()
    }
}
