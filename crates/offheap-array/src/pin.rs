//! Scoped raw pointers into a [`SafeBuffer`].
//!
//! A [`ScopedPointer`] pins its buffer on acquisition and unpins it when
//! dropped. Drop is the only release path, so a pin is released exactly
//! once on every exit (normal return, `?`, or unwinding). Calling
//! [`release`](ScopedPointer::release) consumes the guard, which makes a
//! second release unrepresentable.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use offheap_core::ArrayError;

use crate::buffer::SafeBuffer;
use crate::element::Element;

/// A pinned, stable address into a [`SafeBuffer`].
///
/// While the guard lives the buffer's memory cannot be released, even if
/// the owning array is disposed concurrently. The guard is neither `Send`
/// nor `Sync`: a pin belongs to the scope that took it.
pub struct ScopedPointer<'a> {
    buffer: &'a SafeBuffer,
    ptr: NonNull<u8>,
    _not_send: PhantomData<*mut u8>,
}

impl<'a> ScopedPointer<'a> {
    /// Pin `buffer` and expose its base address.
    ///
    /// Fails with [`ArrayError::InvalidState`] if the buffer is closed.
    pub fn acquire(buffer: &'a SafeBuffer) -> Result<Self, ArrayError> {
        let ptr = buffer.pin().ok_or(ArrayError::InvalidState {
            reason: "cannot acquire a pointer into a closed buffer",
        })?;
        Ok(Self {
            buffer,
            ptr,
            _not_send: PhantomData,
        })
    }

    /// Base address of the buffer. Valid for `len()` bytes until the guard
    /// is dropped.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable base address of the buffer.
    ///
    /// Writes through this pointer are not synchronised with the array's
    /// own accessors or with other pointer holders.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Length of the pinned region in bytes.
    pub fn len(&self) -> usize {
        self.buffer.byte_length()
    }

    /// Whether the pinned region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pinned buffer.
    pub fn buffer(&self) -> &'a SafeBuffer {
        self.buffer
    }

    /// Unpin now instead of at end of scope.
    pub fn release(self) {}

    /// Copy `dst.len()` bytes starting at `offset` out of the buffer.
    pub(crate) fn read_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.check_span(offset, dst.len());
        let _io = self.buffer.lock_io();
        // SAFETY: the span is in bounds, the buffer is pinned so the memory
        // is live, and `dst` cannot alias unmanaged memory.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), dst.as_mut_ptr(), dst.len())
        };
    }

    /// Copy `src` into the buffer starting at `offset`.
    pub(crate) fn write_bytes(&self, offset: usize, src: &[u8]) {
        self.check_span(offset, src.len());
        let _io = self.buffer.lock_io();
        // SAFETY: as in `read_bytes`, with the copy direction reversed.
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.as_ptr().add(offset), src.len()) };
    }

    /// Zero `len` bytes starting at `offset`.
    pub(crate) fn zero_bytes(&self, offset: usize, len: usize) {
        self.check_span(offset, len);
        let _io = self.buffer.lock_io();
        // SAFETY: in-bounds span of pinned memory.
        unsafe { ptr::write_bytes(self.ptr.as_ptr().add(offset), 0, len) };
    }

    /// Read the `T` stored at byte `offset`.
    pub(crate) fn read_value<T: Element>(&self, offset: usize) -> T {
        self.check_span(offset, mem::size_of::<T>());
        let _io = self.buffer.lock_io();
        // SAFETY: in-bounds, pinned, and every bit pattern is a valid `T`.
        // The allocation carries no alignment guarantee for `T`.
        unsafe { self.ptr.as_ptr().add(offset).cast::<T>().read_unaligned() }
    }

    /// Store `value` at byte `offset`.
    pub(crate) fn write_value<T: Element>(&self, offset: usize, value: T) {
        self.check_span(offset, mem::size_of::<T>());
        let _io = self.buffer.lock_io();
        // SAFETY: in-bounds and pinned; unaligned store.
        unsafe { self.ptr.as_ptr().add(offset).cast::<T>().write_unaligned(value) };
    }

    fn check_span(&self, offset: usize, len: usize) {
        let end = offset.checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.len()),
            "span {offset}+{len} exceeds pinned region of {} bytes",
            self.len()
        );
    }
}

impl Drop for ScopedPointer<'_> {
    fn drop(&mut self) {
        self.buffer.unpin();
    }
}

impl fmt::Debug for ScopedPointer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedPointer")
            .field("array", &self.buffer.id())
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .finish()
    }
}

impl SafeBuffer {
    /// Pin this buffer for the lifetime of the returned guard.
    pub fn acquire(&self) -> Result<ScopedPointer<'_>, ArrayError> {
        ScopedPointer::acquire(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawAllocation, SystemAllocator};
    use offheap_core::ArrayId;
    use std::sync::Arc;

    fn buffer(len: usize) -> SafeBuffer {
        let allocation = RawAllocation::zeroed(Arc::new(SystemAllocator), len).unwrap();
        SafeBuffer::new(ArrayId::next(), allocation, None)
    }

    #[test]
    fn acquire_pins_and_drop_unpins() {
        let buf = buffer(8);
        {
            let p = buf.acquire().unwrap();
            assert_eq!(buf.pin_count(), 1);
            assert_eq!(p.len(), 8);
            let q = ScopedPointer::acquire(&buf).unwrap();
            assert_eq!(buf.pin_count(), 2);
            assert_eq!(p.as_ptr(), q.as_ptr());
        }
        assert_eq!(buf.pin_count(), 0);
    }

    #[test]
    fn release_unpins_exactly_once() {
        let buf = buffer(8);
        let p = buf.acquire().unwrap();
        p.release();
        assert_eq!(buf.pin_count(), 0);
    }

    #[test]
    fn acquire_on_closed_buffer_is_invalid_state() {
        let buf = buffer(8);
        buf.close();
        match buf.acquire() {
            Err(ArrayError::InvalidState { .. }) => {}
            other => panic!("expected InvalidState, got {other:?}"),
        };
    }

    #[test]
    fn unpin_happens_on_early_return() {
        fn fails(buf: &SafeBuffer) -> Result<(), ArrayError> {
            let _p = buf.acquire()?;
            Err(ArrayError::argument("bail"))
        }
        let buf = buffer(4);
        assert!(fails(&buf).is_err());
        assert_eq!(buf.pin_count(), 0);
    }

    #[test]
    fn pinned_memory_survives_close() {
        let buf = buffer(4);
        let p = buf.acquire().unwrap();
        p.write_value::<u32>(0, 0xDEAD_BEEF);
        buf.close();
        assert!(buf.is_allocated());
        assert_eq!(p.read_value::<u32>(0), 0xDEAD_BEEF);
        drop(p);
        assert!(!buf.is_allocated());
    }

    #[test]
    fn byte_copies_round_trip() {
        let buf = buffer(6);
        let p = buf.acquire().unwrap();
        p.write_bytes(1, &[1, 2, 3]);
        let mut out = [0u8; 6];
        p.read_bytes(0, &mut out);
        assert_eq!(out, [0, 1, 2, 3, 0, 0]);
        p.zero_bytes(2, 4);
        p.read_bytes(0, &mut out);
        assert_eq!(out, [0, 1, 0, 0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "exceeds pinned region")]
    fn out_of_bounds_span_panics() {
        let buf = buffer(4);
        let p = buf.acquire().unwrap();
        p.read_value::<u64>(0);
    }
}
