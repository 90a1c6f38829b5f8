//! The allocator boundary and the owned allocation handle.
//!
//! Arrays never call an allocation API directly. They go through a
//! [`RawAllocator`], which is an opaque `allocate(bytes)` / `deallocate`
//! pair, and hold the result in a [`RawAllocation`] that frees itself
//! exactly once when dropped.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use offheap_core::AllocError;

/// Source of unmanaged memory.
///
/// The only assumption made about an implementation is that a returned
/// address stays valid and does not move until it is passed back to
/// [`deallocate`](RawAllocator::deallocate). Requests are never for zero
/// bytes.
pub trait RawAllocator: Send + Sync + fmt::Debug {
    /// Claim `bytes` bytes of memory.
    fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, AllocError>;

    /// Return memory obtained from [`allocate`](RawAllocator::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `self.allocate(bytes)` with the same
    /// `bytes`, and must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize);
}

/// Alignment used by [`SystemAllocator`]. Large enough for every primitive
/// element type, including `u128`.
pub const SYSTEM_ALIGN: usize = 16;

/// Allocator backed by the Rust global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl SystemAllocator {
    fn layout(bytes: usize) -> Result<Layout, AllocError> {
        Layout::from_size_align(bytes, SYSTEM_ALIGN)
            .map_err(|e| AllocError::new(bytes, e.to_string()))
    }
}

impl RawAllocator for SystemAllocator {
    fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        let layout = Self::layout(bytes)?;
        // SAFETY: `bytes` is non-zero per the trait contract, so the layout
        // has non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or_else(|| AllocError::new(bytes, "global allocator returned null"))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        // The layout was valid when `allocate` built it from the same size.
        if let Ok(layout) = Self::layout(bytes) {
            // SAFETY: caller guarantees `ptr` came from `allocate(bytes)`.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}

/// Allocator backed by the C runtime's `malloc`/`free`.
///
/// Memory from this allocator can be handed to native code that expects to
/// own or inspect a C heap block.
#[derive(Clone, Copy, Debug, Default)]
pub struct MallocAllocator;

impl RawAllocator for MallocAllocator {
    fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: `malloc` has no preconditions; a null return is handled.
        let ptr = unsafe { libc::malloc(bytes) }.cast::<u8>();
        NonNull::new(ptr).ok_or_else(|| AllocError::new(bytes, "malloc returned null"))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _bytes: usize) {
        // SAFETY: caller guarantees `ptr` came from `malloc` and is live.
        unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) };
    }
}

/// An exclusively owned block of unmanaged memory.
///
/// Zero-length allocations never reach the allocator: they hold a dangling
/// pointer that is never dereferenced and never freed.
pub(crate) struct RawAllocation {
    ptr: NonNull<u8>,
    len: usize,
    allocator: Arc<dyn RawAllocator>,
}

// SAFETY: the allocation is uniquely owned; the pointer is only
// dereferenced through pinned, lock-serialised accessors.
unsafe impl Send for RawAllocation {}
// SAFETY: shared access hands out the raw address only; reads and writes
// through it are synchronised by the owning buffer.
unsafe impl Sync for RawAllocation {}

impl RawAllocation {
    /// Claim `len` bytes from `allocator` and zero them.
    pub(crate) fn zeroed(allocator: Arc<dyn RawAllocator>, len: usize) -> Result<Self, AllocError> {
        let ptr = if len == 0 {
            NonNull::dangling()
        } else {
            let ptr = allocator.allocate(len)?;
            // SAFETY: the allocator just returned `len` writable bytes.
            unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };
            ptr
        };
        Ok(Self {
            ptr,
            len,
            allocator,
        })
    }

    /// Base address of the block.
    pub(crate) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the block in bytes.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl Drop for RawAllocation {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: `ptr` came from `self.allocator.allocate(self.len)` and
        // drop runs once.
        unsafe { self.allocator.deallocate(self.ptr, self.len) };
    }
}

impl fmt::Debug for RawAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawAllocation")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("allocator", &self.allocator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(a: &RawAllocation) -> Vec<u8> {
        // SAFETY: test-only read of a live, initialised allocation.
        unsafe { std::slice::from_raw_parts(a.ptr().as_ptr(), a.len()).to_vec() }
    }

    #[test]
    fn system_allocation_is_zeroed() {
        let a = RawAllocation::zeroed(Arc::new(SystemAllocator), 64).unwrap();
        assert_eq!(a.len(), 64);
        assert!(read_all(&a).iter().all(|&b| b == 0));
    }

    #[test]
    fn system_allocation_is_aligned() {
        let a = RawAllocation::zeroed(Arc::new(SystemAllocator), 24).unwrap();
        assert_eq!(a.ptr().as_ptr() as usize % SYSTEM_ALIGN, 0);
    }

    #[test]
    fn malloc_allocation_is_zeroed() {
        let a = RawAllocation::zeroed(Arc::new(MallocAllocator), 33).unwrap();
        assert!(read_all(&a).iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_length_never_touches_allocator() {
        #[derive(Debug)]
        struct Refuses;
        impl RawAllocator for Refuses {
            fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
                Err(AllocError::new(bytes, "refused"))
            }
            unsafe fn deallocate(&self, _ptr: NonNull<u8>, _bytes: usize) {
                panic!("deallocate must not be called");
            }
        }
        let a = RawAllocation::zeroed(Arc::new(Refuses), 0).unwrap();
        assert_eq!(a.len(), 0);
        drop(a);
    }

    #[test]
    fn allocator_error_propagates() {
        let err = SystemAllocator.allocate(usize::MAX).unwrap_err();
        assert_eq!(err.requested, usize::MAX);
    }
}
