//! Fixed-length typed arrays over unmanaged memory.
//!
//! An [`UnmanagedArray<T>`] owns exactly one allocation of
//! `count * size_of::<T>()` bytes. Every element access pins the
//! allocation through a [`ScopedPointer`], and every derived
//! [`StreamView`] is tracked in a non-owning registry so that disposal can
//! close them all before the memory goes away.
//!
//! Disposal order is fixed: views are force-closed first, then the buffer
//! is closed. Memory is released (and the pressure counter notified) as
//! soon as no pin is outstanding.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use offheap_core::{ArrayError, ArrayId};
use tracing::debug;

use crate::buffer::SafeBuffer;
use crate::config::ArrayConfig;
use crate::element::{as_bytes, as_bytes_mut, Element};
use crate::pin::ScopedPointer;
use crate::raw::RawAllocation;
use crate::registry::ViewRegistry;
use crate::view::StreamView;

/// State shared between an array and the views derived from it.
pub(crate) struct ArrayShared {
    pub(crate) buffer: SafeBuffer,
    pub(crate) views: ViewRegistry,
}

/// A fixed-length array of `T` stored in unmanaged memory.
///
/// The array is `Send + Sync`: indexed reads and writes, view creation and
/// disposal may all happen from different threads. Writers to the same
/// element are not ordered relative to each other; callers that need
/// atomicity across elements must serialise externally.
pub struct UnmanagedArray<T: Element> {
    shared: Arc<ArrayShared>,
    count: usize,
    _marker: PhantomData<T>,
}

// Compile-time assertion: UnmanagedArray must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<UnmanagedArray<u64>>();
};

impl<T: Element> UnmanagedArray<T> {
    /// Size in bytes of one element. Fixed per type at compile time.
    pub const ELEMENT_SIZE: usize = mem::size_of::<T>();

    /// Allocate a zeroed array of `count` elements with the default
    /// configuration.
    pub fn allocate(count: usize) -> Result<Self, ArrayError> {
        Self::allocate_with(count, &ArrayConfig::default())
    }

    /// Allocate a zeroed array of `count` elements.
    ///
    /// Fails with [`ArrayError::Argument`] if `T` is zero-sized, if
    /// `count * ELEMENT_SIZE` overflows or exceeds the configured limit,
    /// and with [`ArrayError::Allocation`] if the allocator refuses. On
    /// failure nothing is retained and the pressure counter is untouched.
    pub fn allocate_with(count: usize, config: &ArrayConfig) -> Result<Self, ArrayError> {
        config.validate()?;
        let byte_length = Self::byte_length_for(count)?;
        config.check_bytes(byte_length)?;

        let allocation = RawAllocation::zeroed(Arc::clone(&config.allocator), byte_length)?;
        let buffer = SafeBuffer::new(ArrayId::next(), allocation, config.pressure.clone());
        debug!(
            array = %buffer.id(),
            count,
            element_size = Self::ELEMENT_SIZE,
            "allocated unmanaged array"
        );
        Ok(Self {
            shared: Arc::new(ArrayShared {
                buffer,
                views: ViewRegistry::new(),
            }),
            count,
            _marker: PhantomData,
        })
    }

    /// `count * ELEMENT_SIZE`, rejecting zero-sized elements and overflow.
    pub(crate) fn byte_length_for(count: usize) -> Result<usize, ArrayError> {
        if Self::ELEMENT_SIZE == 0 {
            return Err(ArrayError::argument("element type has zero size"));
        }
        count
            .checked_mul(Self::ELEMENT_SIZE)
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(|| {
                ArrayError::argument(format!(
                    "{count} elements of {} bytes overflow the address space",
                    Self::ELEMENT_SIZE
                ))
            })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Size of the allocation in bytes: `len() * ELEMENT_SIZE`.
    pub fn byte_length(&self) -> usize {
        self.shared.buffer.byte_length()
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        Self::ELEMENT_SIZE
    }

    /// Unique identifier of this array.
    pub fn id(&self) -> ArrayId {
        self.shared.buffer.id()
    }

    /// Whether [`dispose`](UnmanagedArray::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.shared.buffer.is_closed()
    }

    /// The pin-counted buffer backing this array.
    pub fn buffer(&self) -> &SafeBuffer {
        &self.shared.buffer
    }

    /// Pin the whole allocation and expose its raw address for interop.
    ///
    /// Fails with [`ArrayError::InvalidState`] after disposal. Memory stays
    /// allocated until the returned guard is dropped, even if the array is
    /// disposed in the meantime.
    pub fn acquire(&self) -> Result<ScopedPointer<'_>, ArrayError> {
        ScopedPointer::acquire(&self.shared.buffer)
    }

    /// Read element `index`.
    pub fn get(&self, index: usize) -> Result<T, ArrayError> {
        let pin = self.pin()?;
        let offset = self.offset_of(index)?;
        Ok(pin.read_value(offset))
    }

    /// Overwrite element `index` with `value`.
    pub fn set(&self, index: usize, value: T) -> Result<(), ArrayError> {
        let pin = self.pin()?;
        let offset = self.offset_of(index)?;
        pin.write_value(offset, value);
        Ok(())
    }

    /// Write `value` into every element.
    pub fn fill(&self, value: T) -> Result<(), ArrayError> {
        let pin = self.pin()?;
        for index in 0..self.count {
            pin.write_value(index * Self::ELEMENT_SIZE, value);
        }
        Ok(())
    }

    /// Copy every element into `dst`, which must hold exactly `len()`
    /// elements.
    pub fn copy_to_slice(&self, dst: &mut [T]) -> Result<(), ArrayError> {
        self.check_slice_len(dst.len())?;
        let pin = self.pin()?;
        pin.read_bytes(0, as_bytes_mut(dst));
        Ok(())
    }

    /// Overwrite every element from `src`, which must hold exactly `len()`
    /// elements.
    pub fn copy_from_slice(&self, src: &[T]) -> Result<(), ArrayError> {
        self.check_slice_len(src.len())?;
        let pin = self.pin()?;
        pin.write_bytes(0, as_bytes(src));
        Ok(())
    }

    /// Copy the elements into a new `Vec`.
    pub fn to_vec(&self) -> Result<Vec<T>, ArrayError> {
        Ok(self.iter()?.collect())
    }

    /// Iterate over the elements from index 0.
    ///
    /// The iterator pins the allocation for its whole lifetime, so a
    /// concurrent [`dispose`](UnmanagedArray::dispose) cannot cut the
    /// traversal short. Each call starts a fresh traversal.
    ///
    /// The pin is tied to the calling thread, so [`Iter`] is not `Send`.
    /// To traverse on another thread, share the array and call `iter`
    /// there.
    ///
    /// ```compile_fail
    /// use offheap_array::UnmanagedArray;
    ///
    /// let arr = UnmanagedArray::<u32>::allocate(4).unwrap();
    /// let iter = arr.iter().unwrap();
    /// std::thread::scope(|s| {
    ///     s.spawn(move || iter.count());
    /// });
    /// ```
    pub fn iter(&self) -> Result<Iter<'_, T>, ArrayError> {
        Ok(Iter {
            pin: self.pin()?,
            index: 0,
            count: self.count,
            _marker: PhantomData,
        })
    }

    /// Open a read/write byte-stream view spanning the whole allocation.
    ///
    /// The caller owns the view and should close it, but disposing the
    /// array closes it too. Fails with [`ArrayError::ObjectDisposed`] once
    /// the array is disposed or disposal has begun.
    pub fn create_view(&self) -> Result<StreamView, ArrayError> {
        StreamView::open(&self.shared)
    }

    /// Number of views created from this array that are still open.
    pub fn live_views(&self) -> usize {
        self.shared.views.live_count()
    }

    /// Close every view, then release the allocation.
    ///
    /// Calling this more than once is a no-op. If another thread holds a
    /// pin at the time, the memory is released when that pin drops.
    pub fn dispose(&self) {
        let forced = self.shared.views.force_close_all();
        if self.shared.buffer.close() {
            debug!(
                array = %self.id(),
                bytes = self.byte_length(),
                forced_views = forced,
                "disposed unmanaged array"
            );
        }
    }

    fn pin(&self) -> Result<ScopedPointer<'_>, ArrayError> {
        self.shared
            .buffer
            .acquire()
            .map_err(|_| ArrayError::disposed("UnmanagedArray"))
    }

    fn offset_of(&self, index: usize) -> Result<usize, ArrayError> {
        if index >= self.count {
            return Err(ArrayError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        Ok(index * Self::ELEMENT_SIZE)
    }

    fn check_slice_len(&self, len: usize) -> Result<(), ArrayError> {
        if len != self.count {
            return Err(ArrayError::argument(format!(
                "slice holds {len} elements, array holds {}",
                self.count
            )));
        }
        Ok(())
    }
}

impl<T: Element> Drop for UnmanagedArray<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Element> fmt::Debug for UnmanagedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmanagedArray")
            .field("id", &self.id())
            .field("count", &self.count)
            .field("element_size", &Self::ELEMENT_SIZE)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Iterator over the elements of an [`UnmanagedArray`].
///
/// Created by [`UnmanagedArray::iter`].
pub struct Iter<'a, T: Element> {
    pin: ScopedPointer<'a>,
    index: usize,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.index >= self.count {
            return None;
        }
        let value = self.pin.read_value(self.index * mem::size_of::<T>());
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl<T: Element> ExactSizeIterator for Iter<'_, T> {}

impl<T: Element> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("array", &self.pin.buffer().id())
            .field("index", &self.index)
            .field("count", &self.count)
            .finish()
    }
}

impl<T: Element> std::iter::FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use offheap_core::{MemoryPressure, PressureCounter};

    fn tracked() -> (Arc<MemoryPressure>, ArrayConfig) {
        let pressure = Arc::new(MemoryPressure::new());
        let counter: Arc<dyn PressureCounter> = pressure.clone();
        (pressure, ArrayConfig::default().with_pressure(counter))
    }

    #[test]
    fn four_byte_scenario() {
        let arr = UnmanagedArray::<u32>::allocate(4).unwrap();
        assert_eq!(arr.byte_length(), 16);
        arr.set(2, 0xABCD).unwrap();
        assert_eq!(arr.get(2).unwrap(), 0xABCD);
        match arr.get(4) {
            Err(ArrayError::IndexOutOfRange { index: 4, count: 4 }) => {}
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
        arr.dispose();
        assert!(arr.get(0).unwrap_err().is_disposed());
    }

    #[test]
    fn fresh_memory_is_zeroed() {
        let arr = UnmanagedArray::<f64>::allocate(8).unwrap();
        assert!(arr.iter().unwrap().all(|v| v == 0.0));
    }

    #[test]
    fn pressure_counts_allocation_and_single_free() {
        let (pressure, config) = tracked();
        let arr = UnmanagedArray::<u16>::allocate_with(10, &config).unwrap();
        assert_eq!(pressure.outstanding_bytes(), 20);
        arr.dispose();
        arr.dispose();
        drop(arr);
        let snap = pressure.snapshot();
        assert_eq!(snap.outstanding_bytes, 0);
        assert_eq!(snap.allocations, 1);
        assert_eq!(snap.frees, 1);
    }

    #[test]
    fn overflowing_count_is_argument_error() {
        let (pressure, config) = tracked();
        match UnmanagedArray::<u64>::allocate_with(usize::MAX / 2, &config) {
            Err(ArrayError::Argument { .. }) => {}
            other => panic!("expected Argument, got {other:?}"),
        }
        assert_eq!(pressure.snapshot().allocations, 0);
    }

    #[test]
    fn zero_sized_element_rejected() {
        assert!(matches!(
            UnmanagedArray::<[u8; 0]>::allocate(3),
            Err(ArrayError::Argument { .. })
        ));
    }

    #[test]
    fn byte_limit_is_argument_error() {
        let config = ArrayConfig::default().with_max_bytes(8);
        assert!(UnmanagedArray::<u32>::allocate_with(2, &config).is_ok());
        assert!(matches!(
            UnmanagedArray::<u32>::allocate_with(3, &config),
            Err(ArrayError::Argument { .. })
        ));
    }

    #[test]
    fn empty_array_is_usable() {
        let (pressure, config) = tracked();
        let arr = UnmanagedArray::<u32>::allocate_with(0, &config).unwrap();
        assert!(arr.is_empty());
        assert_eq!(arr.byte_length(), 0);
        assert!(arr.get(0).is_err());
        assert_eq!(arr.to_vec().unwrap(), Vec::<u32>::new());
        drop(arr);
        assert_eq!(pressure.snapshot().frees, 1);
    }

    #[test]
    fn operations_after_dispose_fail() {
        let arr = UnmanagedArray::<u8>::allocate(4).unwrap();
        arr.dispose();
        assert!(arr.is_disposed());
        assert!(arr.set(0, 1).unwrap_err().is_disposed());
        assert!(arr.create_view().unwrap_err().is_disposed());
        assert!(arr.iter().unwrap_err().is_disposed());
        assert!(matches!(arr.acquire(), Err(ArrayError::InvalidState { .. })));
    }

    #[test]
    fn iter_is_restartable() {
        let arr = UnmanagedArray::<i32>::allocate(3).unwrap();
        arr.copy_from_slice(&[1, -2, 3]).unwrap();
        let first: Vec<_> = arr.iter().unwrap().collect();
        let second: Vec<_> = arr.iter().unwrap().collect();
        assert_eq!(first, vec![1, -2, 3]);
        assert_eq!(first, second);
        assert_eq!(arr.iter().unwrap().len(), 3);
    }

    #[test]
    fn iteration_outlives_concurrent_dispose() {
        let (pressure, config) = tracked();
        let arr = UnmanagedArray::<u8>::allocate_with(4, &config).unwrap();
        arr.fill(7).unwrap();
        let mut it = arr.iter().unwrap();
        assert_eq!(it.next(), Some(7));
        arr.dispose();
        assert_eq!(pressure.outstanding_bytes(), 4);
        assert_eq!(it.collect::<Vec<_>>(), vec![7, 7, 7]);
        assert_eq!(pressure.outstanding_bytes(), 0);
    }

    #[test]
    fn slice_copies_require_exact_length() {
        let arr = UnmanagedArray::<u16>::allocate(2).unwrap();
        assert!(matches!(
            arr.copy_from_slice(&[1, 2, 3]),
            Err(ArrayError::Argument { .. })
        ));
        arr.copy_from_slice(&[5, 6]).unwrap();
        let mut out = [0u16; 2];
        arr.copy_to_slice(&mut out).unwrap();
        assert_eq!(out, [5, 6]);
        let mut short = [0u16; 1];
        assert!(arr.copy_to_slice(&mut short).is_err());
    }

    #[test]
    fn array_elements_of_arrays() {
        let arr = UnmanagedArray::<[f32; 3]>::allocate(2).unwrap();
        assert_eq!(arr.element_size(), 12);
        arr.set(1, [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(arr.get(1).unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(arr.get(0).unwrap(), [0.0; 3]);
    }

    #[test]
    fn debug_output_names_array() {
        let arr = UnmanagedArray::<u8>::allocate(1).unwrap();
        let s = format!("{arr:?}");
        assert!(s.contains("UnmanagedArray"));
        assert!(s.contains("disposed: false"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn set_then_get_round_trips(
                values in proptest::collection::vec(any::<u64>(), 1..64),
            ) {
                let arr = UnmanagedArray::<u64>::allocate(values.len()).unwrap();
                prop_assert_eq!(arr.byte_length(), values.len() * 8);
                for (i, &v) in values.iter().enumerate() {
                    arr.set(i, v).unwrap();
                }
                for (i, &v) in values.iter().enumerate() {
                    prop_assert_eq!(arr.get(i).unwrap(), v);
                }
                let out_of_range = arr.get(values.len()).unwrap_err();
                let is_index_error = matches!(out_of_range, ArrayError::IndexOutOfRange { .. });
                prop_assert!(is_index_error);
            }

            #[test]
            fn pressure_matches_byte_length(count in 0usize..4096) {
                let (pressure, config) = tracked();
                let arr = UnmanagedArray::<u32>::allocate_with(count, &config).unwrap();
                prop_assert_eq!(pressure.outstanding_bytes(), (count * 4) as u64);
                prop_assert_eq!(pressure.snapshot().allocations, 1);
                drop(arr);
                prop_assert_eq!(pressure.outstanding_bytes(), 0);
            }
        }
    }
}
