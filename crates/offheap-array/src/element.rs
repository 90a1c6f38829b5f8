//! Plain-old-data element types.
//!
//! An [`Element`] can be reinterpreted from any `size_of::<T>()` bytes,
//! which is what lets an unmanaged array hand out values read straight
//! from raw memory and lets stream views write arbitrary bytes into it.

#![allow(unsafe_code)]

use std::mem;
use std::slice;

/// Marker for fixed-size value types stored in unmanaged memory.
///
/// # Safety
///
/// Implementors must be `Copy`, contain no padding bytes, hold no pointers
/// or references, and accept every bit pattern of `size_of::<Self>()`
/// bytes as a valid value. Integers, floats, and arrays of them qualify;
/// `bool`, `char`, enums, and references do not.
pub unsafe trait Element: Copy + Send + Sync + 'static {}

macro_rules! impl_element {
    ($($t:ty),* $(,)?) => {
        $(
            // SAFETY: primitive numeric type; every bit pattern is valid
            // and there is no padding.
            unsafe impl Element for $t {}
        )*
    };
}

impl_element!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

// SAFETY: arrays have no padding between elements and inherit validity of
// every bit pattern from `E`.
unsafe impl<E: Element, const N: usize> Element for [E; N] {}

/// Byte size of one `T`.
pub const fn size_of_element<T: Element>() -> usize {
    mem::size_of::<T>()
}

/// View a slice of elements as its underlying bytes.
pub(crate) fn as_bytes<T: Element>(values: &[T]) -> &[u8] {
    // SAFETY: `T: Element` has no padding, so every byte of the slice is
    // initialised; the length is exactly the slice's byte span.
    unsafe { slice::from_raw_parts(values.as_ptr().cast::<u8>(), mem::size_of_val(values)) }
}

/// View a mutable slice of elements as its underlying bytes.
pub(crate) fn as_bytes_mut<T: Element>(values: &mut [T]) -> &mut [u8] {
    let len = mem::size_of_val(values);
    // SAFETY: any bytes written through the returned slice form a valid
    // `T` because `Element` accepts every bit pattern.
    unsafe { slice::from_raw_parts_mut(values.as_mut_ptr().cast::<u8>(), len) }
}
