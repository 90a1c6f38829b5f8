//! Benchmark fixtures for the offheap array crates.
//!
//! - [`filled_array`]: a `u64` array with a deterministic index pattern
//! - [`payload`]: cycling byte input for load benchmarks

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use offheap_array::UnmanagedArray;
use offheap_core::ArrayError;

/// Element count used by the reference benchmarks (64K elements, 512 KiB).
pub const REFERENCE_LEN: usize = 64 * 1024;

/// Allocate `len` `u64` elements where element `i` holds `i * 3`.
pub fn filled_array(len: usize) -> Result<UnmanagedArray<u64>, ArrayError> {
    let arr = UnmanagedArray::<u64>::allocate(len)?;
    for i in 0..len {
        arr.set(i, i as u64 * 3)?;
    }
    Ok(arr)
}

/// `bytes` bytes of cycling input suitable for `load_count`/`load_remaining`.
pub fn payload(bytes: usize) -> Vec<u8> {
    (0..bytes).map(|i| (i % 251) as u8).collect()
}
