//! Offheap: fixed-length typed arrays backed by unmanaged memory.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the offheap sub-crates. Most users only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use std::io::{Read, Write};
//! use offheap::prelude::*;
//!
//! let arr = UnmanagedArray::<u32>::allocate(4).unwrap();
//! arr.set(2, 0xDEAD_BEEF).unwrap();
//!
//! // Views share the array's bytes.
//! let mut view = arr.create_view().unwrap();
//! let mut raw = [0u8; 16];
//! view.read_exact(&mut raw).unwrap();
//! assert_eq!(&raw[8..12], &0xDEAD_BEEFu32.to_ne_bytes());
//!
//! // Loading from a reader sizes the array from the byte count.
//! let bytes: Vec<u8> = [1u32, 2].iter().flat_map(|v| v.to_ne_bytes()).collect();
//! let loaded = UnmanagedArray::<u32>::load_count(&mut &bytes[..], 2).unwrap();
//! assert_eq!(loaded.to_vec().unwrap(), vec![1, 2]);
//!
//! // Disposing closes every outstanding view.
//! arr.dispose();
//! assert!(view.write(&[0]).is_err());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`array`] | `offheap-array` | `UnmanagedArray`, `ScopedPointer`, `StreamView`, allocators |
//! | [`types`] | `offheap-core` | Errors, IDs, short-read policy, memory pressure |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Arrays, pinning, views and raw allocators (`offheap-array`).
///
/// The main entry point is [`array::UnmanagedArray`]; see
/// [`array::ScopedPointer`] for direct pointer access.
pub use offheap_array as array;

/// Errors, identifiers and accounting hooks (`offheap-core`).
///
/// Contains [`types::ArrayError`] and the [`types::PressureCounter`] trait
/// with its default implementation [`types::MemoryPressure`].
pub use offheap_core as types;

/// Common imports for typical offheap usage.
///
/// ```rust
/// use offheap::prelude::*;
/// ```
pub mod prelude {
    // Array and access
    pub use offheap_array::{ArrayConfig, Element, ScopedPointer, StreamView, UnmanagedArray};

    // Allocation
    pub use offheap_array::{MallocAllocator, RawAllocator, SystemAllocator};

    // Core types
    pub use offheap_core::{ArrayError, MemoryPressure, PressureCounter, ShortReadPolicy};
}
