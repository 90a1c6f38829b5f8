//! Fixed-length typed arrays over unmanaged memory.
//!
//! Provides [`UnmanagedArray<T>`], a strongly typed array backed by a single
//! raw allocation, together with the two primitives it is built on: a
//! pin-counted [`ScopedPointer`] for stable raw addresses, and a
//! non-owning view registry that lets the array invalidate every
//! [`StreamView`] it handed out. This is the only crate in the workspace
//! that may contain `unsafe` code.
//!
//! # Architecture
//!
//! ```text
//! UnmanagedArray<T> (count, element size fixed per T)
//! └── Arc<ArrayShared>
//!     ├── SafeBuffer (RawAllocation + pin count, closed flag)
//!     │   └── RawAllocation → dyn RawAllocator (System | Malloc | custom)
//!     └── ViewRegistry (SlotTable<Arc<ViewLiveness>>, closing flag)
//!
//! StreamView ──Arc──▶ ArrayShared   (own cursor, liveness flag)
//! ScopedPointer ──&──▶ SafeBuffer   (pin held until drop)
//! ```
//!
//! # Lifetime protocol
//!
//! 1. Construction claims memory, zeroes it, and notifies the pressure
//!    counter with `+byte_length`.
//! 2. Every element access and every view I/O call pins the buffer for its
//!    duration.
//! 3. Disposal first force-closes every registered view, then closes the
//!    buffer. The memory is freed, and the pressure counter notified with
//!    `-byte_length`, once no pin remains.
//!
//! # Quick start
//!
//! ```rust
//! use std::io::{Read, Write};
//! use offheap_array::UnmanagedArray;
//!
//! let arr = UnmanagedArray::<u32>::allocate(4).unwrap();
//! arr.set(2, 7).unwrap();
//! assert_eq!(arr.get(2).unwrap(), 7);
//!
//! let mut view = arr.create_view().unwrap();
//! view.write_all(&1u32.to_ne_bytes()).unwrap();
//! assert_eq!(arr.get(0).unwrap(), 1);
//!
//! arr.dispose();
//! assert!(view.read(&mut [0u8; 4]).is_err());
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod array;
pub mod buffer;
pub mod config;
pub mod element;
mod load;
pub mod pin;
pub mod raw;
mod registry;
mod slots;
pub mod view;

pub use array::{Iter, UnmanagedArray};
pub use buffer::SafeBuffer;
pub use config::ArrayConfig;
pub use element::Element;
pub use pin::ScopedPointer;
pub use raw::{MallocAllocator, RawAllocator, SystemAllocator};
pub use view::StreamView;

pub use offheap_core::{ArrayError, ArrayId, ShortReadPolicy};
