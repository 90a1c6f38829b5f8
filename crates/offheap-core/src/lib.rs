//! Core types for the offheap workspace.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the memory-owning crates: the error taxonomy,
//! array identifiers, the external pressure-counter boundary, and the
//! policies that govern bulk loads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod policy;
pub mod pressure;

pub use error::{AllocError, ArrayError, ConfigError};
pub use id::{ArrayId, ViewKey};
pub use policy::ShortReadPolicy;
pub use pressure::{MemoryPressure, PressureCounter, PressureSnapshot};
