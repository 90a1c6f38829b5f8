//! Policies for bulk loads from byte streams.

/// What a fixed-count load does when the source yields fewer bytes than
/// `count * element_size`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShortReadPolicy {
    /// Keep the bytes that arrived and zero the rest of the allocation.
    #[default]
    ZeroFill,
    /// Dispose the partially loaded array and fail with an `UnexpectedEof`
    /// I/O error.
    Fail,
}
