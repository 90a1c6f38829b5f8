//! Error types for unmanaged arrays, their views, and their allocators.
//!
//! [`ArrayError`] is the single taxonomy surfaced to callers. Allocator
//! failures arrive as [`AllocError`] and stream failures as
//! [`std::io::Error`]; both are carried verbatim inside `ArrayError`.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors from array construction, indexed access, and view I/O.
#[derive(Debug)]
pub enum ArrayError {
    /// An argument was rejected before any memory was touched
    /// (element count overflow, zero-sized element, length mismatch).
    Argument {
        /// Human-readable description of the rejected argument.
        reason: String,
    },
    /// An index fell outside `[0, count)`.
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of elements in the array.
        count: usize,
    },
    /// The array, or a view whose backing array was disposed, is closed.
    ObjectDisposed {
        /// Short name of the closed object.
        object: &'static str,
    },
    /// A pointer scope was misused, e.g. acquired on a released buffer.
    InvalidState {
        /// Description of the violated precondition.
        reason: &'static str,
    },
    /// The allocator refused the request.
    Allocation(AllocError),
    /// The byte source or sink failed during a load.
    Io(io::Error),
}

impl ArrayError {
    /// Shorthand for [`ArrayError::Argument`].
    pub fn argument(reason: impl Into<String>) -> Self {
        Self::Argument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ArrayError::ObjectDisposed`].
    pub fn disposed(object: &'static str) -> Self {
        Self::ObjectDisposed { object }
    }

    /// Whether this error reports a closed array or view.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::ObjectDisposed { .. })
    }

    /// Recover the `ArrayError` wrapped inside an `io::Error` produced by
    /// a stream view, if there is one.
    pub fn from_io(err: &io::Error) -> Option<&ArrayError> {
        err.get_ref()?.downcast_ref::<ArrayError>()
    }
}

impl fmt::Display for ArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument { reason } => write!(f, "invalid argument: {reason}"),
            Self::IndexOutOfRange { index, count } => {
                write!(f, "index {index} out of range for array of {count} elements")
            }
            Self::ObjectDisposed { object } => write!(f, "cannot access a disposed {object}"),
            Self::InvalidState { reason } => write!(f, "invalid state: {reason}"),
            Self::Allocation(e) => write!(f, "allocation failed: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ArrayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Allocation(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for ArrayError {
    fn from(e: AllocError) -> Self {
        Self::Allocation(e)
    }
}

impl From<io::Error> for ArrayError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for ArrayError {
    fn from(e: ConfigError) -> Self {
        Self::argument(e.to_string())
    }
}

impl From<ArrayError> for io::Error {
    fn from(e: ArrayError) -> Self {
        match e {
            ArrayError::Io(inner) => inner,
            other => {
                let kind = match &other {
                    ArrayError::Argument { .. } | ArrayError::IndexOutOfRange { .. } => {
                        io::ErrorKind::InvalidInput
                    }
                    ArrayError::Allocation(_) => io::ErrorKind::OutOfMemory,
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

/// Failure reported by an allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocError {
    /// Number of bytes that were requested.
    pub requested: usize,
    /// Why the allocator refused.
    pub reason: String,
}

impl AllocError {
    /// Create an allocation error for a request of `requested` bytes.
    pub fn new(requested: usize, reason: impl Into<String>) -> Self {
        Self {
            requested,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not allocate {} bytes: {}", self.requested, self.reason)
    }
}

impl Error for AllocError {}

/// Errors from validating an array configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_bytes` was set to zero, which would reject every allocation
    /// except empty ones.
    ZeroByteLimit,
    /// A requested allocation exceeds the configured limit.
    ByteLimitExceeded {
        /// Bytes requested.
        requested: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroByteLimit => write!(f, "max_bytes must be greater than zero"),
            Self::ByteLimitExceeded { requested, limit } => {
                write!(f, "requested {requested} bytes exceeds limit of {limit} bytes")
            }
        }
    }
}

impl Error for ConfigError {}
