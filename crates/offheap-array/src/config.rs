//! Array construction parameters.

use std::fmt;
use std::sync::Arc;

use offheap_core::{ConfigError, PressureCounter, ShortReadPolicy};

use crate::raw::{RawAllocator, SystemAllocator};

/// Configuration shared by the array factory operations.
///
/// Validated at construction; an array keeps the allocator and pressure
/// counter it was built with for its whole lifetime.
#[derive(Clone)]
pub struct ArrayConfig {
    /// Where memory comes from. Default: [`SystemAllocator`].
    pub allocator: Arc<dyn RawAllocator>,

    /// Receiver of allocate/free notifications. Default: none.
    pub pressure: Option<Arc<dyn PressureCounter>>,

    /// Behaviour of stream loads that receive fewer bytes than the array
    /// holds. Default: [`ShortReadPolicy::ZeroFill`].
    pub short_read: ShortReadPolicy,

    /// Upper bound on a single allocation in bytes. Default: unbounded.
    pub max_bytes: Option<usize>,
}

impl ArrayConfig {
    /// Use `allocator` instead of the system allocator.
    pub fn with_allocator(mut self, allocator: Arc<dyn RawAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Report allocations and frees to `pressure`.
    pub fn with_pressure(mut self, pressure: Arc<dyn PressureCounter>) -> Self {
        self.pressure = Some(pressure);
        self
    }

    /// Set the short-read policy for stream loads.
    pub fn with_short_read(mut self, policy: ShortReadPolicy) -> Self {
        self.short_read = policy;
        self
    }

    /// Cap single allocations at `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == Some(0) {
            return Err(ConfigError::ZeroByteLimit);
        }
        Ok(())
    }

    /// Check a request of `bytes` against `max_bytes`.
    pub fn check_bytes(&self, bytes: usize) -> Result<(), ConfigError> {
        match self.max_bytes {
            Some(limit) if bytes > limit => Err(ConfigError::ByteLimitExceeded {
                requested: bytes,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            allocator: Arc::new(SystemAllocator),
            pressure: None,
            short_read: ShortReadPolicy::default(),
            max_bytes: None,
        }
    }
}

impl fmt::Debug for ArrayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayConfig")
            .field("allocator", &self.allocator)
            .field("pressure", &self.pressure.is_some())
            .field("short_read", &self.short_read)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
