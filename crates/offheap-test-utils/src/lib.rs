//! Test utilities and instrumented collaborators for offheap development.
//!
//! Provides an allocator that counts (and can refuse) requests, a pressure
//! counter that records every event, byte sources that end early or fail
//! part-way, and a one-call tracing setup for tests.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once, PoisonError};

use offheap_array::{RawAllocator, SystemAllocator};
use offheap_core::{AllocError, PressureCounter};

/// Install a fmt subscriber honouring `RUST_LOG`. Safe to call from every
/// test; only the first call has an effect.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Allocator that tracks live allocations and can be told to refuse.
///
/// Delegates to [`SystemAllocator`]. After `fail_after` successful
/// allocations every further request fails.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    inner: SystemAllocator,
    fail_after: Option<usize>,
    allocations: AtomicUsize,
    frees: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed `n` times, then refuse every request.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.frees.load(Ordering::SeqCst)
    }

    /// Allocations not yet returned.
    pub fn live(&self) -> usize {
        self.allocations() - self.frees()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::SeqCst)
    }
}

impl RawAllocator for CountingAllocator {
    fn allocate(&self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        if self
            .fail_after
            .is_some_and(|n| self.allocations.load(Ordering::SeqCst) >= n)
        {
            return Err(AllocError::new(bytes, "counting allocator refused"));
        }
        let ptr = self.inner.allocate(bytes)?;
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.live_bytes.fetch_add(bytes, Ordering::SeqCst);
        Ok(ptr)
    }

    #[allow(unsafe_code)]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        self.live_bytes.fetch_sub(bytes, Ordering::SeqCst);
        // SAFETY: forwarded contract; `ptr` came from `inner.allocate(bytes)`.
        unsafe { self.inner.deallocate(ptr, bytes) };
    }
}

/// One notification received by a [`RecordingPressure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PressureEvent {
    Allocated(u64),
    Freed(u64),
}

/// Pressure counter that keeps every event in order.
#[derive(Debug, Default)]
pub struct RecordingPressure {
    events: Mutex<Vec<PressureEvent>>,
}

impl RecordingPressure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PressureEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of allocated minus freed bytes.
    pub fn net_bytes(&self) -> i64 {
        self.events()
            .iter()
            .map(|e| match *e {
                PressureEvent::Allocated(n) => n as i64,
                PressureEvent::Freed(n) => -(n as i64),
            })
            .sum()
    }

    fn push(&self, event: PressureEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl PressureCounter for RecordingPressure {
    fn notify_allocated(&self, bytes: u64) {
        self.push(PressureEvent::Allocated(bytes));
    }

    fn notify_freed(&self, bytes: u64) {
        self.push(PressureEvent::Freed(bytes));
    }
}

/// Byte source that hands out at most `chunk` bytes per `read` call.
///
/// Exercises callers that assume a single `read` fills the buffer.
pub struct ChunkedReader {
    inner: Cursor<Vec<u8>>,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        assert!(chunk > 0, "chunk must be non-zero");
        Self {
            inner: Cursor::new(data),
            chunk,
        }
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.inner.read(&mut buf[..n])
    }
}

impl Seek for ChunkedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Seekable byte source that fails once `fail_at` bytes have been read.
///
/// Its reported length covers the full data, so length-based loaders
/// allocate before they discover the failure.
pub struct FailingReader {
    inner: Cursor<Vec<u8>>,
    fail_at: u64,
}

impl FailingReader {
    pub fn new(data: Vec<u8>, fail_at: u64) -> Self {
        Self {
            inner: Cursor::new(data),
            fail_at,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.inner.position();
        if pos >= self.fail_at {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source failed"));
        }
        let allowed = (self.fail_at - pos).min(buf.len() as u64) as usize;
        self.inner.read(&mut buf[..allowed])
    }
}

impl Seek for FailingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
