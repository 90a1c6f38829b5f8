//! Byte-stream views over an array's memory.
//!
//! A [`StreamView`] is a seekable read/write cursor spanning the whole
//! allocation. Views keep their own position, share the bytes with every
//! other view and with indexed access, and implement [`Read`], [`Write`]
//! and [`Seek`]. Each I/O call pins the buffer for the duration of the
//! copy, so a view never touches released memory: once the owning array
//! is disposed every call fails with an `ObjectDisposed` error.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use offheap_core::{ArrayError, ArrayId, ViewKey};

use crate::array::ArrayShared;
use crate::pin::ScopedPointer;
use crate::registry::ViewLiveness;

/// Read/write cursor over the bytes of an unmanaged array.
///
/// Capacity is fixed at the array's byte length. The position may be moved
/// past the end; reads there return 0 bytes and writes accept 0 bytes, so
/// `write_all` reports [`io::ErrorKind::WriteZero`].
pub struct StreamView {
    shared: Arc<ArrayShared>,
    key: ViewKey,
    liveness: Arc<ViewLiveness>,
    position: u64,
}

// Compile-time assertion: StreamView must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<StreamView>();
};

impl StreamView {
    pub(crate) fn open(shared: &Arc<ArrayShared>) -> Result<Self, ArrayError> {
        if shared.buffer.is_closed() {
            return Err(ArrayError::disposed("UnmanagedArray"));
        }
        let (key, liveness) = shared.views.register()?;
        Ok(Self {
            shared: Arc::clone(shared),
            key,
            liveness,
            position: 0,
        })
    }

    /// Length of the viewed region in bytes.
    pub fn len(&self) -> u64 {
        self.shared.buffer.byte_length() as u64
    }

    /// Whether the viewed region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor. Equivalent to `seek(SeekFrom::Start(pos))` without
    /// the closed check.
    pub fn set_position(&mut self, pos: u64) {
        self.position = pos;
    }

    /// Registry key of this view.
    pub fn key(&self) -> ViewKey {
        self.key
    }

    /// Identifier of the array this view reads and writes.
    pub fn array_id(&self) -> ArrayId {
        self.shared.buffer.id()
    }

    /// Whether this view was closed, either directly or by disposal of
    /// its array.
    pub fn is_closed(&self) -> bool {
        self.liveness.is_closed() || self.shared.buffer.is_closed()
    }

    /// Close the view and remove it from its array's registry.
    /// Closing an already closed view does nothing.
    pub fn close(&mut self) {
        if self.liveness.close() {
            self.shared.views.deregister(self.key);
        }
    }

    fn ensure_open(&self) -> Result<(), ArrayError> {
        if self.is_closed() {
            return Err(ArrayError::disposed("StreamView"));
        }
        Ok(())
    }

    fn pin(&self) -> Result<ScopedPointer<'_>, ArrayError> {
        if self.liveness.is_closed() {
            return Err(ArrayError::disposed("StreamView"));
        }
        self.shared
            .buffer
            .acquire()
            .map_err(|_| ArrayError::disposed("StreamView"))
    }

    /// Bytes available between the cursor and the end, capped at `want`.
    fn span(&self, want: usize) -> usize {
        let len = self.len();
        if self.position >= len {
            return 0;
        }
        (len - self.position).min(want as u64) as usize
    }
}

impl Read for StreamView {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pin = self.pin()?;
        let n = self.span(buf.len());
        if n > 0 {
            pin.read_bytes(self.position as usize, &mut buf[..n]);
        }
        drop(pin);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for StreamView {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let pin = self.pin()?;
        let n = self.span(buf.len());
        if n > 0 {
            pin.write_bytes(self.position as usize, &buf[..n]);
        }
        drop(pin);
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        Ok(())
    }
}

impl Seek for StreamView {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.ensure_open()?;
        let (base, offset) = match pos {
            SeekFrom::Start(n) => {
                self.position = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.len(), n),
            SeekFrom::Current(n) => (self.position, n),
        };
        match base.checked_add_signed(offset) {
            Some(n) => {
                self.position = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

impl Drop for StreamView {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamView")
            .field("array", &self.array_id())
            .field("key", &self.key)
            .field("position", &self.position)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnmanagedArray;

    fn disposed(err: &io::Error) -> bool {
        ArrayError::from_io(err).is_some_and(ArrayError::is_disposed)
    }

    #[test]
    fn views_share_memory_but_not_position() {
        let arr = UnmanagedArray::<u8>::allocate(8).unwrap();
        let mut a = arr.create_view().unwrap();
        let mut b = arr.create_view().unwrap();
        a.seek(SeekFrom::Start(3)).unwrap();
        a.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(a.position(), 6);
        assert_eq!(b.position(), 0);

        b.seek(SeekFrom::Start(3)).unwrap();
        let mut out = [0u8; 3];
        b.read_exact(&mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
        assert_eq!(arr.get(4).unwrap(), 2);
    }

    #[test]
    fn indexed_writes_visible_through_view() {
        let arr = UnmanagedArray::<u16>::allocate(2).unwrap();
        arr.set(1, 0x0102).unwrap();
        let mut view = arr.create_view().unwrap();
        let mut bytes = Vec::new();
        view.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(&bytes[2..], &0x0102u16.to_ne_bytes());
    }

    #[test]
    fn writes_stop_at_capacity() {
        let arr = UnmanagedArray::<u8>::allocate(4).unwrap();
        let mut view = arr.create_view().unwrap();
        assert_eq!(view.write(&[9; 6]).unwrap(), 4);
        assert_eq!(view.write(&[9]).unwrap(), 0);
        let err = view.write_all(&[1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn seek_semantics() {
        let arr = UnmanagedArray::<u8>::allocate(10).unwrap();
        let mut view = arr.create_view().unwrap();
        assert_eq!(view.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(view.seek(SeekFrom::Current(-3)).unwrap(), 5);
        assert_eq!(view.seek(SeekFrom::Start(20)).unwrap(), 20);
        assert_eq!(view.read(&mut [0u8; 4]).unwrap(), 0);
        let err = view.seek(SeekFrom::Current(-21)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(view.position(), 20);
    }

    #[test]
    fn close_deregisters_and_blocks_io() {
        let arr = UnmanagedArray::<u8>::allocate(4).unwrap();
        let mut view = arr.create_view().unwrap();
        assert_eq!(arr.live_views(), 1);
        view.close();
        view.close();
        assert_eq!(arr.live_views(), 0);
        assert!(view.is_closed());
        assert!(disposed(&view.read(&mut [0u8; 1]).unwrap_err()));
        assert!(!arr.is_disposed());
    }

    #[test]
    fn dropped_view_leaves_registry() {
        let arr = UnmanagedArray::<u8>::allocate(4).unwrap();
        {
            let _v = arr.create_view().unwrap();
            assert_eq!(arr.live_views(), 1);
        }
        assert_eq!(arr.live_views(), 0);
    }

    #[test]
    fn dispose_force_closes_open_views() {
        let arr = UnmanagedArray::<u32>::allocate(2).unwrap();
        let mut a = arr.create_view().unwrap();
        let mut b = arr.create_view().unwrap();
        arr.dispose();
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(disposed(&a.read(&mut [0u8; 4]).unwrap_err()));
        assert!(disposed(&b.write(&[0u8; 4]).unwrap_err()));
        assert!(disposed(&b.seek(SeekFrom::Start(0)).unwrap_err()));
        assert!(disposed(&a.flush().unwrap_err()));
        a.close();
        assert_eq!(arr.live_views(), 0);
    }

    #[test]
    fn view_reports_its_array() {
        let arr = UnmanagedArray::<u64>::allocate(3).unwrap();
        let view = arr.create_view().unwrap();
        assert_eq!(view.array_id(), arr.id());
        assert_eq!(view.len(), 24);
        assert!(!view.is_empty());
    }
}
