//! Constructing arrays from byte streams.
//!
//! Both loaders allocate first and then copy through an internal
//! [`StreamView`](crate::StreamView). Any failure after allocation disposes
//! the partially built array before the error is returned, so a failed
//! load leaves no allocation and no net pressure behind.

use std::io::{self, Read, Seek, SeekFrom};

use offheap_core::{ArrayError, ShortReadPolicy};
use tracing::warn;

use crate::array::UnmanagedArray;
use crate::config::ArrayConfig;
use crate::element::Element;

impl<T: Element> UnmanagedArray<T> {
    /// Load everything between the stream's position and its end.
    ///
    /// The element count is the remaining byte count divided by the element
    /// size, rounded up; bytes of a trailing partial element that the
    /// stream does not supply are zero.
    pub fn load_remaining<S: Read + Seek + ?Sized>(stream: &mut S) -> Result<Self, ArrayError> {
        Self::load_remaining_with(stream, &ArrayConfig::default())
    }

    /// [`load_remaining`](UnmanagedArray::load_remaining) with an explicit
    /// configuration.
    pub fn load_remaining_with<S: Read + Seek + ?Sized>(
        stream: &mut S,
        config: &ArrayConfig,
    ) -> Result<Self, ArrayError> {
        if Self::ELEMENT_SIZE == 0 {
            return Err(ArrayError::argument("element type has zero size"));
        }
        let remaining = remaining_len(stream)?;
        let remaining = usize::try_from(remaining).map_err(|_| {
            ArrayError::argument(format!(
                "{remaining} stream bytes exceed the address space"
            ))
        })?;
        let count = remaining.div_ceil(Self::ELEMENT_SIZE);

        let array = Self::allocate_with(count, config)?;
        let result = array
            .copy_from_reader(stream, None)
            .and_then(|copied| {
                array.settle_short_read(copied, remaining as u64, config.short_read)
            });
        array.finish_load(result)
    }

    /// Load exactly `count` elements from `reader`.
    ///
    /// Reads `count * ELEMENT_SIZE` bytes. If the reader ends early the
    /// configured [`ShortReadPolicy`] decides between zero-filling the rest
    /// and failing with [`io::ErrorKind::UnexpectedEof`].
    pub fn load_count<R: Read + ?Sized>(reader: &mut R, count: usize) -> Result<Self, ArrayError> {
        Self::load_count_with(reader, count, &ArrayConfig::default())
    }

    /// [`load_count`](UnmanagedArray::load_count) with an explicit
    /// configuration.
    pub fn load_count_with<R: Read + ?Sized>(
        reader: &mut R,
        count: usize,
        config: &ArrayConfig,
    ) -> Result<Self, ArrayError> {
        let array = Self::allocate_with(count, config)?;
        let expected = array.byte_length() as u64;
        let result = array
            .copy_from_reader(reader, Some(expected))
            .and_then(|copied| array.settle_short_read(copied, expected, config.short_read));
        array.finish_load(result)
    }

    /// Copy from `reader` into a fresh view, at most `limit` bytes if given.
    fn copy_from_reader<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        limit: Option<u64>,
    ) -> Result<u64, ArrayError> {
        let mut view = self.create_view()?;
        let copied = match limit {
            Some(limit) => io::copy(&mut reader.take(limit), &mut view)?,
            None => io::copy(reader, &mut view)?,
        };
        view.close();
        Ok(copied)
    }

    fn settle_short_read(
        &self,
        copied: u64,
        expected: u64,
        policy: ShortReadPolicy,
    ) -> Result<(), ArrayError> {
        if copied >= expected {
            return Ok(());
        }
        match policy {
            ShortReadPolicy::ZeroFill => {
                warn!(
                    array = %self.id(),
                    expected,
                    received = copied,
                    "short read while loading; zero-filling the remainder"
                );
                let pin = self
                    .buffer()
                    .acquire()
                    .map_err(|_| ArrayError::disposed("UnmanagedArray"))?;
                let start = copied as usize;
                pin.zero_bytes(start, self.byte_length() - start);
                Ok(())
            }
            ShortReadPolicy::Fail => Err(ArrayError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {expected} bytes, stream supplied {copied}"),
            ))),
        }
    }

    fn finish_load(self, result: Result<(), ArrayError>) -> Result<Self, ArrayError> {
        match result {
            Ok(()) => Ok(self),
            Err(e) => {
                self.dispose();
                Err(e)
            }
        }
    }
}

/// Bytes between the stream's current position and its end. The position
/// is left unchanged.
fn remaining_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let position = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    if end != position {
        stream.seek(SeekFrom::Start(position))?;
    }
    Ok(end.saturating_sub(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ten_bytes_of_u32_round_up_to_three() {
        let mut src = Cursor::new((1u8..=10).collect::<Vec<_>>());
        let arr = UnmanagedArray::<u32>::load_remaining(&mut src).unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.byte_length(), 12);
        let mut bytes = vec![0u8; 12];
        arr.create_view().unwrap().read_exact(&mut bytes).unwrap();
        assert_eq!(&bytes[..10], &(1u8..=10).collect::<Vec<_>>()[..]);
        assert_eq!(&bytes[10..], &[0, 0]);
    }

    #[test]
    fn load_remaining_starts_at_current_position() {
        let mut src = Cursor::new(vec![9u8, 9, 1, 0, 2, 0]);
        src.set_position(2);
        let arr = UnmanagedArray::<u16>::load_remaining(&mut src).unwrap();
        assert_eq!(
            arr.to_vec().unwrap(),
            vec![u16::from_ne_bytes([1, 0]), u16::from_ne_bytes([2, 0])]
        );
        assert_eq!(src.position(), 6);
    }

    #[test]
    fn load_remaining_of_exhausted_stream_is_empty() {
        let mut src = Cursor::new(vec![1u8, 2]);
        src.set_position(2);
        let arr = UnmanagedArray::<u64>::load_remaining(&mut src).unwrap();
        assert!(arr.is_empty());
    }

    #[test]
    fn load_count_reads_exactly_count_elements() {
        let values = [10u32, 20, 30, 40];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut src = Cursor::new(bytes);
        let arr = UnmanagedArray::<u32>::load_count(&mut src, 3).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![10, 20, 30]);
        assert_eq!(src.position(), 12);
    }

    #[test]
    fn short_read_zero_fills_by_default() {
        let mut src = Cursor::new(vec![0xFFu8; 5]);
        let arr = UnmanagedArray::<u32>::load_count(&mut src, 2).unwrap();
        assert_eq!(arr.get(0).unwrap(), u32::MAX);
        assert_eq!(arr.get(1).unwrap(), u32::from_ne_bytes([0xFF, 0, 0, 0]));
    }

    #[test]
    fn short_read_can_fail() {
        let config = ArrayConfig::default().with_short_read(ShortReadPolicy::Fail);
        let mut src = Cursor::new(vec![1u8; 3]);
        match UnmanagedArray::<u32>::load_count_with(&mut src, 1, &config) {
            Err(ArrayError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn zero_sized_element_rejected_before_division() {
        let mut src = Cursor::new(vec![1u8; 3]);
        assert!(matches!(
            UnmanagedArray::<[u32; 0]>::load_remaining(&mut src),
            Err(ArrayError::Argument { .. })
        ));
    }
}
