//! Fixed capacity staging buffers.
//!
//! Every serializer in this crate writes into memory it does not own the size of:
//! either a caller supplied `&mut [u8]` or a [`WriteBuffer`] whose capacity is
//! chosen once and never grows. Segments that do not fit are resumed on the next
//! call through an offset cursor, see [`copy_segment`].

use std::fmt;

/// Copies as much of `segment[*offset..]` into `dst` as fits and advances `offset`.
///
/// Returns the number of bytes copied. The segment is exhausted once
/// `*offset == segment.len()`.
#[inline]
pub fn copy_segment(segment: &[u8], offset: &mut usize, dst: &mut [u8]) -> usize {
    let remaining = &segment[(*offset).min(segment.len())..];
    let n = remaining.len().min(dst.len());
    dst[..n].copy_from_slice(&remaining[..n]);
    *offset += n;
    n
}

/// A fixed capacity byte region with a write cursor.
///
/// The buffer is allocated once and reused across messages. Readers get the filled
/// prefix through [`WriteBuffer::filled`]; the borrow checker guarantees that a
/// delivered slice is not held across the next write.
pub struct WriteBuffer {
    buf: Box<[u8]>,
    filled: usize,
}

impl WriteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0; capacity].into_boxed_slice(), filled: 0 }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.filled
    }

    /// The bytes written since the last [`WriteBuffer::clear`].
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// The unwritten tail, to be handed to a serializer.
    #[inline]
    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Marks `n` more bytes of the unwritten tail as filled.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`WriteBuffer::remaining`].
    #[inline]
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "advance {n} past the end of a {} byte buffer", self.capacity());
        self.filled += n;
    }

    /// Copies the unwritten part of a segment into the buffer, see [`copy_segment`].
    #[inline]
    pub fn put_segment(&mut self, segment: &[u8], offset: &mut usize) -> usize {
        let n = copy_segment(segment, offset, &mut self.buf[self.filled..]);
        self.filled += n;
        n
    }

    #[inline]
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}

impl fmt::Debug for WriteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuffer").field("capacity", &self.capacity()).field("filled", &self.filled).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_segment_resumes_from_offset() {
        let segment = b"hello world";
        let mut offset = 0;

        let mut dst = [0u8; 4];
        assert_eq!(copy_segment(segment, &mut offset, &mut dst), 4);
        assert_eq!(&dst, b"hell");
        assert_eq!(offset, 4);

        let mut dst = [0u8; 16];
        assert_eq!(copy_segment(segment, &mut offset, &mut dst), 7);
        assert_eq!(&dst[..7], b"o world");
        assert_eq!(offset, segment.len());

        assert_eq!(copy_segment(segment, &mut offset, &mut dst), 0);
    }

    #[test]
    fn copy_segment_into_empty_destination() {
        let mut offset = 0;
        assert_eq!(copy_segment(b"abc", &mut offset, &mut []), 0);
        assert_eq!(offset, 0);
    }

    #[test]
    fn write_buffer_never_grows() {
        let mut buffer = WriteBuffer::with_capacity(8);
        let mut offset = 0;

        assert_eq!(buffer.put_segment(b"0123456789", &mut offset), 8);
        assert!(buffer.is_full());
        assert_eq!(buffer.filled(), b"01234567");
        assert_eq!(buffer.put_segment(b"0123456789", &mut offset), 0);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.put_segment(b"0123456789", &mut offset), 2);
        assert_eq!(buffer.filled(), b"89");
        assert_eq!(buffer.capacity(), 8);
    }

    #[test]
    fn advance_marks_external_writes() {
        let mut buffer = WriteBuffer::with_capacity(4);
        buffer.unfilled_mut()[..2].copy_from_slice(b"ok");
        buffer.advance(2);
        assert_eq!(buffer.filled(), b"ok");
        assert_eq!(buffer.remaining(), 2);
    }

    #[test]
    #[should_panic]
    fn advance_past_capacity_panics() {
        let mut buffer = WriteBuffer::with_capacity(2);
        buffer.advance(3);
    }
}
