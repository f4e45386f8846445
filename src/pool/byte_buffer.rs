//! Cursor-based byte buffer
//!
//! Writes always append at the end of the buffer; reads consume from a
//! separate cursor. Short reads never fail: they return a zero value (or
//! `None` for byte slices) and leave the cursor where it was, so a frame that
//! has only partially arrived can be retried after more data is appended.
//!
//! All multi-byte integers are big-endian.

use bytes::{Buf, BufMut};
use std::fmt;
use std::io::{self, Read, Write};

/// Default capacity of a freshly allocated buffer
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Smallest capacity used when reading into a buffer with no storage
const MIN_READ_SIZE: usize = 64;

/// Largest single request made by [`ByteBuffer::read_from`]
pub const READ_CHUNK: usize = 8192;

/// A growable byte container with a read cursor
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ByteBuffer {
    /// Create a buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a buffer with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Logical length (bytes written, read or not)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Allocated capacity
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Current read cursor
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Full content, independent of the cursor
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Content not yet consumed by the cursor
    pub fn unread(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Replace the content with `src` and rewind the cursor
    pub fn set(&mut self, src: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(src);
        self.pos = 0;
    }

    /// Replace the content with `s` and rewind the cursor
    pub fn set_str(&mut self, s: &str) {
        self.set(s.as_bytes());
    }

    /// Full content as text, replacing invalid UTF-8
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Zero the cursor and the logical length, keeping the allocation
    pub fn reset(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    // Writers

    /// Append raw bytes, returning the number written
    pub fn write(&mut self, src: &[u8]) -> usize {
        self.data.extend_from_slice(src);
        src.len()
    }

    pub fn write_byte(&mut self, b: u8) {
        self.data.push(b);
    }

    pub fn write_str(&mut self, s: &str) -> usize {
        self.write(s.as_bytes())
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.put_u16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.put_u32(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.data.put_u64(v);
    }

    // Pickers: look at the cursor without consuming

    pub fn pick_byte(&self) -> u8 {
        self.unread().first().copied().unwrap_or(0)
    }

    pub fn pick_u16(&self) -> u16 {
        match self.peek(2) {
            Some(mut src) => src.get_u16(),
            None => 0,
        }
    }

    pub fn pick_u32(&self) -> u32 {
        match self.peek(4) {
            Some(mut src) => src.get_u32(),
            None => 0,
        }
    }

    pub fn pick_u64(&self) -> u64 {
        match self.peek(8) {
            Some(mut src) => src.get_u64(),
            None => 0,
        }
    }

    /// Next `n` bytes without consuming them, `None` if fewer remain
    pub fn pick_bytes(&self, n: usize) -> Option<&[u8]> {
        self.peek(n)
    }

    // Readers: consume from the cursor

    pub fn read_byte(&mut self) -> u8 {
        let v = self.pick_byte();
        if self.remaining() >= 1 {
            self.pos += 1;
        }
        v
    }

    pub fn read_u16(&mut self) -> u16 {
        let v = self.pick_u16();
        self.advance_if_available(2);
        v
    }

    pub fn read_u32(&mut self) -> u32 {
        let v = self.pick_u32();
        self.advance_if_available(4);
        v
    }

    pub fn read_u64(&mut self) -> u64 {
        let v = self.pick_u64();
        self.advance_if_available(8);
        v
    }

    /// Consume the next `n` bytes, `None` (cursor untouched) if fewer remain
    pub fn read_bytes(&mut self, n: usize) -> Option<&[u8]> {
        if n > self.remaining() {
            return None;
        }
        let start = self.pos;
        self.pos += n;
        Some(&self.data[start..start + n])
    }

    /// Consume up to and including the next `sep`, returning what preceded it.
    ///
    /// An empty separator means `"\n"`. Returns `None` and leaves the cursor
    /// alone when the separator has not arrived yet.
    pub fn read_line(&mut self, sep: &[u8]) -> Option<&[u8]> {
        let sep: &[u8] = if sep.is_empty() { b"\n" } else { sep };
        let offset = self
            .unread()
            .windows(sep.len())
            .position(|window| window == sep)?;

        let start = self.pos;
        self.pos += offset + sep.len();
        Some(&self.data[start..start + offset])
    }

    /// Move the cursor by `n` (backwards when negative), clamped to the content
    pub fn drain(&mut self, n: isize) {
        self.pos = if n >= 0 {
            self.pos.saturating_add(n.unsigned_abs()).min(self.data.len())
        } else {
            self.pos.saturating_sub(n.unsigned_abs())
        };
    }

    /// Drop consumed bytes, moving unread content to offset 0
    pub fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        if self.pos >= self.data.len() {
            self.reset();
            return;
        }
        self.data.drain(..self.pos);
        self.pos = 0;
    }

    // Transfers to and from external I/O

    /// Perform one read from `src` into spare capacity.
    ///
    /// At most [`READ_CHUNK`] bytes are requested, so a trickling source
    /// costs the same per call however large the buffer has grown. Returns
    /// the number of bytes appended; `Ok(0)` means end of input.
    pub fn read_from<R: Read + ?Sized>(&mut self, src: &mut R) -> io::Result<usize> {
        let start = self.data.len();
        if start == self.data.capacity() {
            // Double the allocation once the spare room is gone
            self.data.reserve(start.max(MIN_READ_SIZE));
        }
        let end = start + (self.data.capacity() - start).min(READ_CHUNK);
        self.data.resize(end, 0);

        let result = loop {
            match src.read(&mut self.data[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        let n = *result.as_ref().unwrap_or(&0);
        self.data.truncate(start + n);
        result
    }

    /// Read from `src` until end of input, returning the bytes appended.
    ///
    /// Spare capacity is zeroed once per growth step, not once per read.
    /// Bytes read before a failure are kept.
    pub fn read_all<R: Read + ?Sized>(&mut self, src: &mut R) -> io::Result<usize> {
        let start = self.data.len();
        let mut end = start;

        let result = loop {
            if end == self.data.len() {
                if end == self.data.capacity() {
                    self.data.reserve(end.max(MIN_READ_SIZE));
                }
                self.data.resize(self.data.capacity(), 0);
            }

            match src.read(&mut self.data[end..]) {
                Ok(0) => break Ok(end - start),
                Ok(n) => end = (end + n).min(self.data.len()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };

        self.data.truncate(end);
        result
    }

    /// Write the full content (not just the unread part) to `dst`
    pub fn write_to<W: Write + ?Sized>(&self, dst: &mut W) -> io::Result<usize> {
        dst.write_all(&self.data)?;
        Ok(self.data.len())
    }

    fn peek(&self, n: usize) -> Option<&[u8]> {
        if n > self.remaining() {
            return None;
        }
        Some(&self.data[self.pos..self.pos + n])
    }

    fn advance_if_available(&mut self, n: usize) {
        if n <= self.remaining() {
            self.pos += n;
        }
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.data.len())
            .field("capacity", &self.data.capacity())
            .field("pos", &self.pos)
            .finish()
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ByteBuffer::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ByteBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
