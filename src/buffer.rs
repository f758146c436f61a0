//! Reusable byte sink/source pair driving the codec writers/readers.

use crate::error::BufferError;

enum Storage<'a> {
    Owned(Vec<u8>),
    Fixed(&'a mut [u8]),
}

/// Growable (by doubling) or fixed-region byte sink.
///
/// Growable buffers never fail a write; fixed-region buffers fail with
/// `BufferError::Full` once their capacity is exhausted, matching the
/// source's "grow = false, overflow is a hard error" contract.
pub struct OutputBuffer<'a> {
    storage: Storage<'a>,
    pos: usize,
}

impl<'a> OutputBuffer<'a> {
    pub fn new() -> Self {
        Self {
            storage: Storage::Owned(Vec::with_capacity(64)),
            pos: 0,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            storage: Storage::Owned(Vec::with_capacity(cap)),
            pos: 0,
        }
    }

    /// Wraps a caller-supplied fixed region. Writes beyond its length fail.
    pub fn fixed(region: &'a mut [u8]) -> Self {
        Self {
            storage: Storage::Fixed(region),
            pos: 0,
        }
    }

    fn grow_or_error(&mut self, needed: usize) -> Result<(), BufferError> {
        match &mut self.storage {
            Storage::Owned(v) => {
                let mut cap = v.capacity().max(64);
                while cap < self.pos + needed {
                    cap *= 2;
                }
                if cap > v.capacity() {
                    v.reserve(cap - v.len());
                    tracing::trace!(new_capacity = cap, "output buffer grown");
                }
                Ok(())
            }
            Storage::Fixed(region) => {
                if self.pos + needed > region.len() {
                    Err(BufferError::Full {
                        requested: needed,
                        available: region.len().saturating_sub(self.pos),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn put(&mut self, byte: u8) -> Result<(), BufferError> {
        self.grow_or_error(1)?;
        match &mut self.storage {
            Storage::Owned(v) => {
                if self.pos == v.len() {
                    v.push(byte);
                } else {
                    v[self.pos] = byte;
                }
            }
            Storage::Fixed(region) => region[self.pos] = byte,
        }
        self.pos += 1;
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.grow_or_error(bytes.len())?;
        match &mut self.storage {
            Storage::Owned(v) => {
                let end = self.pos + bytes.len();
                if end > v.len() {
                    v.resize(end, 0);
                }
                v[self.pos..end].copy_from_slice(bytes);
            }
            Storage::Fixed(region) => {
                region[self.pos..self.pos + bytes.len()].copy_from_slice(bytes)
            }
        }
        self.pos += bytes.len();
        Ok(())
    }

    /// Reserves `count` bytes and returns a writable window over them,
    /// advancing the position.
    pub fn push(&mut self, count: usize) -> Result<&mut [u8], BufferError> {
        self.grow_or_error(count)?;
        let start = self.pos;
        match &mut self.storage {
            Storage::Owned(v) => {
                let end = start + count;
                if end > v.len() {
                    v.resize(end, 0);
                }
            }
            Storage::Fixed(_) => {}
        }
        self.pos += count;
        Ok(self.window_mut(start, self.pos))
    }

    /// Returns the last `count` written bytes without shrinking the buffer.
    pub fn pop(&mut self, count: usize) -> &[u8] {
        let count = count.min(self.pos);
        let start = self.pos - count;
        self.window(start, self.pos)
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn resize(&mut self, new_capacity: usize) {
        if let Storage::Owned(v) = &mut self.storage {
            if new_capacity > v.capacity() {
                v.reserve(new_capacity - v.len());
            }
        }
    }

    /// Writes a terminator byte at the current position without advancing.
    pub fn set_eos(&mut self, byte: u8) {
        let pos = self.pos;
        let _ = self.put(byte);
        self.pos = pos;
    }

    pub fn data(&self) -> &[u8] {
        self.window(0, self.pos)
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn window(&self, start: usize, end: usize) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => &v[start..end],
            Storage::Fixed(region) => &region[start..end],
        }
    }

    fn window_mut(&mut self, start: usize, end: usize) -> &mut [u8] {
        match &mut self.storage {
            Storage::Owned(v) => &mut v[start..end],
            Storage::Fixed(region) => &mut region[start..end],
        }
    }
}

impl<'a> Default for OutputBuffer<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only positional view over a byte region.
pub struct InputCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> InputCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn end(&self) -> usize {
        self.bytes.len()
    }

    pub fn seek(&mut self, pos: usize) -> Option<()> {
        if pos <= self.bytes.len() {
            self.pos = pos;
            Some(())
        } else {
            None
        }
    }

    pub fn get_byte(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    pub fn get_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(count)?;
        if end > self.bytes.len() {
            return None;
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    /// Advances `count` bytes, returning the window just passed over.
    pub fn push(&mut self, count: usize) -> Option<&'a [u8]> {
        self.get_bytes(count)
    }

    /// Rewinds `count` bytes, returning the window now ahead of the cursor.
    pub fn pop(&mut self, count: usize) -> Option<&'a [u8]> {
        let count = count.min(self.pos);
        self.pos -= count;
        Some(&self.bytes[self.pos..self.pos + count])
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growable_buffer_never_fails() {
        let mut buf = OutputBuffer::new();
        for i in 0..200u16 {
            buf.put((i % 256) as u8).unwrap();
        }
        assert_eq!(buf.len(), 200);
    }

    #[test]
    fn fixed_buffer_reports_full() {
        let mut region = [0u8; 4];
        let mut buf = OutputBuffer::fixed(&mut region);
        buf.put_bytes(&[1, 2, 3, 4]).unwrap();
        assert!(matches!(buf.put(5), Err(BufferError::Full { .. })));
    }

    #[test]
    fn cursor_bounds_checks() {
        let data = [1u8, 2, 3];
        let mut cur = InputCursor::new(&data);
        assert_eq!(cur.get_bytes(2), Some(&data[0..2]));
        assert_eq!(cur.get_bytes(5), None);
        assert_eq!(cur.get_byte(), Some(3));
        assert_eq!(cur.get_byte(), None);
    }
}
