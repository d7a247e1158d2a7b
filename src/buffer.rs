// ABOUTME: Byte queue used for frame reassembly on both the client and router sides
// ABOUTME: Thin wrapper over BytesMut; the only invariant is FIFO order

use bytes::{Buf, BytesMut};

/// An append-only byte queue with peek/consume semantics, used for
/// inbound frame reassembly and outbound write staging. `BytesMut`
/// already provides amortized-cheap append (`extend_from_slice`) and
/// consume (`advance`), so this is a thin named wrapper rather than a
/// hand-rolled ring.
#[derive(Debug, Default)]
pub struct Buffer {
    inner: BytesMut,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            inner: BytesMut::new(),
        }
    }

    /// Number of bytes currently queued.
    pub fn length(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Append bytes to the tail of the queue.
    pub fn append(&mut self, bytes: &[u8]) {
        self.inner.extend_from_slice(bytes);
    }

    /// View the first `n` bytes without removing them. Panics if fewer
    /// than `n` bytes are queued; callers must check `length()` first.
    pub fn peek(&self, n: usize) -> &[u8] {
        &self.inner[..n]
    }

    /// View `n` bytes starting at `offset` without removing them.
    pub fn peek_slice(&self, offset: usize, n: usize) -> &[u8] {
        &self.inner[offset..offset + n]
    }

    /// Remove the first `n` bytes from the queue.
    pub fn consume(&mut self, n: usize) {
        self.inner.advance(n);
    }

    /// Take the entire queue, leaving it empty.
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.inner)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }
}
