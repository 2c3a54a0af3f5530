//! Test fixtures for generating test data.

use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// A minimal PNG header followed by filler.
#[allow(dead_code)]
pub fn png_bytes() -> Bytes {
    let mut data = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR".to_vec();
    data.extend_from_slice(&seeded_bytes(7, 64));
    Bytes::from(data)
}

/// A zero-filled reader of `len` bytes that records how much was pulled.
#[allow(dead_code)]
pub struct CountingReader {
    remaining: u64,
    consumed: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl CountingReader {
    /// Returns the reader and a handle to its consumed-byte counter.
    pub fn new(len: u64) -> (Self, Arc<AtomicU64>) {
        let consumed = Arc::new(AtomicU64::new(0));
        let reader = Self {
            remaining: len,
            consumed: consumed.clone(),
        };
        (reader, consumed)
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let n = (buf.remaining() as u64).min(self.remaining) as usize;
        buf.put_slice(&vec![0u8; n]);
        self.remaining -= n as u64;
        self.consumed.fetch_add(n as u64, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
