//! Endpoint memory buffers
//!
//! Endpoint buffers live in the packet memory area, which the CPU sees
//! as 16-bit words. Copies in and out of a buffer move whole words.

use crate::{ral::pma, vcell::VCell};

/// A view of one endpoint buffer in packet memory
#[derive(Clone, Copy)]
pub struct Buffer {
    words: &'static [VCell<u16>],
}

impl Buffer {
    /// Create a view of `len` bytes at `offset` in packet memory
    ///
    /// `offset` is a byte offset from the start of packet memory, the same
    /// value that's written to the buffer descriptor table. Returns `None`
    /// if the buffer is misaligned, overlaps the descriptor table, or
    /// runs past the end of packet memory.
    pub fn new(pma: &'static pma::RegisterBlock, offset: u16, len: usize) -> Option<Self> {
        let start = (offset as usize).checked_sub(pma::BTABLE_SIZE)?;
        if start % 2 != 0 || len % 2 != 0 {
            return None;
        }
        let words = pma.SRAM.get(start / 2..(start + len) / 2)?;
        Some(Buffer { words })
    }

    /// Buffer capacity, in bytes
    pub fn len(&self) -> usize {
        self.words.len() * 2
    }

    /// Copy `data` into the buffer
    ///
    /// The copy is rounded up to whole words. An odd tail byte lands in the
    /// low half of the last word, and the high half is zero. Returns the
    /// number of bytes copied, which is capped at the buffer length.
    pub fn volatile_write(&self, data: &[u8]) -> usize {
        let len = data.len().min(self.len());
        for (word, chunk) in self.words.iter().zip(data[..len].chunks(2)) {
            let high = chunk.get(1).copied().unwrap_or(0);
            word.write(u16::from_le_bytes([chunk[0], high]));
        }
        len
    }

    /// Copy the start of the buffer into `out`
    ///
    /// Returns the number of bytes copied, which is capped at the buffer length.
    pub fn volatile_read(&self, out: &mut [u8]) -> usize {
        let len = out.len().min(self.len());
        for (word, chunk) in self.words.iter().zip(out[..len].chunks_mut(2)) {
            let bytes = word.read().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
        len
    }
}
