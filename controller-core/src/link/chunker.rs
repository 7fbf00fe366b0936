//! Reply chunking under the negotiated transport payload.
//!
//! The radio transport frames at most `mtu - ATT_OVERHEAD` bytes per write,
//! capped at an application maximum. Longer replies are emitted as
//! sequential byte-exact slices; the receiver concatenates. The transport
//! inserts [`INTER_CHUNK_PACING`] between writes so a slow peer is not
//! flooded.

use core::time::Duration;

/// Per-write protocol overhead subtracted from the negotiated MTU.
pub const ATT_OVERHEAD: usize = 3;

/// Application cap on a single chunk regardless of MTU.
pub const MAX_CHUNK_BYTES: usize = 160;

/// Chunk size assumed when no MTU has been negotiated.
pub const FALLBACK_CHUNK_BYTES: usize = 20;

/// Pacing delay between consecutive chunks of one reply.
pub const INTER_CHUNK_PACING: Duration = Duration::from_millis(10);

/// Usable payload bytes for a negotiated MTU.
#[must_use]
pub const fn chunk_limit(mtu: usize) -> usize {
    if mtu > ATT_OVERHEAD {
        let payload = mtu - ATT_OVERHEAD;
        if payload > MAX_CHUNK_BYTES {
            MAX_CHUNK_BYTES
        } else {
            payload
        }
    } else {
        FALLBACK_CHUNK_BYTES
    }
}

/// Iterator over the byte-exact slices of one reply.
pub struct Chunks<'a> {
    remaining: &'a [u8],
    limit: usize,
}

impl<'a> Chunks<'a> {
    /// Splits `data` for the given negotiated MTU.
    #[must_use]
    pub const fn new(data: &'a [u8], mtu: usize) -> Self {
        Self {
            remaining: data,
            limit: chunk_limit(mtu),
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let take = self.remaining.len().min(self.limit);
        let (chunk, rest) = self.remaining.split_at(take);
        self.remaining = rest;
        Some(chunk)
    }
}
