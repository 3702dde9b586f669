use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// How a pushed file is split into chunks.
///
/// Chunk boundaries are an I/O granularity decision only. Pulling an entry
/// yields the same bytes whatever chunk size it was pushed with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkSize {
    /// Store the whole input as a single contiguous block.
    #[default]
    Unchunked,
    /// Split the input into chunks of exactly this many bytes; the final
    /// chunk may be shorter.
    Fixed(NonZeroU64),
}

impl ChunkSize {
    /// Interpret a raw chunk size as received over a foreign interface.
    ///
    /// Zero and negative values select [`ChunkSize::Unchunked`].
    pub fn from_raw(raw: i64) -> Self {
        match u64::try_from(raw).ok().and_then(NonZeroU64::new) {
            Some(size) => Self::Fixed(size),
            None => Self::Unchunked,
        }
    }

    /// A fixed chunk size, or `None` for zero.
    pub fn fixed(size: u64) -> Option<Self> {
        NonZeroU64::new(size).map(Self::Fixed)
    }

    /// The fixed size in bytes, or `None` when unchunked.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Unchunked => None,
            Self::Fixed(size) => Some(size.get()),
        }
    }

    /// Plan the chunk lengths for an input of `total` bytes.
    pub fn plan(&self, total: u64) -> ChunkPlan {
        let step = match self {
            Self::Unchunked => total.max(1),
            Self::Fixed(size) => size.get(),
        };
        ChunkPlan {
            remaining: total,
            step,
        }
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchunked => f.write_str("unchunked"),
            Self::Fixed(size) => write!(f, "{size} bytes"),
        }
    }
}

/// Iterator over the chunk lengths of a push, in sequence order.
///
/// An empty input produces no chunks at all.
#[derive(Clone, Debug)]
pub struct ChunkPlan {
    remaining: u64,
    step: u64,
}

impl Iterator for ChunkPlan {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(self.step);
        self.remaining -= len;
        Some(len)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.div_ceil(self.step) as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for ChunkPlan {}
