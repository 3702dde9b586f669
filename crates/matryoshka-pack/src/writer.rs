use std::io::{ErrorKind, Read};

use matryoshka_index::ChunkRef;
use matryoshka_store::Storage;

use crate::error::{PackError, PackResult};

/// Default size of the copy buffer used while appending chunks.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Appends chunk bytes behind the current end of a container.
///
/// The writer streams from its source through a fixed buffer, so peak
/// memory is bounded by the buffer size, not the chunk size. It writes only
/// to storage past `start`; nothing it writes is reachable until a new index
/// referencing the returned [`ChunkRef`]s is committed.
pub struct ChunkWriter<'a, S: Storage> {
    storage: &'a mut S,
    start: u64,
    position: u64,
    buffer: Vec<u8>,
}

impl<'a, S: Storage> ChunkWriter<'a, S> {
    /// Start appending at `position`.
    pub fn new(storage: &'a mut S, position: u64, buffer_size: usize) -> Self {
        Self {
            storage,
            start: position,
            position,
            buffer: vec![0u8; buffer_size.max(1)],
        }
    }

    /// Offset the next chunk will be written at.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.position - self.start
    }

    /// Append chunks with the given lengths, in order, reading from `source`.
    ///
    /// `lengths` is consumed lazily and must add up to `total`. `source` must
    /// yield exactly `total` bytes; a shorter or longer source is reported as
    /// [`PackError::SourceChanged`].
    pub fn append_all<R, I>(
        &mut self,
        mut source: R,
        total: u64,
        lengths: I,
    ) -> PackResult<Vec<ChunkRef>>
    where
        R: Read,
        I: IntoIterator<Item = u64>,
    {
        let lengths = lengths.into_iter();
        let mut chunks = Vec::with_capacity(lengths.size_hint().0);
        let mut consumed = 0u64;

        for (seq, len) in lengths.enumerate() {
            let chunk = self.append_chunk(seq as u32, &mut source, len, |got| {
                PackError::SourceChanged {
                    expected: total,
                    actual: consumed + got,
                }
            })?;
            consumed += chunk.len;
            chunks.push(chunk);
        }
        if consumed != total {
            return Err(PackError::SourceChanged {
                expected: total,
                actual: consumed,
            });
        }

        let mut extra = [0u8; 1];
        if read_some(&mut source, &mut extra)? != 0 {
            return Err(PackError::SourceChanged {
                expected: total,
                actual: total + 1,
            });
        }
        Ok(chunks)
    }

    fn append_chunk<R: Read>(
        &mut self,
        seq: u32,
        source: &mut R,
        len: u64,
        short: impl FnOnce(u64) -> PackError,
    ) -> PackResult<ChunkRef> {
        let offset = self.position;
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = len;

        while remaining > 0 {
            let want = remaining.min(self.buffer.len() as u64) as usize;
            let got = read_some(source, &mut self.buffer[..want])?;
            if got == 0 {
                return Err(short(len - remaining));
            }
            let block = &self.buffer[..got];
            hasher.update(block);
            self.storage.write_at(self.position, block)?;
            self.position += got as u64;
            remaining -= got as u64;
        }

        let chunk = ChunkRef {
            seq,
            offset,
            len,
            crc32: hasher.finalize(),
        };
        tracing::trace!(seq, offset, len, crc32 = chunk.crc32, "appended chunk");
        Ok(chunk)
    }
}

fn read_some<R: Read>(source: &mut R, buf: &mut [u8]) -> PackResult<usize> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PackError::Source(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matryoshka_store::MemoryStorage;
    use matryoshka_types::ChunkSize;

    fn data(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn appends_planned_chunks_contiguously() {
        let mut storage = MemoryStorage::new();
        let input = data(200);
        let plan = ChunkSize::from_raw(64).plan(200);

        let mut writer = ChunkWriter::new(&mut storage, 64, 16);
        let chunks = writer.append_all(input.as_slice(), 200, plan).unwrap();
        assert_eq!(writer.position(), 264);
        assert_eq!(writer.written(), 200);

        let lens: Vec<u64> = chunks.iter().map(|c| c.len).collect();
        assert_eq!(lens, vec![64, 64, 64, 8]);
        assert_eq!(chunks[1].offset, 128);
        assert_eq!(chunks[3].seq, 3);
        assert_eq!(chunks[0].crc32, crc32fast::hash(&input[..64]));
        assert_eq!(&storage.to_bytes()[64..], input.as_slice());
    }

    #[test]
    fn empty_source_produces_no_chunks() {
        let mut storage = MemoryStorage::new();
        let mut writer = ChunkWriter::new(&mut storage, 64, 16);
        let chunks = writer
            .append_all(&b""[..], 0, ChunkSize::Unchunked.plan(0))
            .unwrap();
        assert!(chunks.is_empty());
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn short_source_is_reported() {
        let mut storage = MemoryStorage::new();
        let mut writer = ChunkWriter::new(&mut storage, 64, 8);
        let err = writer
            .append_all(&data(10)[..], 12, ChunkSize::from_raw(4).plan(12))
            .unwrap_err();
        assert!(matches!(
            err,
            PackError::SourceChanged {
                expected: 12,
                actual: 10
            }
        ));
    }

    #[test]
    fn long_source_is_reported() {
        let mut storage = MemoryStorage::new();
        let mut writer = ChunkWriter::new(&mut storage, 64, 8);
        let err = writer
            .append_all(&data(13)[..], 12, ChunkSize::from_raw(4).plan(12))
            .unwrap_err();
        assert!(matches!(err, PackError::SourceChanged { expected: 12, .. }));
    }

    #[test]
    fn tiny_buffer_still_writes_whole_chunks() {
        let mut storage = MemoryStorage::new();
        let input = data(33);
        let mut writer = ChunkWriter::new(&mut storage, 0, 1);
        let chunks = writer
            .append_all(input.as_slice(), 33, ChunkSize::Unchunked.plan(33))
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].crc32, crc32fast::hash(&input));
        assert_eq!(storage.to_bytes(), input);
    }

    #[test]
    fn one_byte_chunks_stream_a_large_plan() {
        let mut storage = MemoryStorage::new();
        let input = data(4096);
        let plan = ChunkSize::from_raw(1).plan(4096);
        assert_eq!(plan.size_hint(), (4096, Some(4096)));

        let mut writer = ChunkWriter::new(&mut storage, 0, 8);
        let chunks = writer.append_all(input.as_slice(), 4096, plan).unwrap();
        assert_eq!(chunks.len(), 4096);
        assert!(chunks.iter().all(|c| c.len == 1));
        assert_eq!(chunks[4095].offset, 4095);
        assert_eq!(storage.to_bytes(), input);
    }

    #[test]
    fn plan_not_matching_total_is_rejected() {
        let mut storage = MemoryStorage::new();
        let mut writer = ChunkWriter::new(&mut storage, 0, 8);
        let err = writer
            .append_all(&data(8)[..], 12, ChunkSize::from_raw(4).plan(8))
            .unwrap_err();
        assert!(matches!(
            err,
            PackError::SourceChanged {
                expected: 12,
                actual: 8
            }
        ));
    }
}
