//! Reading and committing the container image.
//!
//! A container image is the header, the chunk region behind it and the live
//! index snapshot. [`commit`] is the only way a new state becomes visible:
//! it writes the snapshot behind everything else, syncs, then rewrites the
//! header to point at it. Anything written after the last header rewrite is
//! unreachable and is dropped the next time the container is opened.

use matryoshka_index::PathIndex;
use matryoshka_store::Storage;

use crate::error::{PackError, PackResult};
use crate::header::{Header, HEADER_LEN};

/// A container image as found on storage.
#[derive(Debug)]
pub struct Image {
    pub header: Header,
    pub index: PathIndex,
    /// Bytes past the live index snapshot left behind by an interrupted push.
    pub trailing: u64,
}

impl Image {
    /// Offset where the next appended chunk goes.
    pub fn append_offset(&self) -> u64 {
        self.header.index_end()
    }
}

/// Write an empty container into blank storage.
pub fn initialize<S: Storage>(storage: &mut S, sync: bool) -> PackResult<Image> {
    let index = PathIndex::new();
    let header = commit(storage, &index, HEADER_LEN, sync)?;
    tracing::debug!(storage = %storage.describe(), "initialized empty container");
    Ok(Image {
        header,
        index,
        trailing: 0,
    })
}

/// Read and verify the header and live index.
///
/// Checks, in order: header magic, version and CRC; that the index region
/// lies inside the storage; the index BLAKE3 hash; that the index decodes;
/// and that every chunk it references lies between the header and the
/// index region.
pub fn open<S: Storage>(storage: &S) -> PackResult<Image> {
    let size = storage.len()?;
    if size < HEADER_LEN {
        return Err(PackError::TruncatedHeader(size));
    }

    let mut raw = [0u8; HEADER_LEN as usize];
    storage.read_at(0, &mut raw)?;
    let header = Header::from_bytes(&raw)?;

    let end = header.index_offset.checked_add(header.index_len);
    let end = match end {
        Some(end) if header.index_offset >= HEADER_LEN && end <= size => end,
        _ => {
            return Err(PackError::IndexOutOfBounds {
                offset: header.index_offset,
                end: end.unwrap_or(u64::MAX),
                size,
            })
        }
    };

    let mut snapshot = vec![0u8; header.index_len as usize];
    storage.read_at(header.index_offset, &mut snapshot)?;
    header.verify_index(&snapshot)?;

    let index = PathIndex::from_bytes(&snapshot)
        .and_then(|index| index.validate(HEADER_LEN, header.index_offset).map(|()| index))
        .map_err(PackError::CorruptIndex)?;

    let trailing = size - end;
    if trailing > 0 {
        tracing::warn!(
            storage = %storage.describe(),
            trailing,
            "ignoring uncommitted bytes past the index"
        );
    }
    Ok(Image {
        header,
        index,
        trailing,
    })
}

/// Persist `index` at offset `at` and make it the live state.
///
/// `at` must be at or past the end of every chunk the index references.
/// When `sync` is set the snapshot is flushed before the header is
/// rewritten, and the header is flushed before returning.
pub fn commit<S: Storage>(
    storage: &mut S,
    index: &PathIndex,
    at: u64,
    sync: bool,
) -> PackResult<Header> {
    let snapshot = index.to_bytes()?;
    storage.write_at(at, &snapshot)?;
    storage.set_len(at + snapshot.len() as u64)?;
    if sync {
        storage.sync()?;
    }

    let header = Header::for_index(at, &snapshot);
    storage.write_at(0, &header.to_bytes())?;
    if sync {
        storage.sync()?;
    }

    tracing::debug!(
        entries = index.len(),
        index_offset = at,
        index_len = header.index_len,
        "committed index"
    );
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ChunkWriter;
    use matryoshka_index::{ChunkRef, IndexEntry, IndexError, IndexSnapshot};
    use matryoshka_store::MemoryStorage;
    use matryoshka_types::{ChunkSize, EntryId, InnerPath};

    fn with_entry(storage: &mut MemoryStorage) -> PathIndex {
        let image = initialize(storage, true).unwrap();
        let at = image.append_offset();
        let mut index = image.index;
        let size = ChunkSize::from_raw(4);
        let chunks = ChunkWriter::new(storage, at, 16)
            .append_all(&b"0123456789"[..], 10, size.plan(10))
            .unwrap();
        let end = chunks.last().unwrap().end();
        let id = index.allocate_id();
        index
            .insert(IndexEntry::new(id, InnerPath::parse("a/b"), size, chunks))
            .unwrap();
        commit(storage, &index, end, true).unwrap();
        index
    }

    #[test]
    fn fresh_container_opens_empty() {
        let mut storage = MemoryStorage::new();
        initialize(&mut storage, true).unwrap();
        let image = open(&storage).unwrap();
        assert!(image.index.is_empty());
        assert_eq!(image.header.index_offset, HEADER_LEN);
        assert_eq!(image.trailing, 0);
    }

    #[test]
    fn committed_index_reopens() {
        let mut storage = MemoryStorage::new();
        let index = with_entry(&mut storage);
        let image = open(&storage).unwrap();
        assert_eq!(image.index, index);
        assert_eq!(image.append_offset(), storage.len().unwrap());
    }

    #[test]
    fn uncommitted_tail_is_ignored() {
        let mut storage = MemoryStorage::new();
        let index = with_entry(&mut storage);
        let len = storage.len().unwrap();
        storage.write_at(len, b"half-written chunk").unwrap();

        let image = open(&storage).unwrap();
        assert_eq!(image.index, index);
        assert_eq!(image.trailing, 18);
    }

    #[test]
    fn blank_storage_is_truncated_header() {
        let storage = MemoryStorage::new();
        assert!(matches!(open(&storage), Err(PackError::TruncatedHeader(0))));
    }

    #[test]
    fn damaged_index_is_detected() {
        let mut storage = MemoryStorage::new();
        with_entry(&mut storage);
        let last = storage.len().unwrap() as usize - 1;
        let byte = storage.to_bytes()[last];
        storage.poke(last, !byte);
        let err = open(&storage).unwrap_err();
        assert!(matches!(err, PackError::IndexChecksumMismatch));
        assert!(err.is_corruption());
    }

    #[test]
    fn truncated_index_is_out_of_bounds() {
        let mut storage = MemoryStorage::new();
        with_entry(&mut storage);
        let len = storage.len().unwrap();
        storage.set_len(len - 1).unwrap();
        assert!(matches!(
            open(&storage),
            Err(PackError::IndexOutOfBounds { .. })
        ));
    }

    fn write_snapshot(storage: &mut MemoryStorage, snapshot: &IndexSnapshot) {
        let bytes = snapshot.to_bytes().unwrap();
        storage.write_at(HEADER_LEN, &bytes).unwrap();
        let header = Header::for_index(HEADER_LEN, &bytes);
        storage.write_at(0, &header.to_bytes()).unwrap();
    }

    #[test]
    fn duplicate_paths_in_stored_index_are_corruption() {
        let mut storage = MemoryStorage::new();
        let empty = |id: EntryId| {
            IndexEntry::new(id, InnerPath::parse("x"), ChunkSize::from_raw(0), vec![])
        };
        let first = EntryId::FIRST;
        write_snapshot(
            &mut storage,
            &IndexSnapshot {
                next_id: first.next().next(),
                entries: vec![empty(first), empty(first.next())],
            },
        );

        let err = open(&storage).unwrap_err();
        assert!(matches!(
            err,
            PackError::CorruptIndex(IndexError::DuplicatePath(_))
        ));
        assert!(err.is_corruption());
    }

    #[test]
    fn out_of_region_chunk_is_corruption() {
        let mut storage = MemoryStorage::new();
        let chunk = ChunkRef {
            seq: 0,
            offset: 4096,
            len: 4,
            crc32: 0,
        };
        let entry = IndexEntry::new(
            EntryId::FIRST,
            InnerPath::parse("far"),
            ChunkSize::from_raw(4),
            vec![chunk],
        );
        write_snapshot(
            &mut storage,
            &IndexSnapshot {
                next_id: EntryId::FIRST.next(),
                entries: vec![entry],
            },
        );

        let err = open(&storage).unwrap_err();
        assert!(matches!(err, PackError::CorruptIndex(IndexError::Corrupted(_))));
    }

    #[test]
    fn foreign_file_is_rejected() {
        let storage = MemoryStorage::from_bytes(vec![b'x'; 128]);
        let err = open(&storage).unwrap_err();
        assert!(matches!(err, PackError::InvalidMagic { .. }));
        assert!(err.is_corruption());
    }
}
