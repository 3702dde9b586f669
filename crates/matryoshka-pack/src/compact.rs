use matryoshka_index::{IndexEntry, PathIndex};
use matryoshka_store::Storage;

use crate::error::{PackError, PackResult};
use crate::header::{Header, HEADER_LEN};
use crate::image::{self, Image};
use crate::reader::EntryReader;
use crate::writer::ChunkWriter;

/// Result of rewriting a container without its dead regions.
pub struct Compacted<S> {
    /// Scratch storage holding the rewritten container.
    pub storage: S,
    pub image: Image,
    /// Bytes the rewrite saves compared to the source.
    pub reclaimed: u64,
}

/// Copy every live entry of `index` into fresh scratch storage.
///
/// Entry ids, paths, chunk lengths and the id counter are preserved; only
/// chunk offsets change. Every chunk is CRC-checked while it is copied, so
/// a damaged entry aborts the rewrite and leaves `storage` untouched.
pub fn compact<S: Storage>(
    storage: &S,
    index: &PathIndex,
    buffer_size: usize,
    sync: bool,
) -> PackResult<Compacted<S>> {
    let mut scratch = storage.scratch()?;
    let mut writer = ChunkWriter::new(&mut scratch, HEADER_LEN, buffer_size);
    let mut entries = Vec::with_capacity(index.len());

    for entry in index.iter() {
        let lengths = entry.chunks.iter().map(|c| c.len);
        let chunks = writer
            .append_all(EntryReader::new(storage, entry), entry.size, lengths)
            .map_err(PackError::flatten)?;
        entries.push(IndexEntry {
            chunks,
            ..entry.clone()
        });
    }
    let data_end = writer.position();

    let rewritten = PathIndex::from_parts(index.next_id(), entries)?;
    let header: Header = image::commit(&mut scratch, &rewritten, data_end, sync)?;

    let before = storage.len()?;
    let after = scratch.len()?;
    tracing::debug!(
        entries = rewritten.len(),
        before,
        after,
        "compacted container into scratch storage"
    );
    Ok(Compacted {
        storage: scratch,
        image: Image {
            header,
            index: rewritten,
            trailing: 0,
        },
        reclaimed: before.saturating_sub(after),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use matryoshka_store::MemoryStorage;
    use matryoshka_types::{ChunkSize, InnerPath};

    fn push(storage: &mut MemoryStorage, image: &mut Image, path: &str, data: &[u8]) {
        let size = ChunkSize::from_raw(5);
        let chunks = ChunkWriter::new(storage, image.append_offset(), 8)
            .append_all(data, data.len() as u64, size.plan(data.len() as u64))
            .unwrap();
        let end = chunks.last().map_or(image.append_offset(), |c| c.end());
        let id = image.index.allocate_id();
        image
            .index
            .insert(IndexEntry::new(id, InnerPath::parse(path), size, chunks))
            .unwrap();
        image.header = image::commit(storage, &image.index, end, true).unwrap();
    }

    #[test]
    fn compaction_drops_dead_regions() {
        let mut storage = MemoryStorage::new();
        let mut image = image::initialize(&mut storage, true).unwrap();
        push(&mut storage, &mut image, "keep", b"kept bytes here");
        push(&mut storage, &mut image, "drop", &[9u8; 300]);
        let dropped = image.index.lookup(&InnerPath::parse("drop")).unwrap().id;
        image.index.remove(dropped).unwrap();
        image.header = image::commit(
            &mut storage,
            &image.index,
            image.append_offset(),
            true,
        )
        .unwrap();

        let compacted = compact(&storage, &image.index, 4, true).unwrap();
        assert!(compacted.reclaimed >= 300);
        assert_eq!(compacted.image.index.next_id(), image.index.next_id());

        let reopened = image::open(&compacted.storage).unwrap();
        let entry = reopened.index.lookup(&InnerPath::parse("keep")).unwrap();
        assert_eq!(entry.chunk_count(), 3);
        let bytes = EntryReader::new(&compacted.storage, entry)
            .read_to_vec()
            .unwrap();
        assert_eq!(bytes, b"kept bytes here");
        assert!(reopened.index.lookup(&InnerPath::parse("drop")).is_none());
    }

    #[test]
    fn damaged_entry_aborts_compaction() {
        let mut storage = MemoryStorage::new();
        let mut image = image::initialize(&mut storage, true).unwrap();
        push(&mut storage, &mut image, "x", b"abcdefghij");
        let offset = image.index.iter().next().unwrap().chunks[1].offset;
        storage.poke(offset as usize, b'Z');
        let before = storage.to_bytes();

        let err = compact(&storage, &image.index, 4, true).err().unwrap();
        assert!(matches!(err, PackError::ChunkCrcMismatch { seq: 1, .. }));
        assert_eq!(storage.to_bytes(), before);
    }
}
