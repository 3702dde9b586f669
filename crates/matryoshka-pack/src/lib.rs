//! Container file format for Matryoshka.
//!
//! One host file holds a whole virtual file system: a fixed header, the
//! chunk region and a checksummed snapshot of the path index.
//!
//! # Architecture
//!
//! - **Header** (64 bytes): magic, version, location and BLAKE3 hash of the
//!   live index snapshot, CRC32 over itself
//! - **Chunk region**: raw entry bytes, one CRC32 per chunk recorded in the index
//! - **Index snapshot**: bincode-encoded [`matryoshka_index::PathIndex`]
//! - **ChunkWriter**: streams a source into chunks behind the live state
//! - **EntryReader**: reassembles an entry, verifying chunk CRCs
//! - **image**: open, initialize and commit container images
//! - **compact**: rewrite a container without dead regions

pub mod compact;
pub mod error;
pub mod header;
pub mod image;
pub mod reader;
pub mod writer;

pub use compact::{compact, Compacted};
pub use error::{PackError, PackResult};
pub use header::{Header, HEADER_LEN, MAGIC, VERSION};
pub use image::Image;
pub use reader::EntryReader;
pub use writer::{ChunkWriter, DEFAULT_BUFFER_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use matryoshka_index::IndexEntry;
    use matryoshka_store::{FileStorage, Storage};
    use matryoshka_types::{ChunkSize, InnerPath};

    #[test]
    fn file_backed_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.mtr");
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 97) as u8).collect();

        {
            let mut storage = FileStorage::open(&path, true).unwrap();
            let mut img = image::initialize(&mut storage, true).unwrap();
            let size = ChunkSize::from_raw(300);
            let total = payload.len() as u64;
            let chunks = ChunkWriter::new(&mut storage, img.append_offset(), DEFAULT_BUFFER_SIZE)
                .append_all(payload.as_slice(), total, size.plan(total))
                .unwrap();
            let end = chunks.last().unwrap().end();
            let id = img.index.allocate_id();
            img.index
                .insert(IndexEntry::new(id, InnerPath::parse("docs/data.bin"), size, chunks))
                .unwrap();
            image::commit(&mut storage, &img.index, end, true).unwrap();
        }

        let storage = FileStorage::open(&path, false).unwrap();
        let img = image::open(&storage).unwrap();
        let entry = img.index.lookup(&InnerPath::parse("docs/data.bin")).unwrap();
        assert_eq!(entry.size, 1000);
        assert_eq!(entry.chunk_count(), 4);
        let bytes = EntryReader::new(&storage, entry).read_to_vec().unwrap();
        assert_eq!(bytes, payload);
        assert_eq!(storage.len().unwrap(), img.append_offset());
    }

    #[test]
    fn header_points_at_live_index() {
        let mut storage = matryoshka_store::MemoryStorage::new();
        let img = image::initialize(&mut storage, false).unwrap();
        let raw = storage.to_bytes();
        let header = Header::from_bytes(&raw).unwrap();
        assert_eq!(header, img.header);
        header
            .verify_index(&raw[header.index_offset as usize..header.index_end() as usize])
            .unwrap();
    }
}
