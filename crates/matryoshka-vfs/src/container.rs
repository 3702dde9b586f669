//! Container lifecycle and entry operations.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use matryoshka_index::{ChunkRef, Find, IndexEntry};
use matryoshka_pack::{image, ChunkWriter, EntryReader, Image, HEADER_LEN};
use matryoshka_store::{FileStorage, MemoryStorage, Storage};
use matryoshka_types::{ChunkSize, EntryId, InnerPath};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::config::ContainerConfig;
use crate::error::{VfsError, VfsResult};
use crate::handle::{ContainerId, EntryHandle};

/// A loaded single-file container.
///
/// The container owns its storage exclusively from load until [`close`] or
/// drop. Reads take `&self` and mutations take `&mut self`, so within a
/// process a push can never overlap a pull on the same container; across
/// processes the file-backed storage holds an OS lock.
///
/// [`close`]: Container::close
pub struct Container<S: Storage = FileStorage> {
    id: ContainerId,
    location: String,
    config: ContainerConfig,
    state: Option<Loaded<S>>,
}

struct Loaded<S> {
    storage: S,
    image: Image,
}

/// Summary of a container's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub location: String,
    pub entries: usize,
    /// Sum of all entry sizes.
    pub logical_bytes: u64,
    /// Length of the backing storage.
    pub file_bytes: u64,
    /// Space held by deleted entries and superseded index snapshots.
    pub dead_bytes: u64,
    /// BLAKE3 of the live index snapshot, hex encoded.
    pub index_checksum: String,
}

impl Container<FileStorage> {
    /// Load the container at `path` with the default configuration,
    /// creating an empty one if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        Self::load_with(path, ContainerConfig::default())
    }

    pub fn load_with(path: impl AsRef<Path>, config: ContainerConfig) -> VfsResult<Self> {
        let storage = FileStorage::open(path.as_ref(), config.create_if_missing)?;
        Self::from_storage(storage, config)
    }
}

impl Container<MemoryStorage> {
    /// A fresh container that lives only in memory.
    pub fn in_memory() -> VfsResult<Self> {
        Self::from_storage(MemoryStorage::new(), ContainerConfig::default())
    }
}

impl<S: Storage> Container<S> {
    /// Load a container from arbitrary storage.
    ///
    /// Empty storage is initialized as an empty container. Anything else must
    /// carry a valid header and index, or loading fails as corrupt.
    pub fn from_storage(mut storage: S, config: ContainerConfig) -> VfsResult<Self> {
        let location = storage.describe();
        let image = if storage.is_empty()? {
            image::initialize(&mut storage, config.sync_on_commit)?
        } else {
            image::open(&storage)?
        };

        let id = ContainerId::next();
        tracing::info!(
            container = %id,
            location = %location,
            entries = image.index.len(),
            "loaded container"
        );
        Ok(Self {
            id,
            location,
            config,
            state: Some(Loaded { storage, image }),
        })
    }

    /// Release the storage. Every handle from this container becomes
    /// invalid. Calling `close` again does nothing.
    pub fn close(&mut self) {
        if let Some(loaded) = self.state.take() {
            drop(loaded);
            tracing::info!(container = %self.id, location = %self.location, "closed container");
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Resolve an inner path to a handle without reading content.
    pub fn open(&self, path: &str) -> VfsResult<EntryHandle> {
        let loaded = self.loaded()?;
        let path = InnerPath::for_entry(path)?;
        let entry = loaded
            .image
            .index
            .lookup(&path)
            .ok_or_else(|| VfsError::EntryNotFound(path.to_string()))?;
        Ok(EntryHandle::new(self.id, entry.id))
    }

    /// Store the host file at `source` as a new entry at `inner_path`.
    ///
    /// Either the whole entry becomes visible or, on any failure, nothing
    /// does: the index is only rewritten after every chunk is on storage,
    /// and a failed push truncates what it appended.
    pub fn push(
        &mut self,
        inner_path: &str,
        source: impl AsRef<Path>,
        chunk_size: ChunkSize,
    ) -> VfsResult<EntryHandle> {
        let path = self.prepare_push(inner_path)?;
        let source = source.as_ref();
        let file = File::open(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => VfsError::SourceNotFound(source.to_path_buf()),
            _ => VfsError::io(format!("cannot open {}", source.display()), e),
        })?;
        let meta = file
            .metadata()
            .map_err(|e| VfsError::io(format!("cannot stat {}", source.display()), e))?;
        if meta.is_dir() {
            return Err(VfsError::InvalidArgument(format!(
                "{} is a directory",
                source.display()
            )));
        }
        self.ingest(path, file, meta.len(), chunk_size)
    }

    /// Store `len` bytes read from `source` as a new entry at `inner_path`.
    ///
    /// A source yielding fewer or more than `len` bytes fails the push.
    pub fn push_reader<R: Read>(
        &mut self,
        inner_path: &str,
        source: R,
        len: u64,
        chunk_size: ChunkSize,
    ) -> VfsResult<EntryHandle> {
        let path = self.prepare_push(inner_path)?;
        self.ingest(path, source, len, chunk_size)
    }

    /// Write an entry's bytes to `destination`, creating missing parent
    /// directories and replacing any existing file. Returns the byte count.
    ///
    /// The bytes go to a temporary file next to the destination that is
    /// renamed over it only once complete.
    pub fn pull(&self, handle: EntryHandle, destination: impl AsRef<Path>) -> VfsResult<u64> {
        let (loaded, entry) = self.resolve(handle)?;
        let destination = destination.as_ref();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .map_err(|e| VfsError::io(format!("cannot create {}", dir.display()), e))?;
        let write_err =
            |e: io::Error| VfsError::io(format!("cannot write {}", destination.display()), e);

        let mut out = NamedTempFile::new_in(dir).map_err(write_err)?;
        let mut reader = EntryReader::new(&loaded.storage, entry);
        let mut buf = vec![0u8; self.config.copy_buffer_size.max(1)];
        let mut written = 0u64;
        loop {
            let n = reader.read_block(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(write_err)?;
            written += n as u64;
        }
        if self.config.sync_on_commit {
            out.as_file().sync_all().map_err(write_err)?;
        }
        out.persist(destination).map_err(|e| write_err(e.error))?;

        tracing::info!(
            path = %entry.path,
            destination = %destination.display(),
            bytes = written,
            "pulled entry"
        );
        Ok(written)
    }

    /// Lazily enumerate inner paths under `prefix`, or every path for `None`.
    ///
    /// Matching respects component boundaries: `a/b` matches `a/b/c` but not
    /// `a/bc`. Paths come out in byte order, which is stable for a given
    /// container state.
    pub fn find(&self, prefix: Option<&str>) -> VfsResult<Paths<'_>> {
        let loaded = self.loaded()?;
        let prefix = prefix.map(InnerPath::parse);
        Ok(Paths {
            inner: loaded.image.index.find(prefix.as_ref()),
        })
    }

    /// Total size of an entry in bytes.
    pub fn get_size(&self, handle: EntryHandle) -> VfsResult<u64> {
        Ok(self.resolve(handle)?.1.size)
    }

    /// Full metadata of an entry.
    pub fn stat(&self, handle: EntryHandle) -> VfsResult<&IndexEntry> {
        Ok(self.resolve(handle)?.1)
    }

    /// Streaming reader over an entry. Chunk CRCs are verified as they are
    /// read.
    pub fn reader(&self, handle: EntryHandle) -> VfsResult<EntryReader<'_, S>> {
        let (loaded, entry) = self.resolve(handle)?;
        Ok(EntryReader::new(&loaded.storage, entry))
    }

    /// Read `len` bytes of an entry starting at `offset`.
    pub fn read_range(&self, handle: EntryHandle, offset: u64, len: u64) -> VfsResult<Vec<u8>> {
        let (loaded, entry) = self.resolve(handle)?;
        let reader = EntryReader::range(&loaded.storage, entry, offset, len)?;
        Ok(reader.read_to_vec()?)
    }

    /// Remove an entry. Its handles become invalid and its id is never
    /// handed out again. The space it used stays dead until [`compact`].
    ///
    /// [`compact`]: Container::compact
    pub fn delete(&mut self, handle: EntryHandle) -> VfsResult<()> {
        self.resolve(handle)?;
        let sync = self.config.sync_on_commit;
        let loaded = self.loaded_mut()?;

        let entry = loaded.image.index.remove(handle.entry())?;
        let path = entry.path.to_string();
        let at = loaded.image.append_offset();
        if let Err(err) = loaded.commit_at(at, sync) {
            loaded.image.index.insert(entry)?;
            loaded.restore(&path, &err);
            return Err(err);
        }

        tracing::info!(path = %path, id = %handle.entry(), "deleted entry");
        Ok(())
    }

    /// Rewrite the container without dead space. Handles stay valid.
    /// Returns the number of bytes reclaimed.
    pub fn compact(&mut self) -> VfsResult<u64> {
        let buffer = self.config.copy_buffer_size;
        let sync = self.config.sync_on_commit;
        let loaded = self.loaded_mut()?;

        let compacted =
            matryoshka_pack::compact(&loaded.storage, &loaded.image.index, buffer, sync)?;
        loaded.storage.replace_with(compacted.storage)?;
        loaded.image = compacted.image;

        tracing::info!(
            entries = loaded.image.index.len(),
            reclaimed = compacted.reclaimed,
            "compacted container"
        );
        Ok(compacted.reclaimed)
    }

    pub fn info(&self) -> VfsResult<ContainerInfo> {
        let loaded = self.loaded()?;
        let index = &loaded.image.index;
        let header = &loaded.image.header;
        let file_bytes = loaded.storage.len()?;
        let logical_bytes = index.total_bytes();
        Ok(ContainerInfo {
            location: self.location.clone(),
            entries: index.len(),
            logical_bytes,
            file_bytes,
            dead_bytes: file_bytes.saturating_sub(HEADER_LEN + header.index_len + logical_bytes),
            index_checksum: hex::encode(header.index_checksum),
        })
    }

    fn loaded(&self) -> VfsResult<&Loaded<S>> {
        self.state.as_ref().ok_or(VfsError::Closed)
    }

    fn loaded_mut(&mut self) -> VfsResult<&mut Loaded<S>> {
        self.state.as_mut().ok_or(VfsError::Closed)
    }

    fn resolve(&self, handle: EntryHandle) -> VfsResult<(&Loaded<S>, &IndexEntry)> {
        let invalid = || VfsError::InvalidHandle(handle);
        if handle.container() != self.id {
            return Err(invalid());
        }
        let loaded = self.state.as_ref().ok_or_else(invalid)?;
        let entry = loaded.image.index.get(handle.entry()).ok_or_else(invalid)?;
        Ok((loaded, entry))
    }

    fn prepare_push(&self, inner_path: &str) -> VfsResult<InnerPath> {
        let loaded = self.loaded()?;
        let path = InnerPath::for_entry(inner_path)?;
        if loaded.image.index.contains(&path) {
            return Err(VfsError::DuplicatePath(path.to_string()));
        }
        Ok(path)
    }

    fn ingest<R: Read>(
        &mut self,
        path: InnerPath,
        source: R,
        len: u64,
        chunk_size: ChunkSize,
    ) -> VfsResult<EntryHandle> {
        let container = self.id;
        let buffer = self.config.copy_buffer_size;
        let sync = self.config.sync_on_commit;
        let loaded = self.loaded_mut()?;

        let id = loaded.image.index.allocate_id();
        let shown = path.to_string();
        match loaded.append(id, path, source, len, chunk_size, buffer, sync) {
            Ok(chunks) => {
                tracing::info!(
                    path = %shown,
                    id = %id,
                    bytes = len,
                    chunks,
                    chunk_size = %chunk_size,
                    "pushed entry"
                );
                Ok(EntryHandle::new(container, id))
            }
            Err(err) => {
                loaded.restore(&shown, &err);
                Err(err)
            }
        }
    }
}

impl<S: Storage> Loaded<S> {
    /// Append an entry's chunks and commit an index that includes it.
    /// Returns the number of chunks written.
    #[allow(clippy::too_many_arguments)]
    fn append<R: Read>(
        &mut self,
        id: EntryId,
        path: InnerPath,
        source: R,
        len: u64,
        chunk_size: ChunkSize,
        buffer: usize,
        sync: bool,
    ) -> VfsResult<usize> {
        let at = self.image.append_offset();
        let chunks = ChunkWriter::new(&mut self.storage, at, buffer)
            .append_all(source, len, chunk_size.plan(len))?;
        let end = chunks.last().map_or(at, ChunkRef::end);
        let count = chunks.len();

        self.image
            .index
            .insert(IndexEntry::new(id, path, chunk_size, chunks))?;
        if let Err(err) = self.commit_at(end, sync) {
            // Inserted just above, so the id is present.
            let _ = self.image.index.remove(id);
            return Err(err);
        }
        Ok(count)
    }

    fn commit_at(&mut self, at: u64, sync: bool) -> VfsResult<()> {
        self.image.header = image::commit(&mut self.storage, &self.image.index, at, sync)?;
        self.image.trailing = 0;
        Ok(())
    }

    /// Put storage back to the last committed image after a failed mutation.
    fn restore(&mut self, path: &str, cause: &VfsError) {
        match self.rewind() {
            Ok(()) => tracing::warn!(path, error = %cause, "mutation failed, rolled back"),
            Err(e) => tracing::warn!(
                path,
                error = %cause,
                rollback_error = %e,
                "mutation failed and rollback did not complete"
            ),
        }
    }
}

impl<S: Storage> Loaded<S> {
    fn rewind(&mut self) -> VfsResult<()> {
        self.storage.set_len(self.image.append_offset())?;
        self.storage.write_at(0, &self.image.header.to_bytes())?;
        self.storage.sync()?;
        Ok(())
    }
}

impl<S: Storage> Drop for Container<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Storage> fmt::Debug for Container<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Inner paths yielded by [`Container::find`].
pub struct Paths<'a> {
    inner: Find<'a>,
}

impl<'a> Iterator for Paths<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next().map(|entry| entry.path.as_str())
    }
}

impl std::iter::FusedIterator for Paths<'_> {}
