//! The core PathIndex structure.
//!
//! The [`PathIndex`] keeps a `BTreeMap<String, IndexEntry>` keyed by the
//! normalized inner path, plus a reverse map from entry id to path. Ordering
//! is the byte order of the normalized paths, so enumeration is stable and
//! deterministic for a given index state. All operations are in-memory;
//! persisting the index is the job of the container.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use matryoshka_types::{EntryId, InnerPath};

use crate::entry::IndexEntry;
use crate::error::{IndexError, IndexResult};

/// Mapping from inner paths to entry metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct PathIndex {
    entries: BTreeMap<String, IndexEntry>,
    by_id: HashMap<EntryId, String>,
    next_id: EntryId,
}

impl PathIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_id: HashMap::new(),
            next_id: EntryId::FIRST,
        }
    }

    /// Rebuild an index from its entries and id counter.
    ///
    /// Fails on duplicate paths or ids, and on ids at or above `next_id`.
    pub fn from_parts(next_id: EntryId, entries: Vec<IndexEntry>) -> IndexResult<Self> {
        let mut index = Self::new();
        index.next_id = next_id;
        for entry in entries {
            if entry.id >= next_id {
                return Err(IndexError::Corrupted(format!(
                    "entry {} at {} is not below the id counter {}",
                    entry.id, entry.path, next_id
                )));
            }
            index.insert(entry)?;
        }
        Ok(index)
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The id the next inserted entry should receive.
    pub fn next_id(&self) -> EntryId {
        self.next_id
    }

    /// Reserve a fresh entry id.
    ///
    /// Ids are consumed even if the entry is never inserted, e.g. when a push
    /// fails after reserving one.
    pub fn allocate_id(&mut self) -> EntryId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Exact lookup by path.
    pub fn lookup(&self, path: &InnerPath) -> Option<&IndexEntry> {
        self.entries.get(path.as_str())
    }

    /// Lookup by entry id.
    pub fn get(&self, id: EntryId) -> Option<&IndexEntry> {
        self.by_id.get(&id).and_then(|path| self.entries.get(path))
    }

    /// Returns `true` if an entry exists at `path`.
    pub fn contains(&self, path: &InnerPath) -> bool {
        self.entries.contains_key(path.as_str())
    }

    /// Register a new entry.
    pub fn insert(&mut self, entry: IndexEntry) -> IndexResult<()> {
        if entry.path.is_root() {
            return Err(IndexError::Corrupted("entry at the container root".into()));
        }
        if self.entries.contains_key(entry.path.as_str()) {
            return Err(IndexError::DuplicatePath(entry.path.to_string()));
        }
        if self.by_id.contains_key(&entry.id) {
            return Err(IndexError::DuplicateId(entry.id));
        }
        if entry.id >= self.next_id {
            self.next_id = entry.id.next();
        }

        let key = entry.path.as_str().to_string();
        self.by_id.insert(entry.id, key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove an entry by id.
    pub fn remove(&mut self, id: EntryId) -> IndexResult<IndexEntry> {
        let path = self.by_id.remove(&id).ok_or(IndexError::EntryNotFound(id))?;
        self.entries
            .remove(&path)
            .ok_or(IndexError::PathNotFound(path))
    }

    /// Iterate over every entry in path order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Enumerate entries below `prefix`, or every entry for `None`/the root.
    ///
    /// Matching is component-wise: the prefix `a/b` yields `a/b` and
    /// `a/b/c` but not `a/bc`. The sequence is lazy and finite; a fresh
    /// call starts over.
    pub fn find(&self, prefix: Option<&InnerPath>) -> Find<'_> {
        let prefix = prefix.map(|p| p.as_str().to_string()).unwrap_or_default();
        let range = self
            .entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded));
        Find {
            range,
            prefix,
            done: false,
        }
    }

    /// Sum of all entry sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Validate chunk extents and sizes against the live data region.
    ///
    /// Every chunk must lie inside `[data_start, data_end)`, chunk sequence
    /// numbers must run from zero without gaps, and the recorded size must
    /// equal the sum of the chunk lengths.
    pub fn validate(&self, data_start: u64, data_end: u64) -> IndexResult<()> {
        for entry in self.entries.values() {
            if !InnerPath::is_normalized(entry.path.as_str()) {
                return Err(IndexError::Corrupted(format!(
                    "path {:?} is not normalized",
                    entry.path.as_str()
                )));
            }
            let mut total = 0u64;
            for (expected_seq, chunk) in entry.chunks.iter().enumerate() {
                if chunk.seq as usize != expected_seq {
                    return Err(IndexError::Corrupted(format!(
                        "{}: chunk {} out of sequence (found {})",
                        entry.path, expected_seq, chunk.seq
                    )));
                }
                let end = chunk.offset.checked_add(chunk.len).ok_or_else(|| {
                    IndexError::Corrupted(format!("{}: chunk {} overflows", entry.path, chunk.seq))
                })?;
                if chunk.offset < data_start || end > data_end {
                    return Err(IndexError::Corrupted(format!(
                        "{}: chunk {} at {}..{} outside data region {}..{}",
                        entry.path, chunk.seq, chunk.offset, end, data_start, data_end
                    )));
                }
                total += chunk.len;
            }
            if total != entry.size {
                return Err(IndexError::Corrupted(format!(
                    "{}: recorded size {} but chunks hold {} bytes",
                    entry.path, entry.size, total
                )));
            }
        }
        Ok(())
    }
}

impl Default for PathIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy prefix enumeration returned by [`PathIndex::find`].
pub struct Find<'a> {
    range: btree_map::Range<'a, String, IndexEntry>,
    prefix: String,
    done: bool,
}

impl<'a> Iterator for Find<'a> {
    type Item = &'a IndexEntry;

    fn next(&mut self) -> Option<&'a IndexEntry> {
        if self.done {
            return None;
        }
        // Keys sharing the raw string prefix are contiguous in the map, so the
        // scan stops at the first key outside it. Inside that run, keys like
        // `a/bc` under prefix `a/b` are skipped.
        for (key, entry) in self.range.by_ref() {
            if !key.starts_with(self.prefix.as_str()) {
                self.done = true;
                return None;
            }
            if InnerPath::has_prefix(key, &self.prefix) {
                return Some(entry);
            }
        }
        self.done = true;
        None
    }
}

impl std::iter::FusedIterator for Find<'_> {}
