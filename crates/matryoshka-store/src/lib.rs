//! Backing storage for the Matryoshka container.
//!
//! A container is one flat byte space: a header at offset zero, chunk bytes
//! and index snapshots appended behind it. This crate provides that byte
//! space and nothing else. It never interprets what it stores.
//!
//! # Storage Backends
//!
//! All backends implement the [`Storage`] trait:
//!
//! - [`FileStorage`] -- a host file held under an exclusive OS lock
//! - [`MemoryStorage`] -- a shared in-memory buffer for tests and embedding
//!
//! # Design Rules
//!
//! 1. Reads take `&self`, mutation takes `&mut self`.
//! 2. Reads never return fewer bytes than requested; a short read is an error.
//! 3. Replacing the whole content ([`Storage::replace_with`]) is atomic.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::Storage;
