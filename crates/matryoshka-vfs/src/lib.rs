//! Single-file virtual file system containers.
//!
//! A [`Container`] is one host file holding a tree of named entries. Host
//! files are pushed in (optionally split into fixed-size chunks), pulled
//! back out byte-for-byte, and enumerated by path prefix.
//!
//! ```no_run
//! use matryoshka_vfs::{ChunkSize, Container};
//!
//! let mut container = Container::load("archive.mtr")?;
//! let handle = container.push("docs/readme.txt", "./readme.txt", ChunkSize::from_raw(64))?;
//! for path in container.find(Some("docs"))? {
//!     println!("{path}");
//! }
//! container.pull(handle, "./out.txt")?;
//! # Ok::<(), matryoshka_vfs::VfsError>(())
//! ```
//!
//! # Key Types
//!
//! - [`Container`] -- Loaded container; owns its storage until closed or dropped
//! - [`EntryHandle`] -- Reference to an entry, checked on every use
//! - [`Status`] -- Success/failure report built from any result
//! - [`ContainerConfig`] -- Load and I/O tunables, readable from TOML

pub mod config;
pub mod container;
pub mod error;
pub mod handle;
pub mod status;

pub use config::{ContainerConfig, DEFAULT_CHUNK_SIZE};
pub use container::{Container, ContainerInfo, Paths};
pub use error::{ErrorKind, VfsError, VfsResult};
pub use handle::{ContainerId, EntryHandle};
pub use status::Status;

pub use matryoshka_index::{ChunkRef, IndexEntry};
pub use matryoshka_pack::EntryReader;
pub use matryoshka_store::{FileStorage, MemoryStorage, Storage};
pub use matryoshka_types::{ChunkSize, EntryId, InnerPath};
