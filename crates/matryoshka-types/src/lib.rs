//! Foundation types for the Matryoshka container.
//!
//! Every other Matryoshka crate depends on `matryoshka-types`.
//!
//! # Key Types
//!
//! - [`InnerPath`] -- Normalized, slash-separated logical path inside a container
//! - [`EntryId`] -- Persistent identifier of an entry, never reused
//! - [`ChunkSize`] -- Requested chunking for a push (fixed size or one block)
//! - [`ChunkPlan`] -- The chunk lengths a push will produce for a given input size

pub mod chunk;
pub mod error;
pub mod id;
pub mod path;

pub use chunk::{ChunkPlan, ChunkSize};
pub use error::TypeError;
pub use id::EntryId;
pub use path::InnerPath;
