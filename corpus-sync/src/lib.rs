//! # corpus-sync
//!
//! Cache-aware sync engine, sync state store and manifest comparison.
//!
//! [`SyncEngine`] decides whether the transport has to run and materialises
//! files into a target. [`Project`] wraps a target with its saved
//! [`SyncState`] and exposes the `status`, `diff`, `update` and `sync`
//! workflows.

pub mod compare;
pub mod engine;
pub mod error;
pub mod patch;
pub mod state;
pub mod tree;
pub mod upstream;
pub mod workflow;
pub mod writer;

pub use compare::{compare, Comparison};
pub use engine::{FileError, SyncEngine, SyncOptions, SyncReport};
pub use error::SyncError;
pub use patch::FilePatch;
pub use state::{StateStore, SyncState};
pub use upstream::{fetch_upstream, Upstream};
pub use workflow::{DiffReport, Project, StatusReport, UpdateReport};
pub use writer::WriteResult;
