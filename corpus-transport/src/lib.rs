//! # corpus-transport
//!
//! Sparse, shallow retrieval of a corpus subset from an upstream git
//! repository. The sync engine only sees the [`Transport`] trait, so tests
//! can swap in a fake.

mod command;
pub mod error;
pub mod git;
pub mod transport;
pub mod validate;

pub use error::{FailureKind, TransportError};
pub use git::GitTransport;
pub use transport::{FetchOutcome, SparseCheckout, Transport};
pub use validate::{validate_patterns, validate_remote, validate_version_ref};
