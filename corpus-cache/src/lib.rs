//! # corpus-cache
//!
//! Content-addressed local blob store shared by every project that points at
//! the same cache directory. Purely an optimization: the sync engine treats
//! any [`CacheError`] as a miss.

pub mod error;
pub mod health;
pub mod store;

pub use error::CacheError;
pub use health::{DirectoryStats, HealthStatus};
pub use store::{BlobStore, ContentCache, EvictionReport};
