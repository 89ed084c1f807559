//! Corpus core library: domain types, settings, errors.
//!
//! - [`types`]: [`Digest`], [`RelPath`], [`Category`], [`Manifest`]
//! - [`settings`]: [`Settings`] resolved once at startup, [`ProjectConfig`]
//! - [`error`]: validation/config errors and the [`Remedy`] trait

pub mod error;
pub mod settings;
pub mod types;

pub use error::{ConfigError, PathError, Remedy};
pub use settings::{ProjectConfig, Settings};
pub use types::{filter_manifest, Category, Digest, Manifest, RelPath};
