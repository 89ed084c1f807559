//! Shared test fixtures for the corpus workspace. Dev-dependency only.
//!
//! - [`fake`]: [`FakeTransport`], a filesystem-backed [`Transport`](corpus_transport::Transport)
//! - [`fixture`]: [`CorpusFixture`], an upstream / target / cache triple in a temp dir
//! - [`git`]: real git repositories for end-to-end tests

pub mod fake;
pub mod fixture;
pub mod git;

pub use fake::FakeTransport;
pub use fixture::CorpusFixture;
