//! Common test infrastructure
//!
//! Fakes for the external collaborators (catalog API, LLM provider, a
//! warehouse with injectable write failures) and a throw-away environment
//! with real SQLite stores and a directory-backed staging bucket.
//! Tests should only import from this module, not from internal submodules.

mod constants;
mod fakes;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{FailingWriteWarehouse, FakeCatalogApi, FakeLlmProvider, FakeYear};
#[allow(unused_imports)]
pub use fixtures::{movie_record, seed_movies, TestEnv};
