//! Embedded `PostgreSQL` support for integration tests.
//!
//! Gated behind the `test-utils` feature so the bundled server binaries
//! never reach ordinary builds.

mod embedded;

pub use embedded::EmbeddedDb;
