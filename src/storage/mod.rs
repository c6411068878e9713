//! Persistence for the handful of shared records.
//! The basic idea is:
//!  - Every logical record lives in its own JSON document under the app dir.
//!  - Reads and writes take advisory file locks, but nothing coordinates
//!    across documents or processes: concurrent writers are last-write-wins,
//!    matching the storage model the daemon and CLI both grew up with.
//!  - A missing or corrupt document decodes to its default value.

pub mod store;

pub use store::StateStore;
