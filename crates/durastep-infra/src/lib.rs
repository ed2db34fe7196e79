//! Infrastructure layer for durastep.
//!
//! Contains implementations of the repository traits defined in
//! `durastep-core`: the SQLite checkpoint store (WAL mode, busy timeout,
//! split read/write pools) and the configuration file loader.

pub mod config;
pub mod sqlite;
