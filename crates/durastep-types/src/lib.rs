//! Shared domain types for durastep.
//!
//! This crate contains the types shared by the engine and its storage
//! adapters: run identity, step keys, durable step records, claim/commit
//! outcomes, store errors, and engine configuration.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod step;
