//! Repository trait definitions (ports).
//!
//! The infrastructure layer (durastep-infra) implements these traits with
//! durable storage. `memory` provides a process-local implementation.

pub mod checkpoint;
pub mod memory;
