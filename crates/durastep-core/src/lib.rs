//! Checkpointed step execution engine for durastep.
//!
//! This crate defines the checkpoint store "port" (repository trait) that the
//! infrastructure layer implements, plus the engine that drives it: sequence
//! allocation, execution contexts, the claim -> execute -> commit step
//! protocol, and the parallel coordinator. It depends only on
//! `durastep-types` -- never on `durastep-infra` or any database crate.

pub mod repository;
pub mod workflow;
