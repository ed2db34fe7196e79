//! Step engine core: sequence allocation, execution contexts, and the
//! claim -> execute -> commit protocol.
//!
//! - `sequence` -- per-run lock-free step sequence allocator
//! - `context` -- `StepEngine` and the per-run `ExecutionContext`
//! - `codec` -- serialization capability for step results
//! - `executor` -- single-step protocol with replay short-circuit
//! - `parallel` -- concurrent fan-out with program-order key allocation
//!
//! # Caller obligations
//!
//! The engine assumes two things it cannot verify:
//!
//! 1. **Deterministic driver.** Replay finds prior results only if the
//!    workflow makes the same sequence of step invocations on every attempt
//!    (up to the last completed step). Only step bodies may be
//!    nondeterministic.
//! 2. **Idempotent bodies.** A step whose record was left `PENDING` by a
//!    crash is executed again, so its side effect may happen more than once.
//!    Completion is recorded at most once.

pub mod codec;
pub mod context;
pub mod executor;
pub mod parallel;
pub mod sequence;

pub use codec::{Codec, CodecError, JsonCodec};
pub use context::{ExecutionContext, StepEngine};
pub use executor::{StepError, execute, execute_with};
pub use parallel::{ParallelStep, run_parallel, run_parallel_with};
pub use sequence::SequenceAllocator;
