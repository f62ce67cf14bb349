//! Core pipeline orchestration and domain logic for insightforge.
//!
//! This crate ties together queue building, tiered insight generation,
//! asset assembly, and the validation/persistence gate into the
//! end-to-end production run.

pub mod assemble;
pub mod gate;
pub mod generate;
pub mod pipeline;
pub mod queue;
pub mod schema;
