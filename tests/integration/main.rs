//! Integration tests: full flows through the public API with in-memory
//! and on-disk stores and a manual clock.

mod fixtures;
mod guardrail_flow;
mod persistence;
mod reality_check;
