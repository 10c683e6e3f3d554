//! CalmBet: matched-betting hedge calculator with session guardrails.
//!
//! Library crate consumed by a presentation layer. It prices standard and
//! each-way hedges, tracks the betting session, and decides which nudge
//! (if any) to show before a bet is recorded.

pub mod clock;
pub mod config;
pub mod guardrail;
pub mod logging;
pub mod odds;
pub mod session;
pub mod storage;
pub mod types;
