//! Noise filtering for checker output.
//!
//! A [`RuleTable`] is built once per run and shared read-only by both
//! stream readers. Each reader owns its own [`StreamContext`], so the two
//! streams are classified independently.

mod context;
mod rule;
mod table;

pub use context::*;
pub use rule::*;
pub use table::*;
