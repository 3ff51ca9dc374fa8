//! hushcheck - Run a static type checker with its routine chatter filtered out.

pub mod checker;
pub mod config;
pub mod display;
pub mod filter;
pub mod output;
pub mod supervisor;
