//! Output sinks for filtered checker output.

mod sink;

pub use sink::*;
