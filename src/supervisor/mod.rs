//! Supervisor module for running the checker and resolving its outcome.

mod interrupt;
mod outcome;
mod runner;
mod state;

pub use interrupt::*;
pub use outcome::*;
pub use runner::*;
pub use state::*;
