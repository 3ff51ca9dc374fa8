//! Checker process spawning and stream reading.

mod invocation;
mod process;
mod stream;

pub use invocation::*;
pub use process::*;
pub use stream::*;
