//! The synthetic benchmark bodies executed inside a deployed function.

pub mod idle;
pub mod io;
pub mod memory;
pub mod prime;

pub use idle::idle;
pub use io::{IoReport, io};
pub use memory::{MemoryReport, memory, parallel_memory};
pub use prime::prime;
