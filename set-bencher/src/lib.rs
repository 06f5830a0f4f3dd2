//! The benchmark function that runs inside every deployed FaaS platform.
//!
//! A deployed function receives a [`Job`], executes one of four synthetic tasks and reports the
//! outcome as a trace:
//!
//! - *idle* sleeps for a number of seconds and defines the minimum cost of an invocation,
//! - *prime* runs a deterministic Miller-Rabin test on a 32-bit candidate,
//! - *memory* performs recursive random arithmetic over two operand arrays,
//! - *io* mixes ranged reads and writes against an S3-compatible object store.
//!
//! Platform adapters only translate their native envelope into a [`Job`] and call
//! [`dispatch::handle`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod dispatch;
pub mod instrument;
pub mod job;
pub mod store;
pub mod tasks;

pub use crate::dispatch::handle;
pub use crate::job::{IoTask, Job, MemoryTask, TaskKind};
