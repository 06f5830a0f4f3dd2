//! Benchmark harness for serverless platforms.
//!
//! The harness compiles a [`PerformanceWorkload`] descriptor into a [`Benchmark`]: a three-phase
//! traffic profile, a payload generator producing the [`Job`](set_bencher::Job) sent with every
//! request, and optional background hooks that reconfigure the function mid-run. It deploys the
//! benchmark function through a [`Platform`](deploy::Platform) and, for I/O workloads, provisions
//! the objects the function reads. Issuing the actual requests is left to an external load
//! generator that consumes the exported benchmark.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod deploy;
pub mod hook;
pub mod levels;
pub mod objects;
pub mod observability;
pub mod payload;
pub mod plan;
pub mod prompt;
pub mod workload;

#[cfg(test)]
mod testing;

pub use crate::workload::{Benchmark, PerformanceWorkload};
