//! Memory-bound stress task.
//!
//! Two arrays of random floating point operands are allocated up front. Every iteration descends
//! a fixed number of stack frames, then combines one random element of each array and stores the
//! result at a random slot of one of them. Every hundredth iteration the arrays are swapped through
//! a freshly allocated buffer to add allocation pressure.
//!
//! [`parallel_memory`] runs the same loop on several threads that share both arrays without any
//! coordination. Concurrent writes overwrite each other freely; the numeric contents of the arrays
//! are meaningless afterwards. The variant exists purely to stress caches and the allocator.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::job::MemoryTask;

/// Iterations between two array swaps.
const SWAP_INTERVAL: u32 = 100;

/// Counters describing the work done by a memory task.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemoryReport {
    /// Number of arithmetic operations performed.
    pub operations: u64,
    /// Number of full array swaps performed.
    pub swaps: u64,
}

/// Runs the memory task on the calling thread.
pub fn memory(task: &MemoryTask) -> MemoryReport {
    memory_with_rng(task, &mut SmallRng::from_rng(&mut rand::rng()))
}

/// Runs the memory task drawing all randomness from `rng`.
pub fn memory_with_rng<R: Rng>(task: &MemoryTask, rng: &mut R) -> MemoryReport {
    let mut report = MemoryReport::default();
    if task.operator_size == 0 || task.iterations == 0 {
        return report;
    }

    let mut left = operator_array(task.operator_size, rng);
    let mut right = operator_array(task.operator_size, rng);

    for i in 0..task.iterations {
        descend(task.recursion_depth, &mut left, &mut right, rng);
        report.operations += 1;

        if i % SWAP_INTERVAL == 0 {
            let tmp = right.to_vec();
            right.copy_from_slice(&left);
            left.copy_from_slice(&tmp);
            report.swaps += 1;
        }
    }

    black_box((&left, &right));
    report
}

/// Runs the memory task on `workers` threads sharing the same two arrays.
///
/// Each worker performs `iterations / workers` operations. The threads are joined before this
/// function returns, but their accesses to the arrays are not ordered in any way.
pub fn parallel_memory(task: &MemoryTask, workers: usize) -> MemoryReport {
    let workers = workers.max(1);
    let per_worker = task.iterations / workers as u32;
    if task.operator_size == 0 || per_worker == 0 {
        return MemoryReport::default();
    }

    let mut rng = SmallRng::from_rng(&mut rand::rng());
    let left = shared_array(operator_array(task.operator_size, &mut rng));
    let right = shared_array(operator_array(task.operator_size, &mut rng));

    thread::scope(|scope| {
        for _ in 0..workers {
            let seed = rng.random();
            let (left, right) = (&left, &right);
            scope.spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed);
                for _ in 0..per_worker {
                    descend_shared(task.recursion_depth, left, right, &mut rng);
                }
            });
        }
    });

    MemoryReport {
        operations: u64::from(per_worker) * workers as u64,
        swaps: 0,
    }
}

fn operator_array<R: Rng>(size: u32, rng: &mut R) -> Vec<f64> {
    (0..size)
        .map(|_| rng.random::<f64>() * (rng.random::<u64>() >> 1) as f64)
        .collect()
}

fn descend<R: Rng>(depth: u32, left: &mut [f64], right: &mut [f64], rng: &mut R) {
    if depth > 0 {
        descend(depth - 1, left, right, rng);
        // keeps the frame alive so the recursion is not turned into a loop
        black_box(depth);
    } else {
        random_operation(left, right, rng);
    }
}

fn random_operation<R: Rng>(left: &mut [f64], right: &mut [f64], rng: &mut R) {
    let a = left[rng.random_range(0..left.len())];
    let b = right[rng.random_range(0..right.len())];
    let c = combine(a, b, rng.random_bool(0.5));

    let target = if rng.random_bool(0.5) { left } else { right };
    let slot = rng.random_range(0..target.len());
    target[slot] = c;
}

/// Multiplies, or divides when asked to and the divisor is positive.
fn combine(a: f64, b: f64, divide: bool) -> f64 {
    if divide && b > 0.0 { a / b } else { a * b }
}

fn shared_array(values: Vec<f64>) -> Vec<AtomicU64> {
    values
        .into_iter()
        .map(|value| AtomicU64::new(value.to_bits()))
        .collect()
}

fn descend_shared<R: Rng>(depth: u32, left: &[AtomicU64], right: &[AtomicU64], rng: &mut R) {
    if depth > 0 {
        descend_shared(depth - 1, left, right, rng);
        black_box(depth);
    } else {
        let a = f64::from_bits(left[rng.random_range(0..left.len())].load(Ordering::Relaxed));
        let b = f64::from_bits(right[rng.random_range(0..right.len())].load(Ordering::Relaxed));
        let c = combine(a, b, rng.random_bool(0.5));

        let target = if rng.random_bool(0.5) { left } else { right };
        let slot = rng.random_range(0..target.len());
        target[slot].store(c.to_bits(), Ordering::Relaxed);
    }
}
