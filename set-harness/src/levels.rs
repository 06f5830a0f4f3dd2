//! Complexity levels of the synthetic tasks.
//!
//! Every task kind has a static table mapping the seven complexity levels `0..=6` to task
//! parameters. Higher levels put more stress on the function. The tables are immutable and can be
//! read concurrently without synchronization.

use std::fmt;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};
use set_bencher::MemoryTask;

/// Number of complexity levels.
pub const LEVEL_COUNT: usize = 7;

/// An error constructing a [`ComplexityLevel`] from an out-of-range value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("complexity level {0} is out of range, expected 0 to 6")]
pub struct LevelError(pub u8);

/// Difficulty of a workload, guaranteed to be in `0..=6`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ComplexityLevel(u8);

impl ComplexityLevel {
    /// The lowest level.
    pub const MIN: Self = Self(0);
    /// The highest level.
    pub const MAX: Self = Self(LEVEL_COUNT as u8 - 1);

    /// Validates a raw level.
    pub fn new(level: u8) -> Result<Self, LevelError> {
        if usize::from(level) < LEVEL_COUNT {
            Ok(Self(level))
        } else {
            Err(LevelError(level))
        }
    }

    /// Returns all levels in increasing order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..LEVEL_COUNT as u8).map(Self)
    }

    fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for ComplexityLevel {
    type Error = LevelError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<ComplexityLevel> for u8 {
    fn from(level: ComplexityLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parameters of an I/O workload at one complexity level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IoLevel {
    /// Number of requests per invocation.
    pub iterations: u32,
    /// Probability of a read.
    pub read_write_ratio: f32,
    /// Size of every read range and written object.
    pub chunk_size: ByteSize,
    /// Number of objects provisioned for reads.
    pub object_count: usize,
    /// Size of every provisioned object.
    pub object_size: ByteSize,
}

static IDLE_SECONDS: [u64; LEVEL_COUNT] = [0, 2, 8, 16, 32, 64, 128];

static PRIME_BOUNDS: [u32; LEVEL_COUNT] = [
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

static MEMORY_LEVELS: [MemoryTask; LEVEL_COUNT] = [
    memory(100, 10_000, 20),
    memory(1_000, 10_000, 20),
    memory(100, 100_000, 20),
    memory(1_000, 1_000_000, 20),
    memory(100, 100_000, 2_000),
    memory(10_000, 100_000, 2_000),
    memory(10_000, 1_000_000, 2_000),
];

static IO_LEVELS: [IoLevel; LEVEL_COUNT] = [
    // read only, 512 B out of ten 5 MiB objects
    // Levels 0 and 1 deliberately swap the legacy ratio values (0 and 1), which contradicted
    // the legacy descriptions of these levels.
    IoLevel {
        iterations: 1_000,
        read_write_ratio: 1.0,
        chunk_size: ByteSize::b(512),
        object_count: 10,
        object_size: ByteSize::mib(5),
    },
    // write only, 512 B per request
    IoLevel {
        iterations: 1_000,
        read_write_ratio: 0.0,
        chunk_size: ByteSize::b(512),
        object_count: 0,
        object_size: ByteSize::mib(5),
    },
    IoLevel {
        iterations: 10_000,
        read_write_ratio: 0.5,
        chunk_size: ByteSize::mib(1),
        object_count: 20,
        object_size: ByteSize::mib(100),
    },
    IoLevel {
        iterations: 10_000,
        read_write_ratio: 0.5,
        chunk_size: ByteSize::mib(2),
        object_count: 20,
        object_size: ByteSize::mib(100),
    },
    IoLevel {
        iterations: 100_000,
        read_write_ratio: 0.7,
        chunk_size: ByteSize::mib(20),
        object_count: 10,
        object_size: ByteSize::mib(100),
    },
    IoLevel {
        iterations: 10_000,
        read_write_ratio: 0.7,
        chunk_size: ByteSize::mib(50),
        object_count: 10,
        object_size: ByteSize::mib(100),
    },
    IoLevel {
        iterations: 100,
        read_write_ratio: 0.7,
        chunk_size: ByteSize::mib(100),
        object_count: 10,
        object_size: ByteSize::mib(100),
    },
];

const fn memory(operator_size: u32, iterations: u32, recursion_depth: u32) -> MemoryTask {
    MemoryTask {
        operator_size,
        iterations,
        recursion_depth,
    }
}

/// Seconds an idle task sleeps.
pub fn idle_seconds(level: ComplexityLevel) -> u64 {
    IDLE_SECONDS[level.index()]
}

/// Exclusive upper bound of the two random draws that form a prime candidate.
pub fn prime_bound(level: ComplexityLevel) -> u32 {
    PRIME_BOUNDS[level.index()]
}

/// Parameters of the memory task.
pub fn memory_task(level: ComplexityLevel) -> MemoryTask {
    MEMORY_LEVELS[level.index()]
}

/// Parameters of the I/O task and its test objects.
pub fn io_level(level: ComplexityLevel) -> IoLevel {
    IO_LEVELS[level.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_io_levels_read_then_write() {
        let read = io_level(ComplexityLevel::MIN);
        assert_eq!(read.read_write_ratio, 1.0);
        assert_eq!(read.object_count, 10);

        let write = io_level(ComplexityLevel::new(1).unwrap());
        assert_eq!(write.read_write_ratio, 0.0);
        assert_eq!(write.object_count, 0);
    }

    #[test]
    fn levels_zero_to_six_are_valid() {
        for raw in 0..=6 {
            let level = ComplexityLevel::new(raw).unwrap();
            // every table is total over valid levels
            idle_seconds(level);
            prime_bound(level);
            memory_task(level);
            io_level(level);
        }
        assert_eq!(ComplexityLevel::all().count(), LEVEL_COUNT);
    }

    #[test]
    fn out_of_range_levels_are_rejected() {
        assert_eq!(ComplexityLevel::new(7), Err(LevelError(7)));
        assert_eq!(ComplexityLevel::try_from(255), Err(LevelError(255)));
    }

    #[test]
    fn deserializing_out_of_range_level_fails() {
        let err = serde_json::from_str::<ComplexityLevel>("7").unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");

        let level: ComplexityLevel = serde_json::from_str("6").unwrap();
        assert_eq!(level, ComplexityLevel::MAX);
    }

    #[test]
    fn memory_table_endpoints() {
        assert_eq!(memory_task(ComplexityLevel::MIN), memory(100, 10_000, 20));
        assert_eq!(
            memory_task(ComplexityLevel::MAX),
            memory(10_000, 1_000_000, 2_000)
        );
    }

    #[test]
    fn stress_grows_with_level() {
        let levels: Vec<_> = ComplexityLevel::all().collect();
        for pair in levels.windows(2) {
            assert!(idle_seconds(pair[0]) < idle_seconds(pair[1]));
            assert!(prime_bound(pair[0]) < prime_bound(pair[1]));
        }
    }

    #[test]
    fn chunks_fit_into_provisioned_objects() {
        for level in ComplexityLevel::all() {
            let io = io_level(level);
            assert!(io.chunk_size <= io.object_size, "level {level}");
        }
    }
}
