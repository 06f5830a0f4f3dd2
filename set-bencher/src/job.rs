//! Wire types of the payload sent to a deployed benchmark function.
//!
//! A [`Job`] is a tagged union encoded as a JSON object in which exactly one of the fields
//! `prime`, `memory`, `io` or `idle` is expected to be present. Every field is optional and
//! omitted when empty:
//!
//! ```json
//! {"memory": {"operator_size": 100, "itterations": 10000, "recursion_depth": 20}}
//! ```
//!
//! The field spellings (including `itterations` and `itteration`) are part of the protocol that
//! deployed functions in other runtimes understand and must not be corrected.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single unit of work executed by a deployed function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Candidate for the primality test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime: Option<u32>,
    /// Parameters of the memory stress task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryTask>,
    /// Parameters of the object-store I/O task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io: Option<IoTask>,
    /// Number of seconds to stay idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle: Option<u64>,
}

impl Job {
    /// Creates a job that sleeps for the given number of seconds.
    pub fn idle(seconds: u64) -> Self {
        Self {
            idle: Some(seconds),
            ..Default::default()
        }
    }

    /// Creates a job that tests `candidate` for primality.
    pub fn prime(candidate: u32) -> Self {
        Self {
            prime: Some(candidate),
            ..Default::default()
        }
    }

    /// Creates a memory stress job.
    pub fn memory(task: MemoryTask) -> Self {
        Self {
            memory: Some(task),
            ..Default::default()
        }
    }

    /// Creates an object-store I/O job.
    pub fn io(task: IoTask) -> Self {
        Self {
            io: Some(task),
            ..Default::default()
        }
    }

    /// Returns the task the dispatcher will execute.
    ///
    /// Only one variant is expected to be populated. If several are, the first one in the order
    /// idle, prime, memory, io wins and the others are ignored.
    pub fn task(&self) -> Option<Task<'_>> {
        if let Some(seconds) = self.idle {
            Some(Task::Idle(Duration::from_secs(seconds)))
        } else if let Some(candidate) = self.prime {
            Some(Task::Prime(candidate))
        } else if let Some(memory) = &self.memory {
            Some(Task::Memory(memory))
        } else {
            self.io.as_ref().map(Task::Io)
        }
    }
}

/// Borrowed view of the populated [`Job`] variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Task<'a> {
    /// See [`crate::tasks::idle`].
    Idle(Duration),
    /// See [`crate::tasks::prime`].
    Prime(u32),
    /// See [`crate::tasks::memory`].
    Memory(&'a MemoryTask),
    /// See [`crate::tasks::io`].
    Io(&'a IoTask),
}

impl Task<'_> {
    /// The kind of this task.
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Idle(_) => TaskKind::Idle,
            Task::Prime(_) => TaskKind::Prime,
            Task::Memory(_) => TaskKind::Memory,
            Task::Io(_) => TaskKind::Io,
        }
    }
}

/// The four synthetic task kinds.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Sleep for a fixed time.
    #[default]
    Idle,
    /// CPU-bound primality test.
    Prime,
    /// Memory-bound recursive arithmetic.
    Memory,
    /// Mixed object-store reads and writes.
    Io,
}

impl TaskKind {
    /// Returns the lowercase name used in descriptors and trace tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Idle => "idle",
            TaskKind::Prime => "prime",
            TaskKind::Memory => "memory",
            TaskKind::Io => "io",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the memory stress task.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MemoryTask {
    /// Number of elements in each of the two operand arrays.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub operator_size: u32,
    /// Number of arithmetic operations.
    #[serde(rename = "itterations", default, skip_serializing_if = "is_zero")]
    pub iterations: u32,
    /// Stack frames descended before every operation.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub recursion_depth: u32,
}

/// Parameters of the object-store I/O task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IoTask {
    /// Number of read or write requests.
    #[serde(rename = "itteration", default, skip_serializing_if = "is_zero")]
    pub iterations: u32,
    /// Probability in `[0, 1]` that an iteration reads instead of writes.
    #[serde(rename = "rw", default, skip_serializing_if = "is_zero_f32")]
    pub read_write_ratio: f32,
    /// Bytes per read range or written object.
    #[serde(rename = "size", default, skip_serializing_if = "is_zero")]
    pub chunk_size: u64,

    /// Bucket holding the pre-generated objects.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    /// Keys of the pre-generated objects that reads draw from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    /// Object-store endpoint, with or without a scheme.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    /// Static access key id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_id: String,
    /// Static secret access key.
    #[serde(rename = "key", default, skip_serializing_if = "String::is_empty")]
    pub key_secret: String,

    /// Signing region, `auto` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Talk plain HTTP to the endpoint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_ssl: bool,
    /// Address buckets as a path segment instead of a subdomain.
    #[serde(default, skip_serializing_if = "is_false")]
    pub path_style: bool,
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn is_zero_f32(value: &f32) -> bool {
    *value == 0.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prime_job_roundtrip_omits_other_fields() {
        let job = Job::prime(97);

        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded, json!({ "prime": 97 }));

        let decoded: Job = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, job);
        assert!(decoded.memory.is_none());
        assert!(decoded.io.is_none());
        assert!(decoded.idle.is_none());
    }

    #[test]
    fn memory_job_uses_wire_spelling() {
        let job = Job::memory(MemoryTask {
            operator_size: 100,
            iterations: 10_000,
            recursion_depth: 20,
        });

        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(
            encoded,
            json!({
                "memory": { "operator_size": 100, "itterations": 10000, "recursion_depth": 20 }
            })
        );
    }

    #[test]
    fn io_job_decodes_wire_format() {
        let job: Job = serde_json::from_value(json!({
            "io": {
                "itteration": 1000,
                "rw": 0.5,
                "size": 512,
                "bucket": "bench",
                "keys": ["in_w_0.bin", "in_w_1.bin"],
                "endpoint": "localhost:9000",
                "key_id": "minio",
                "key": "minio123"
            }
        }))
        .unwrap();

        let io = job.io.unwrap();
        assert_eq!(io.iterations, 1000);
        assert_eq!(io.read_write_ratio, 0.5);
        assert_eq!(io.chunk_size, 512);
        assert_eq!(io.keys.len(), 2);
        assert_eq!(io.key_secret, "minio123");
        assert_eq!(io.region, None);
        assert!(!io.disable_ssl);
    }

    #[test]
    fn empty_io_fields_are_omitted() {
        let job = Job::io(IoTask {
            iterations: 10,
            chunk_size: 512,
            ..Default::default()
        });

        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded, json!({ "io": { "itteration": 10, "size": 512 } }));
    }

    #[test]
    fn idle_zero_is_still_sent() {
        let encoded = serde_json::to_value(Job::idle(0)).unwrap();
        assert_eq!(encoded, json!({ "idle": 0 }));
    }

    #[test]
    fn task_precedence() {
        let job = Job {
            prime: Some(7),
            idle: Some(1),
            memory: Some(MemoryTask::default()),
            io: None,
        };
        assert_eq!(job.task().map(|t| t.kind()), Some(TaskKind::Idle));

        let job = Job {
            prime: Some(7),
            memory: Some(MemoryTask::default()),
            ..Default::default()
        };
        assert_eq!(job.task(), Some(Task::Prime(7)));

        assert_eq!(Job::default().task(), None);
    }
}
