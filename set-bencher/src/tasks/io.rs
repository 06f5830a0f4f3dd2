//! Mixed object-store read/write task.
//!
//! Setup issues a HEAD for every configured key to learn the object sizes. A single failing HEAD
//! aborts the task. The main loop then performs `iterations` requests: with probability
//! `read_write_ratio` a ranged read of `chunk_size` bytes from a random object, otherwise a write
//! of `chunk_size` random bytes under `generated_<i>.bin`. Failed requests are logged and counted
//! but never stop the loop.

use std::error::Error;

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::job::IoTask;
use crate::store::{ObjectStore, StoreError};

/// Byte counters and error count of a completed I/O task.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IoReport {
    /// Bytes received from ranged reads.
    pub bytes_read: u64,
    /// Bytes acknowledged by the store for writes.
    pub bytes_written: u64,
    /// Number of failed iterations.
    pub errors: u64,
}

/// Setup failures that abort the I/O task before its main loop.
#[derive(Debug, thiserror::Error)]
pub enum IoTaskError {
    /// The store client could not be created.
    #[error("failed to connect to object store: {0}")]
    Connect(#[source] StoreError),

    /// The size of a configured object could not be determined.
    #[error("failed to stat object `{key}`: {cause}")]
    Head {
        /// The configured key.
        key: String,
        /// The underlying error.
        #[source]
        cause: StoreError,
    },
}

/// Runs the I/O task against `store` with a freshly seeded RNG.
pub async fn io(store: &dyn ObjectStore, task: &IoTask) -> Result<IoReport, IoTaskError> {
    let mut rng = SmallRng::from_rng(&mut rand::rng());
    run(store, task, &mut rng).await
}

/// Runs the I/O task against an arbitrary store, drawing all choices from `rng`.
pub async fn run<R>(
    store: &dyn ObjectStore,
    task: &IoTask,
    rng: &mut R,
) -> Result<IoReport, IoTaskError>
where
    R: Rng + Send,
{
    let objects = stat_objects(store, &task.keys).await?;
    let chunk_size = task.chunk_size;
    let mut report = IoReport::default();

    for i in 0..task.iterations {
        if rng.random::<f32>() < task.read_write_ratio {
            if objects.is_empty() {
                tracing::error!(iteration = i, "read requested but no objects are configured");
                report.errors += 1;
                continue;
            }

            let (key, size) = &objects[rng.random_range(0..objects.len())];
            let Some(start) = read_offset(*size, chunk_size, rng) else {
                tracing::error!(%key, size, chunk_size, "chunk does not fit into object");
                report.errors += 1;
                continue;
            };

            match store.get_range(key, start, chunk_size).await {
                Ok(read) => report.bytes_read += read,
                Err(err) => {
                    tracing::error!(%key, start, error = &err as &dyn Error, "read failed");
                    report.errors += 1;
                }
            }
        } else {
            let key = format!("generated_{i}.bin");
            let body = random_bytes(chunk_size, rng);

            match store.put(&key, body).await {
                Ok(()) => report.bytes_written += chunk_size,
                Err(err) => {
                    tracing::error!(%key, error = &err as &dyn Error, "write failed");
                    report.errors += 1;
                }
            }
        }
    }

    Ok(report)
}

/// Determines the size of every configured object, failing on the first error.
async fn stat_objects(
    store: &dyn ObjectStore,
    keys: &[String],
) -> Result<Vec<(String, u64)>, IoTaskError> {
    let mut objects = Vec::with_capacity(keys.len());
    for key in keys {
        match store.head(key).await {
            Ok(size) => objects.push((key.clone(), size)),
            Err(cause) => {
                tracing::error!(%key, error = &cause as &dyn Error, "head failed");
                return Err(IoTaskError::Head {
                    key: key.clone(),
                    cause,
                });
            }
        }
    }
    Ok(objects)
}

/// Picks a start offset such that `[start, start + chunk_size)` lies within the object.
///
/// Returns `None` for empty chunks and chunks larger than the object.
pub fn read_offset<R: Rng>(size: u64, chunk_size: u64, rng: &mut R) -> Option<u64> {
    if chunk_size == 0 || chunk_size > size {
        return None;
    }
    Some(rng.random_range(0..=size - chunk_size))
}

fn random_bytes<R: RngCore>(len: u64, rng: &mut R) -> Bytes {
    let mut data = vec![0; len as usize];
    rng.fill_bytes(&mut data);
    data.into()
}

#[cfg(test)]
mod tests {
    use crate::store::InMemoryStore;

    use super::*;

    fn store_with_objects(count: usize, size: usize) -> (InMemoryStore, Vec<String>) {
        let store = InMemoryStore::new();
        let keys: Vec<_> = (0..count).map(|i| format!("in_test_{i}.bin")).collect();
        for key in &keys {
            store.insert(key.clone(), vec![7u8; size]);
        }
        (store, keys)
    }

    #[test]
    fn offsets_stay_within_object() {
        let mut rng = SmallRng::seed_from_u64(1);
        for (size, chunk) in [(5_242_880, 512), (1_000, 1_000), (1_000, 999), (10, 1)] {
            for _ in 0..1_000 {
                let start = read_offset(size, chunk, &mut rng).unwrap();
                assert!(start + chunk <= size, "{start} + {chunk} > {size}");
            }
        }
    }

    #[test]
    fn oversized_chunks_have_no_offset() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(read_offset(100, 101, &mut rng), None);
        assert_eq!(read_offset(100, 0, &mut rng), None);
        assert_eq!(read_offset(100, 100, &mut rng), Some(0));
    }

    #[tokio::test]
    async fn read_only_task_reads_valid_ranges() {
        let (store, keys) = store_with_objects(4, 4096);
        let task = IoTask {
            iterations: 200,
            read_write_ratio: 1.0,
            chunk_size: 512,
            keys,
            ..Default::default()
        };

        let mut rng = SmallRng::seed_from_u64(3);
        let report = run(&store, &task, &mut rng).await.unwrap();

        assert_eq!(
            report,
            IoReport {
                bytes_read: 200 * 512,
                bytes_written: 0,
                errors: 0
            }
        );
        let ranges = store.requested_ranges();
        assert_eq!(ranges.len(), 200);
        for (_key, start, len) in ranges {
            assert!(start + len <= 4096);
        }
    }

    #[tokio::test]
    async fn write_only_task_writes_generated_objects() {
        let store = InMemoryStore::new();
        let task = IoTask {
            iterations: 5,
            read_write_ratio: 0.0,
            chunk_size: 128,
            ..Default::default()
        };

        let mut rng = SmallRng::seed_from_u64(3);
        let report = run(&store, &task, &mut rng).await.unwrap();

        assert_eq!(report.bytes_written, 5 * 128);
        assert_eq!(report.bytes_read, 0);
        assert_eq!(store.len(), 5);
        assert_eq!(store.get("generated_4.bin").unwrap().len(), 128);
    }

    #[tokio::test]
    async fn failed_writes_are_counted() {
        let store = InMemoryStore::new();
        store.reject_writes(true);
        let task = IoTask {
            iterations: 10,
            read_write_ratio: 0.0,
            chunk_size: 16,
            ..Default::default()
        };

        let mut rng = SmallRng::seed_from_u64(3);
        let report = run(&store, &task, &mut rng).await.unwrap();

        assert_eq!(report.errors, 10);
        assert_eq!(report.bytes_written, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn oversized_reads_are_counted() {
        let (store, keys) = store_with_objects(1, 100);
        let task = IoTask {
            iterations: 3,
            read_write_ratio: 1.0,
            chunk_size: 512,
            keys,
            ..Default::default()
        };

        let mut rng = SmallRng::seed_from_u64(3);
        let report = run(&store, &task, &mut rng).await.unwrap();
        assert_eq!(report.errors, 3);
    }

    #[tokio::test]
    async fn missing_object_aborts_setup() {
        let (store, mut keys) = store_with_objects(2, 100);
        keys.push("missing.bin".into());
        let task = IoTask {
            iterations: 10,
            read_write_ratio: 0.0,
            chunk_size: 16,
            keys,
            ..Default::default()
        };

        let mut rng = SmallRng::seed_from_u64(3);
        let err = run(&store, &task, &mut rng).await.unwrap_err();

        assert!(matches!(err, IoTaskError::Head { ref key, .. } if key == "missing.bin"));
        // no iteration ran
        assert_eq!(store.len(), 2);
    }
}
