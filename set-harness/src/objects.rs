//! Provisioning of the objects read by I/O workloads.

use std::error::Error;
use std::io;
use std::pin::Pin;
use std::task;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use set_bencher::store::{ObjectStore, S3Store};
use tokio::io::{AsyncRead, ReadBuf};

use crate::levels;
use crate::workload::{PerformanceWorkload, WorkloadError};

/// Random object contents of a fixed length, generated while they are read.
#[derive(Debug, Clone)]
pub struct RandomContent {
    /// Remaining length in bytes.
    pub len: u64,
    rng: SmallRng,
}

impl RandomContent {
    /// Creates `len` bytes of content seeded from the thread RNG.
    pub fn new(len: u64) -> Self {
        Self::from_rng(len, SmallRng::from_rng(&mut rand::rng()))
    }

    /// Creates `len` bytes of content drawn from `rng`.
    pub fn from_rng(len: u64, rng: SmallRng) -> Self {
        Self { len, rng }
    }
}

impl AsyncRead for RandomContent {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let len_to_fill = (buf.remaining() as u64).min(self.len) as usize;

        let fill_buf = buf.initialize_unfilled_to(len_to_fill);
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        buf.advance(len_to_fill);

        task::Poll::Ready(Ok(()))
    }
}

/// Uploads the test objects of an I/O workload and returns how many were written.
///
/// Connects to the workload's store and calls [`provision`] with the object size of the
/// workload's complexity level. Call this after [`PerformanceWorkload::prepare`], which derives
/// the keys.
pub async fn generate_io_objects(workload: &PerformanceWorkload) -> Result<usize, WorkloadError> {
    let store = S3Store::connect(&workload.store_config()).map_err(WorkloadError::Store)?;
    let size = levels::io_level(workload.level).object_size.as_u64();
    provision(&store, &workload.keys, size).await
}

/// Creates the bucket and uploads `size` random bytes under every key.
///
/// Failing to create the bucket is logged and ignored, since it usually exists already. A failed
/// upload aborts provisioning.
pub async fn provision(
    store: &dyn ObjectStore,
    keys: &[String],
    size: u64,
) -> Result<usize, WorkloadError> {
    if let Err(err) = store.create_bucket().await {
        tracing::warn!(
            store = store.name(),
            error = &err as &dyn Error,
            "failed to create bucket"
        );
    }

    for key in keys {
        let mut content = RandomContent::new(size);
        store
            .put_stream(key, &mut content)
            .await
            .map_err(|cause| WorkloadError::Provision {
                key: key.clone(),
                cause,
            })?;
        tracing::debug!(%key, size, "uploaded test object");
    }

    tracing::info!(objects = keys.len(), "generated test objects");
    Ok(keys.len())
}

#[cfg(test)]
mod tests {
    use set_bencher::store::InMemoryStore;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::levels::ComplexityLevel;
    use crate::workload::object_keys;

    #[tokio::test]
    async fn content_has_exact_length() {
        let mut content = RandomContent::new(5 * 1024 * 1024 + 3);
        let mut data = Vec::new();
        content.read_to_end(&mut data).await.unwrap();

        assert_eq!(data.len(), 5 * 1024 * 1024 + 3);
        assert_eq!(content.len, 0);
    }

    #[tokio::test]
    async fn content_is_reproducible_from_seed() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        RandomContent::from_rng(4096, SmallRng::seed_from_u64(9))
            .read_to_end(&mut a)
            .await
            .unwrap();
        RandomContent::from_rng(4096, SmallRng::seed_from_u64(9))
            .read_to_end(&mut b)
            .await
            .unwrap();

        assert_eq!(a, b);
        assert!(a.iter().any(|&byte| byte != 0));
    }

    #[tokio::test]
    async fn provisions_every_key_with_level_size() {
        let store = InMemoryStore::new();
        let keys = object_keys("disk", 10);
        let size = levels::io_level(ComplexityLevel::MIN).object_size.as_u64();

        let written = provision(&store, &keys, size).await.unwrap();

        assert_eq!(written, 10);
        assert_eq!(store.len(), 10);
        for i in 0..10 {
            let object = store.get(&format!("in_disk_{i}.bin")).unwrap();
            assert_eq!(object.len() as u64, size);
        }
    }

    #[tokio::test]
    async fn existing_bucket_does_not_abort() {
        let store = InMemoryStore::new();
        store.reject_bucket_creation(true);

        let written = provision(&store, &object_keys("w", 2), 64).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.get("in_w_1.bin").unwrap().len(), 64);
    }

    #[tokio::test]
    async fn failed_upload_names_the_key() {
        let store = InMemoryStore::new();
        store.reject_writes(true);

        let err = provision(&store, &object_keys("w", 2), 64)
            .await
            .unwrap_err();

        assert!(
            matches!(err, WorkloadError::Provision { ref key, .. } if key == "in_w_0.bin"),
            "{err}"
        );
    }
}
