//! Sleeping task defining the minimum cost of an invocation.

use std::time::Duration;

/// Occupies the calling task for `duration` without doing any work.
pub async fn idle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
