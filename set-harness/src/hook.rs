//! Mid-run reconfiguration of the deployed function.

use std::error::Error;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::deploy::{Deployment, SharedPlatform};

/// Applies a changed [`Deployment`] while a phase is running.
///
/// The hook is fire-and-forget: it runs detached from the phase that triggered it and a failed
/// change is only logged. Nothing waits for it, so its ordering relative to later phases is
/// unspecified.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReconfigureHook {
    /// Index of the phase whose start triggers the hook.
    pub phase: usize,
    /// Time between the phase start and the change.
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// The deployment to apply.
    pub operation: Deployment,
}

impl ReconfigureHook {
    /// Starts the hook in the background.
    ///
    /// The returned handle may be dropped. It is only useful to tests and dry runs.
    pub fn spawn(&self, platform: SharedPlatform) -> JoinHandle<()> {
        let delay = self.delay;
        let operation = self.operation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(source = %operation.source.display(), "triggering operational change");
            if let Err(err) = platform.change(&operation).await {
                tracing::error!(error = &err as &dyn Error, "failed to apply operational change");
            }
        })
    }
}
