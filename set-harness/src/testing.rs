use std::sync::Mutex;

use crate::deploy::{DeployError, Deployment, Platform};

/// A platform that records every call instead of deploying anything.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    pub calls: Mutex<Vec<(&'static str, Deployment)>>,
    pub fail_changes: bool,
}

impl RecordingPlatform {
    pub fn failing_changes() -> Self {
        Self {
            fail_changes: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(&'static str, Deployment)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str, deployment: &Deployment) {
        self.calls.lock().unwrap().push((call, deployment.clone()));
    }
}

#[async_trait::async_trait]
impl Platform for RecordingPlatform {
    async fn deploy(&self, deployment: &Deployment) -> Result<String, DeployError> {
        self.record("deploy", deployment);
        Ok("https://functions.invalid/bench".into())
    }

    async fn change(&self, deployment: &Deployment) -> Result<(), DeployError> {
        self.record("change", deployment);
        if self.fail_changes {
            return Err(DeployError::MissingBuildDescriptor {
                path: deployment.source.join("Makefile"),
            });
        }
        Ok(())
    }

    async fn remove(&self, deployment: &Deployment) -> Result<(), DeployError> {
        self.record("remove", deployment);
        Ok(())
    }
}
