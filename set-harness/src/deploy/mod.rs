//! Deployment of the benchmark function to FaaS platforms.
//!
//! [`Platform`] is the provider-agnostic capability set used by the harness. The only
//! implementation today is [`BuildScriptPlatform`], which delegates to build rules shipped next to
//! every function's sources. Direct provider-API strategies can implement the same trait without
//! changing callers.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod build_script;
mod template;

pub use build_script::{BUILD_DESCRIPTOR, BuildRule, BuildScriptPlatform, DEFAULT_PROGRAM};
pub use template::{RuntimeTemplate, TemplateLayout};

/// Where and how a function is built and deployed.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Deployment {
    /// Build directory of the function, e.g. `functions/aws/go`.
    #[serde(default)]
    pub source: PathBuf,
    /// Runtime identifier understood by the build rules.
    #[serde(default)]
    pub runtime: String,
    /// Memory quota, passed verbatim to the build rules.
    #[serde(default)]
    pub memory: u64,
    /// Function timeout.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Duration,
    /// Provider region.
    #[serde(default)]
    pub region: String,
}

/// Process environment handed to every build rule.
///
/// This is the only place where deployment fields turn into environment variables.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildEnv {
    /// `MEM`
    pub memory: u64,
    /// `TIMEOUT`, in whole seconds rounded up.
    pub timeout_secs: u64,
    /// `REGION`
    pub region: String,
}

impl BuildEnv {
    /// Returns the variables as `(name, value)` pairs.
    pub fn vars(&self) -> [(&'static str, String); 3] {
        [
            ("MEM", self.memory.to_string()),
            ("TIMEOUT", self.timeout_secs.to_string()),
            ("REGION", self.region.clone()),
        ]
    }
}

impl From<&Deployment> for BuildEnv {
    fn from(deployment: &Deployment) -> Self {
        let timeout = deployment.timeout;
        Self {
            memory: deployment.memory,
            timeout_secs: timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0),
            region: deployment.region.clone(),
        }
    }
}

/// Errors raised while deploying, changing or removing a function.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The deployment's source directory has no build descriptor.
    #[error("build descriptor is missing at `{}`", path.display())]
    MissingBuildDescriptor {
        /// The expected location of the descriptor.
        path: PathBuf,
    },

    /// A shared template is not a regular file.
    #[error("template `{}` is not a regular file", path.display())]
    NotRegularFile {
        /// The offending template.
        path: PathBuf,
    },

    /// Copying a shared template into a build directory failed.
    #[error("failed to copy `{}` to `{}`", src.display(), dst.display())]
    Template {
        /// Template source.
        src: PathBuf,
        /// Destination inside the platform build directory.
        dst: PathBuf,
        /// The underlying error.
        #[source]
        cause: io::Error,
    },

    /// The build program could not be started.
    #[error("failed to run `{program} {rule}`")]
    Spawn {
        /// The build program.
        program: String,
        /// The build rule.
        rule: BuildRule,
        /// The underlying error.
        #[source]
        cause: io::Error,
    },

    /// A build rule exited unsuccessfully.
    #[error("build rule `{rule}` failed with {status}:\n{output}")]
    Failed {
        /// The build rule.
        rule: BuildRule,
        /// Exit status of the build program.
        status: ExitStatus,
        /// Combined stdout and stderr of the build program.
        output: String,
    },
}

/// A FaaS platform that can host the benchmark function.
#[async_trait::async_trait]
pub trait Platform: fmt::Debug + Send + Sync {
    /// Builds and deploys the function, returning an identifier such as its invocation endpoint.
    async fn deploy(&self, deployment: &Deployment) -> Result<String, DeployError>;

    /// Applies a changed deployment to an already deployed function.
    async fn change(&self, deployment: &Deployment) -> Result<(), DeployError>;

    /// Removes the deployed function.
    async fn remove(&self, deployment: &Deployment) -> Result<(), DeployError>;
}

/// A shareable [`Platform`] instance.
pub type SharedPlatform = Arc<dyn Platform>;
