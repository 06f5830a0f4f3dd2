//! Workload descriptors and their compilation into a runnable [`Benchmark`].
//!
//! A descriptor is a YAML or JSON file describing the traffic profile, the task the deployed
//! function runs, its complexity level and the deployment itself:
//!
//! ```yaml
//! name: w0
//! threads: 4
//! warmup: 10
//! scaling: 2.0
//! phaseLength: 30s
//! type: prime
//! complexity: 3
//! deployment:
//!   source: functions/aws/go
//!   runtime: go
//!   memory: 256
//!   timeout: 1m
//!   region: eu-central-1
//! ```
//!
//! Environment variables prefixed with `SET_WORKLOAD__` override descriptor fields, with `__`
//! separating nested keys. Keys are matched in lowercase, so this only reaches fields with
//! lowercase names such as `SET_WORKLOAD__THREADS` or `SET_WORKLOAD__DEPLOYMENT__REGION`.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Yaml};
use serde::{Deserialize, Serialize};
use set_bencher::store::{StoreConfig, StoreError};
use set_bencher::{IoTask, Job, TaskKind};
use tokio::task::JoinHandle;

use crate::deploy::{Deployment, SharedPlatform};
use crate::hook::ReconfigureHook;
use crate::levels::{self, ComplexityLevel};
use crate::payload::PayloadGenerator;
use crate::plan::PhasePlan;

/// Environment variable prefix for descriptor overrides.
const ENV_PREFIX: &str = "SET_WORKLOAD__";

/// Errors loading, compiling or provisioning a workload.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// The descriptor file could not be read.
    #[error("failed to read workload descriptor `{}`", path.display())]
    Read {
        /// The descriptor path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        cause: io::Error,
    },

    /// The descriptor has an extension other than `yml`, `yaml` or `json`.
    #[error("cannot read workload descriptor `{}`, expected a .yml, .yaml or .json file", path.display())]
    UnsupportedFormat {
        /// The descriptor path.
        path: PathBuf,
    },

    /// The descriptor is malformed, names an unknown task type or an invalid complexity level.
    #[error("invalid workload descriptor")]
    Invalid(#[from] Box<figment::Error>),

    /// A job could not be serialized.
    #[error("failed to serialize job payload")]
    Payload(#[from] serde_json::Error),

    /// The object store could not be reached.
    #[error("failed to connect to object store")]
    Store(#[source] StoreError),

    /// A test object could not be uploaded.
    #[error("failed to upload test object `{key}`")]
    Provision {
        /// The object key.
        key: String,
        /// The underlying error.
        #[source]
        cause: StoreError,
    },
}

/// Declarative description of one benchmark run.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceWorkload {
    /// Name of the workload, also used to derive object keys.
    pub name: String,
    /// Invocation target. Filled from the deployment result when empty.
    #[serde(default)]
    pub target: String,

    /// Number of concurrent clients in every phase.
    pub threads: u32,
    /// Request rate of the warmup phase.
    pub warmup: u32,
    /// Growth of the request rate per second during the scale phase.
    pub scaling: f64,
    /// Length of every phase.
    #[serde(with = "humantime_serde")]
    pub phase_length: Duration,
    /// Task executed by the function.
    #[serde(rename = "type")]
    pub task: TaskKind,
    /// Difficulty of the task.
    #[serde(rename = "complexity")]
    pub level: ComplexityLevel,

    /// Deployment applied halfway through the scale phase.
    #[serde(rename = "opTask", default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Deployment>,

    /// Bucket holding the test objects.
    #[serde(default)]
    pub bucket: String,
    /// Keys of the test objects, derived during [`prepare`](Self::prepare).
    #[serde(default)]
    pub keys: Vec<String>,
    /// Object-store endpoint.
    #[serde(default)]
    pub endpoint: String,
    /// Static access key id.
    #[serde(default)]
    pub key_id: String,
    /// Static secret access key.
    #[serde(default)]
    pub secret: String,
    /// Talk plain HTTP to the object store.
    #[serde(rename = "S3disableSSL", default)]
    pub disable_ssl: bool,
    /// Address buckets as a path segment.
    #[serde(rename = "S3PathStyle", default)]
    pub path_style: bool,
    /// Signing region of the object store.
    #[serde(rename = "S3Region", default)]
    pub region: String,

    /// Configuration of the load generator, passed through untouched.
    #[serde(default)]
    pub invoker: serde_json::Value,

    /// Deployment of the benchmark function.
    #[serde(default)]
    pub deployment: Deployment,
}

impl PerformanceWorkload {
    /// Loads a descriptor, choosing the format by file extension.
    pub fn load(path: &Path) -> Result<Self, WorkloadError> {
        let unsupported = || WorkloadError::UnsupportedFormat {
            path: path.to_owned(),
        };
        let extension = path.extension().and_then(OsStr::to_str).ok_or_else(unsupported)?;
        if !matches!(extension, "yml" | "yaml" | "json") {
            return Err(unsupported());
        }

        let contents = std::fs::read_to_string(path).map_err(|cause| WorkloadError::Read {
            path: path.to_owned(),
            cause,
        })?;

        let figment = if extension == "json" {
            Figment::from(Json::string(&contents))
        } else {
            Figment::from(Yaml::string(&contents))
        };

        let workload = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        Ok(workload)
    }

    /// Compiles the descriptor into a [`Benchmark`].
    ///
    /// For I/O workloads this derives the test object keys, replacing any configured keys.
    pub fn prepare(&mut self, platform: SharedPlatform) -> Result<Benchmark, WorkloadError> {
        let plan = PhasePlan::compile(self.threads, self.warmup, self.scaling, self.phase_length);

        if self.task == TaskKind::Io {
            let count = levels::io_level(self.level).object_count;
            self.keys = object_keys(&self.name, count);
        }

        let payload = self.payload()?;

        let hooks = self
            .operation
            .iter()
            .map(|operation| ReconfigureHook {
                phase: PhasePlan::SCALE_PHASE,
                delay: self.phase_length / 2,
                operation: operation.clone(),
            })
            .collect();

        tracing::debug!(
            name = %self.name,
            task = %self.task,
            level = %self.level,
            "compiled workload"
        );

        Ok(Benchmark {
            name: self.name.clone(),
            target: self.target.clone(),
            plan,
            payload,
            invoker: self.invoker.clone(),
            hooks,
            platform,
        })
    }

    /// Selects the payload generator for the task type and complexity level.
    pub fn payload(&self) -> Result<PayloadGenerator, WorkloadError> {
        let job = match self.task {
            TaskKind::Idle => Job::idle(levels::idle_seconds(self.level)),
            TaskKind::Prime => return Ok(PayloadGenerator::prime(levels::prime_bound(self.level))),
            TaskKind::Memory => Job::memory(levels::memory_task(self.level)),
            TaskKind::Io => Job::io(self.io_task()),
        };
        Ok(PayloadGenerator::constant(job)?)
    }

    /// Returns the I/O task sent to the function.
    pub fn io_task(&self) -> IoTask {
        let level = levels::io_level(self.level);
        IoTask {
            iterations: level.iterations,
            read_write_ratio: level.read_write_ratio,
            chunk_size: level.chunk_size.as_u64(),
            bucket: self.bucket.clone(),
            keys: self.keys.clone(),
            endpoint: self.endpoint.clone(),
            key_id: self.key_id.clone(),
            key_secret: self.secret.clone(),
            region: Some(self.region.clone()).filter(|region| !region.is_empty()),
            disable_ssl: self.disable_ssl,
            path_style: self.path_style,
        }
    }

    /// Connection parameters of the workload's object store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::from(&self.io_task())
    }
}

/// Returns the keys of the test objects of a workload.
pub fn object_keys(name: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("in_{name}_{i}.bin")).collect()
}

/// A compiled workload, ready to be handed to the load generator.
#[derive(Debug, Serialize)]
pub struct Benchmark {
    /// Workload name.
    pub name: String,
    /// Invocation target.
    pub target: String,
    /// Traffic profile.
    #[serde(rename = "phases")]
    pub plan: PhasePlan,
    /// Request bodies.
    pub payload: PayloadGenerator,
    /// Load generator configuration from the descriptor.
    pub invoker: serde_json::Value,
    hooks: Vec<ReconfigureHook>,
    #[serde(skip)]
    platform: SharedPlatform,
}

impl Benchmark {
    /// Background hooks registered for the run.
    pub fn hooks(&self) -> &[ReconfigureHook] {
        &self.hooks
    }

    /// Starts all hooks bound to the phase at `index`.
    ///
    /// The hooks run detached. Dropping the returned handles does not cancel them.
    pub fn enter_phase(&self, index: usize) -> Vec<JoinHandle<()>> {
        self.hooks
            .iter()
            .filter(|hook| hook.phase == index)
            .map(|hook| hook.spawn(Arc::clone(&self.platform)))
            .collect()
    }

    /// Walks through the phase schedule in real time, entering each phase as it starts.
    ///
    /// This keeps hooks on schedule while an external load generator runs the same plan.
    pub async fn follow(&self) {
        for (index, phase) in self.plan.phases().iter().enumerate() {
            tracing::info!(phase = phase.name, "entering phase");
            // hooks are detached, their handles are not needed
            drop(self.enter_phase(index));
            tokio::time::sleep(phase.duration).await;
        }
    }
}
