use std::fmt;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::{BuildEnv, DeployError, Deployment, Platform, TemplateLayout};

/// File that must exist in a deployment's source directory before any build rule runs.
pub const BUILD_DESCRIPTOR: &str = "Makefile";

/// Build program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "make";

/// A rule every platform build directory must provide.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BuildRule {
    /// Build and deploy the function.
    Deploy,
    /// Redeploy with changed parameters.
    Update,
    /// Tear the function down.
    Remove,
    /// Print how to reach the deployed function.
    Info,
}

impl BuildRule {
    /// The rule name passed to the build program.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildRule::Deploy => "deploy",
            BuildRule::Update => "update",
            BuildRule::Remove => "remove",
            BuildRule::Info => "info",
        }
    }
}

impl fmt::Display for BuildRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`Platform`] driven by build rules in every function's build directory.
///
/// Each operation runs `<program> <rule>` inside the deployment's source directory with the
/// [`BuildEnv`] variables added to the inherited environment.
#[derive(Clone, Debug)]
pub struct BuildScriptPlatform {
    program: String,
    layout: TemplateLayout,
}

impl BuildScriptPlatform {
    /// Creates a platform that runs `make` and installs templates according to `layout`.
    pub fn new(layout: TemplateLayout) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_owned(),
            layout,
        }
    }

    /// Overrides the build program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Returns the path of the build descriptor for `source`.
    pub fn build_descriptor(source: &Path) -> PathBuf {
        source.join(BUILD_DESCRIPTOR)
    }

    fn check_descriptor(deployment: &Deployment) -> Result<(), DeployError> {
        let path = Self::build_descriptor(&deployment.source);
        if path.is_file() {
            Ok(())
        } else {
            Err(DeployError::MissingBuildDescriptor { path })
        }
    }

    /// Runs a single build rule and returns its combined output.
    #[tracing::instrument(level = "debug", skip_all, fields(%rule, source = %deployment.source.display()))]
    pub async fn run(&self, deployment: &Deployment, rule: BuildRule) -> Result<String, DeployError> {
        Self::check_descriptor(deployment)?;

        let env = BuildEnv::from(deployment);
        let output = Command::new(&self.program)
            .arg(rule.as_str())
            .current_dir(&deployment.source)
            .envs(env.vars())
            .output()
            .await
            .map_err(|cause| DeployError::Spawn {
                program: self.program.clone(),
                rule,
                cause,
            })?;

        let combined = combine_output(&output.stdout, &output.stderr);
        if !output.status.success() {
            tracing::error!(status = %output.status, output = %combined, "build rule failed");
            return Err(DeployError::Failed {
                rule,
                status: output.status,
                output: combined,
            });
        }

        Ok(combined)
    }

    /// Checks the build descriptor and installs the shared templates into every build directory.
    async fn prepare(&self, deployment: &Deployment) -> Result<(), DeployError> {
        Self::check_descriptor(deployment)?;
        self.layout.install().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Platform for BuildScriptPlatform {
    async fn deploy(&self, deployment: &Deployment) -> Result<String, DeployError> {
        self.prepare(deployment).await?;

        let output = self.run(deployment, BuildRule::Deploy).await?;
        tracing::info!(output = output.trim(), "deployed function");

        let info = self.run(deployment, BuildRule::Info).await?;
        Ok(info.trim().to_owned())
    }

    async fn change(&self, deployment: &Deployment) -> Result<(), DeployError> {
        self.prepare(deployment).await?;
        self.run(deployment, BuildRule::Update).await?;
        Ok(())
    }

    async fn remove(&self, deployment: &Deployment) -> Result<(), DeployError> {
        self.prepare(deployment).await?;
        self.run(deployment, BuildRule::Remove).await?;
        Ok(())
    }
}

/// Joins stdout and stderr the way a terminal would show them for a sequential tool.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names() {
        let names: Vec<_> = [
            BuildRule::Deploy,
            BuildRule::Update,
            BuildRule::Remove,
            BuildRule::Info,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(names, ["deploy", "update", "remove", "info"]);
    }

    #[test]
    fn output_is_stdout_then_stderr() {
        assert_eq!(combine_output(b"out\n", b"err\n"), "out\nerr\n");
        assert_eq!(combine_output(b"", b"\xffoops"), "\u{fffd}oops");
    }

    #[tokio::test]
    async fn missing_descriptor_spawns_nothing() {
        let source = tempfile::tempdir().unwrap();
        let deployment = Deployment {
            source: source.path().to_owned(),
            ..Default::default()
        };
        // would fail with a spawn error if it were ever started
        let platform = BuildScriptPlatform::new(TemplateLayout::default())
            .with_program("/nonexistent/build-program");

        let err = platform.run(&deployment, BuildRule::Info).await.unwrap_err();
        let DeployError::MissingBuildDescriptor { path } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(path, source.path().join("Makefile"));
    }
}
