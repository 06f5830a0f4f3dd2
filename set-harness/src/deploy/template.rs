use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::DeployError;

/// Shared function sources of one runtime.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RuntimeTemplate {
    /// Runtime directory name, both below the workloads and every target directory.
    pub runtime: String,
    /// File names copied from the workloads directory.
    pub files: Vec<String>,
    /// Subdirectory of the target's runtime directory receiving the files.
    #[serde(default)]
    pub prefix: String,
}

/// Locations of the shared function sources and of the per-platform build directories.
///
/// Every target platform has its own build directory `<functions_dir>/<target>/<runtime>/`. The
/// benchmark function itself is shared and lives in `<workloads_dir>/<runtime>/`, so it has to be
/// copied into each build directory before anything is built.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateLayout {
    /// Directory holding the shared function sources.
    pub workloads_dir: PathBuf,
    /// Directory holding one build directory per target platform.
    pub functions_dir: PathBuf,
    /// Target platform names.
    pub targets: Vec<String>,
    /// Shared sources per runtime.
    pub templates: Vec<RuntimeTemplate>,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            workloads_dir: PathBuf::from("workloads"),
            functions_dir: PathBuf::from("functions"),
            targets: ["aws", "ow", "gcf", "azf"].map(String::from).to_vec(),
            templates: vec![
                RuntimeTemplate {
                    runtime: "go".into(),
                    files: vec!["function.go".into()],
                    prefix: "bencher".into(),
                },
                RuntimeTemplate {
                    runtime: "python".into(),
                    files: vec!["bencher.py".into(), "Pipfile".into()],
                    prefix: String::new(),
                },
            ],
        }
    }
}

impl TemplateLayout {
    /// Lists all `(source, destination)` pairs in copy order.
    pub fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut copies = Vec::new();
        for template in &self.templates {
            for file in &template.files {
                let src = self.workloads_dir.join(&template.runtime).join(file);
                for target in &self.targets {
                    let dst = self
                        .functions_dir
                        .join(target)
                        .join(&template.runtime)
                        .join(&template.prefix)
                        .join(file);
                    copies.push((src.clone(), dst));
                }
            }
        }
        copies
    }

    /// Copies the shared sources into every build directory and returns the number of files
    /// written.
    ///
    /// Missing destination directories are created. Sources must be regular files.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn install(&self) -> Result<usize, DeployError> {
        let copies = self.copies();
        for (src, dst) in &copies {
            copy_regular_file(src, dst).await?;
        }
        tracing::debug!(files = copies.len(), "installed function templates");
        Ok(copies.len())
    }
}

async fn copy_regular_file(src: &Path, dst: &Path) -> Result<(), DeployError> {
    let template_error = |cause| DeployError::Template {
        src: src.to_owned(),
        dst: dst.to_owned(),
        cause,
    };

    let metadata = tokio::fs::metadata(src).await.map_err(template_error)?;
    if !metadata.is_file() {
        return Err(DeployError::NotRegularFile {
            path: src.to_owned(),
        });
    }

    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(template_error)?;
    }
    tokio::fs::copy(src, dst).await.map_err(template_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(root: &Path) -> TemplateLayout {
        TemplateLayout {
            workloads_dir: root.join("workloads"),
            functions_dir: root.join("functions"),
            ..Default::default()
        }
    }

    #[test]
    fn default_layout_covers_all_targets() {
        let copies = TemplateLayout::default().copies();
        // one go file and two python files, four targets each
        assert_eq!(copies.len(), 12);
        assert!(copies.contains(&(
            PathBuf::from("workloads/go/function.go"),
            PathBuf::from("functions/gcf/go/bencher/function.go"),
        )));
        assert!(copies.contains(&(
            PathBuf::from("workloads/python/Pipfile"),
            PathBuf::from("functions/azf/python/Pipfile"),
        )));
    }

    #[tokio::test]
    async fn install_copies_into_every_target() {
        let root = tempfile::tempdir().unwrap();
        let layout = layout(root.path());

        for template in &layout.templates {
            let dir = layout.workloads_dir.join(&template.runtime);
            std::fs::create_dir_all(&dir).unwrap();
            for file in &template.files {
                std::fs::write(dir.join(file), file.as_bytes()).unwrap();
            }
        }

        assert_eq!(layout.install().await.unwrap(), 12);
        let copied = root.path().join("functions/ow/go/bencher/function.go");
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "function.go");
    }

    #[tokio::test]
    async fn directories_are_not_templates() {
        let root = tempfile::tempdir().unwrap();
        let mut layout = layout(root.path());
        layout.templates.truncate(1);
        std::fs::create_dir_all(layout.workloads_dir.join("go/function.go")).unwrap();

        let err = layout.install().await.unwrap_err();
        assert!(matches!(err, DeployError::NotRegularFile { .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_template_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = layout(root.path()).install().await.unwrap_err();
        assert!(matches!(err, DeployError::Template { .. }), "{err}");
    }
}
