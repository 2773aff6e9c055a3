//! Artifact writer
//!
//! Resolves each execution's artifact paths against the configured output
//! directory (plus the instance's `output` subdirectory), creates parent
//! directories, and writes text or binary contents. A write failure is fatal
//! for the run; already-written artifacts are not rolled back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ArtifactWriteError;

use super::{ArtifactContents, FormatterExecution};

/// Writes formatter executions beneath one output directory.
pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write every artifact, returning `execution id → absolute paths`.
    /// Executions with zero artifacts are skipped entirely.
    pub async fn write(
        &self,
        executions: &[FormatterExecution],
    ) -> Result<BTreeMap<String, Vec<PathBuf>>, ArtifactWriteError> {
        let mut written: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        for execution in executions {
            if execution.artifacts.is_empty() {
                continue;
            }

            let base = match &execution.plan.output {
                Some(output) => self.out_dir.join(output),
                None => self.out_dir.join(&execution.plan.id),
            };

            let mut paths = Vec::with_capacity(execution.artifacts.len());
            for artifact in &execution.artifacts {
                let target = base.join(&artifact.path);
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|source| {
                        ArtifactWriteError {
                            path: parent.display().to_string(),
                            source,
                        }
                    })?;
                }

                let bytes: &[u8] = match &artifact.contents {
                    ArtifactContents::Text(text) => text.as_bytes(),
                    ArtifactContents::Binary(bytes) => bytes,
                };
                tokio::fs::write(&target, bytes)
                    .await
                    .map_err(|source| ArtifactWriteError {
                        path: target.display().to_string(),
                        source,
                    })?;
                paths.push(target);
            }

            tracing::info!(
                execution = %execution.execution_id,
                formatter = %execution.plan.name,
                files = paths.len(),
                "artifacts written"
            );
            written.insert(execution.execution_id.clone(), paths);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Artifact, FormatterPlan};
    use tempfile::TempDir;

    fn execution(id: &str, output: Option<&str>, artifacts: Vec<Artifact>) -> FormatterExecution {
        FormatterExecution {
            execution_id: id.to_string(),
            plan: FormatterPlan {
                id: "css#0".to_string(),
                name: "css".to_string(),
                output: output.map(String::from),
                options: None,
            },
            artifacts,
        }
    }

    #[tokio::test]
    async fn writes_under_instance_id_by_default() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let written = writer
            .write(&[execution(
                "exec-1",
                None,
                vec![Artifact::text("tokens.css", ":root {}\n")],
            )])
            .await
            .unwrap();

        let paths = &written["exec-1"];
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("css#0/tokens.css"));
        let contents = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(contents, ":root {}\n");
    }

    #[tokio::test]
    async fn output_option_overrides_the_subdirectory() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let written = writer
            .write(&[execution(
                "exec-2",
                Some("web/css"),
                vec![Artifact::text("nested/deep/tokens.css", "x")],
            )])
            .await
            .unwrap();

        assert!(written["exec-2"][0].ends_with("web/css/nested/deep/tokens.css"));
        assert!(written["exec-2"][0].exists());
    }

    #[tokio::test]
    async fn zero_artifact_executions_are_skipped() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let written = writer
            .write(&[execution("exec-3", None, vec![])])
            .await
            .unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn binary_artifacts_round_trip() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let payload = vec![0u8, 159, 146, 150];
        let written = writer
            .write(&[execution(
                "exec-4",
                Some("docs"),
                vec![Artifact::binary("assets/media/x.bin", payload.clone())],
            )])
            .await
            .unwrap();

        let bytes = std::fs::read(&written["exec-4"][0]).unwrap();
        assert_eq!(bytes, payload);
    }
}
