use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::ArtifactRef;

#[derive(Debug, Error, PartialEq)]
#[error("{} artifact(s) could not be deleted.", .failed.len())]
pub struct ArtifactCleanupError {
    pub failed: Vec<ArtifactRef>,
}

/// External storage holding submitted files.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Deletes every artifact in `refs`. Deleting an artifact that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// The references that could not be deleted. The others are gone.
    async fn delete_artifacts(&self, refs: &[ArtifactRef]) -> Result<(), ArtifactCleanupError>;
}

/// Artifacts kept as plain files directly under `root`, named by their reference.
#[derive(Clone, Debug)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `None` unless `artifact` names a single file directly under the root.
    fn resolve(&self, artifact: &ArtifactRef) -> Option<PathBuf> {
        let name = Path::new(artifact.as_str());
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.root.join(file)),
            _ => None,
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn delete_artifacts(&self, refs: &[ArtifactRef]) -> Result<(), ArtifactCleanupError> {
        let mut failed = Vec::new();

        for artifact in refs {
            let path = match self.resolve(artifact) {
                Some(path) => path,
                None => {
                    tracing::warn!(%artifact, "Refusing to delete artifact outside of the artifact directory.");
                    failed.push(artifact.clone());
                    continue;
                }
            };

            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(%artifact, "Deleted artifact."),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(%artifact, "Artifact already deleted.")
                }
                Err(e) => {
                    tracing::error!(error = ?e, %artifact, "Failed to delete artifact.");
                    failed.push(artifact.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ArtifactCleanupError { failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use uuid::Uuid;

    use super::*;

    async fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("artifacts-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    #[rstest]
    #[case("essay.pdf", true)]
    #[case("../essay.pdf", false)]
    #[case("nested/essay.pdf", false)]
    #[case("/etc/passwd", false)]
    #[case("..", false)]
    #[case("", false)]
    fn only_plain_file_names_resolve(#[case] name: &str, #[case] resolves: bool) {
        let store = LocalArtifactStore::new("/srv/artifacts");

        assert_eq!(resolves, store.resolve(&ArtifactRef::new(name)).is_some());
    }

    #[tokio::test]
    async fn deletes_files_and_tolerates_missing_ones() {
        let dir = scratch_dir().await;
        tokio::fs::write(dir.join("s1-essay.pdf"), b"essay").await.unwrap();
        let store = LocalArtifactStore::new(&dir);

        let result = store
            .delete_artifacts(&[ArtifactRef::new("s1-essay.pdf"), ArtifactRef::new("never-there.pdf")])
            .await;

        assert!(result.is_ok());
        assert!(!dir.join("s1-essay.pdf").exists());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn reports_refused_references() {
        let dir = scratch_dir().await;
        tokio::fs::write(dir.join("ok.pdf"), b"ok").await.unwrap();
        let store = LocalArtifactStore::new(&dir);

        let err = store
            .delete_artifacts(&[ArtifactRef::new("ok.pdf"), ArtifactRef::new("../escape.pdf")])
            .await
            .unwrap_err();

        assert_eq!(vec![ArtifactRef::new("../escape.pdf")], err.failed);
        assert!(!dir.join("ok.pdf").exists());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
