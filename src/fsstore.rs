//! Filesystem Store (C1): entity files under `<root>/<phase>/<state>/`.

use std::path::{Path, PathBuf};

use crate::config::{WorkflowConfig, FAILED_STATE};
use crate::error::DirorchError;

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// `root` is resolved to an absolute path (joined against the current
    /// working directory if relative) without requiring it to already exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DirorchError> {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self, phase: &str, state: &str) -> PathBuf {
        self.root.join(phase).join(state)
    }

    pub fn entity_path(&self, phase: &str, state: &str, filename: &str) -> PathBuf {
        self.state_dir(phase, state).join(filename)
    }

    pub async fn ensure_dirs(&self, config: &WorkflowConfig) -> Result<(), DirorchError> {
        for (phase_name, phase) in &config.phases {
            for state in &phase.states {
                let dir = self.state_dir(phase_name, state);
                tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                    DirorchError::Filesystem(format!("creating {}: {}", dir.display(), e))
                })?;
            }
            let failed = self.state_dir(phase_name, FAILED_STATE);
            tokio::fs::create_dir_all(&failed).await.map_err(|e| {
                DirorchError::Filesystem(format!("creating {}: {}", failed.display(), e))
            })?;
        }
        Ok(())
    }

    pub async fn list_entities(
        &self,
        phase: &str,
        state: &str,
    ) -> Result<Vec<String>, DirorchError> {
        let dir = self.state_dir(phase, state);
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| DirorchError::Filesystem(format!("reading {}: {}", dir.display(), e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DirorchError::Filesystem(format!("reading {}: {}", dir.display(), e)))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DirorchError::Filesystem(e.to_string()))?;
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    pub async fn move_entity(
        &self,
        phase: &str,
        from: &str,
        to: &str,
        filename: &str,
    ) -> Result<(), DirorchError> {
        let src = self.entity_path(phase, from, filename);
        let dst = self.entity_path(phase, to, filename);
        if tokio::fs::try_exists(&dst).await.unwrap_or(false) {
            return Err(DirorchError::DestinationExists {
                phase: phase.to_string(),
                to_state: to.to_string(),
                filename: filename.to_string(),
            });
        }
        tokio::fs::rename(&src, &dst).await.map_err(|e| {
            DirorchError::Filesystem(format!(
                "moving {} -> {}: {}",
                src.display(),
                dst.display(),
                e
            ))
        })
    }
}
