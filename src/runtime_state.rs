//! Runtime State Store (C4): persists the current-phase cursor for resume.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DirorchError;
use crate::log_warn;

#[derive(Debug, Serialize, Deserialize, Default)]
struct RuntimeStateDoc {
    current_phase: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RuntimeStateStore {
    path: PathBuf,
}

impl RuntimeStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Missing file or parse failure both mean "fresh start": logged at
    /// WARNING in the parse-failure case, silent in the missing-file case.
    pub async fn load(&self) -> Option<String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(_) => return None,
        };
        match serde_json::from_str::<RuntimeStateDoc>(&contents) {
            Ok(doc) => doc.current_phase,
            Err(e) => {
                log_warn!(
                    "[state] {} is not valid runtime state ({}); treating as fresh start",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    pub async fn save(&self, phase: &str) -> Result<(), DirorchError> {
        let doc = RuntimeStateDoc {
            current_phase: Some(phase.to_string()),
        };
        let contents = serde_json::to_string_pretty(&doc)
            .expect("RuntimeStateDoc serialization cannot fail");
        tokio::fs::write(&self.path, contents).await.map_err(|e| {
            DirorchError::Filesystem(format!(
                "writing runtime state {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}
