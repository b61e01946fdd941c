use std::path::Path;

use dirorch::config::WorkflowConfig;
use dirorch::workflow_engine::WorkflowEngine;

/// Write `filename` under `phase/state` in `root` with the given contents.
pub fn write_entity(root: &Path, phase: &str, state: &str, filename: &str, contents: &str) {
    let dir = root.join(phase).join(state);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(filename), contents).unwrap();
}

pub fn entity_exists(root: &Path, phase: &str, state: &str, filename: &str) -> bool {
    root.join(phase).join(state).join(filename).exists()
}

pub async fn run(root: &Path, yaml: &str) -> Result<(), String> {
    let config = WorkflowConfig::from_yaml_str(yaml).map_err(|e| e.to_string())?;
    let engine = WorkflowEngine::new(root.to_path_buf(), config, ".dirorch_runtime.json")
        .map_err(|e| e.to_string())?;
    engine.run().await.map_err(|e| e.to_string())
}
