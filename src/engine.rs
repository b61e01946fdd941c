//! Shared context passed between the Phase Engine (C6) and the Workflow
//! Engine (C7). `Arc`-wrapped so it can be cloned cheaply into concurrently
//! spawned per-entity tasks (see `group::run_grouped`).

use std::sync::Arc;

use crate::config::WorkflowConfig;
use crate::fsstore::FsStore;

#[derive(Clone)]
pub struct EngineCtx {
    pub store: Arc<FsStore>,
    pub config: Arc<WorkflowConfig>,
    pub retries: u32,
}
