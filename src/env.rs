//! Environment Composer (C3): builds the per-hook variable mapping.

use std::collections::HashMap;
use std::path::Path;

use crate::config::WorkflowConfig;
use crate::fsstore::FsStore;

pub const INPUT_ENTITY_VAR: &str = "INPUT_ENTITY";

/// The orchestrator-defined variables: user-declared env, then one
/// `DIR_<PHASE>_<STATE>` entry per declared (phase, state) pair, then
/// `INPUT_ENTITY` if `input_entity` is given. Does not include the process
/// environment.
fn orchestrator_vars(
    config: &WorkflowConfig,
    store: &FsStore,
    input_entity: Option<&Path>,
) -> HashMap<String, String> {
    let mut env = config.env.clone();

    for (phase_name, phase) in &config.phases {
        for state in &phase.states {
            let var = format!("DIR_{}_{}", mangle(phase_name), mangle(state));
            env.insert(var, store.state_dir(phase_name, state).to_string_lossy().into_owned());
        }
    }

    if let Some(path) = input_entity {
        env.insert(INPUT_ENTITY_VAR.to_string(), path.to_string_lossy().into_owned());
    }

    env
}

/// Compose the hook environment: process env, overlaid with the
/// orchestrator-defined variables (user env, `DIR_*` vars, `INPUT_ENTITY`).
/// This is the environment the child process inherits.
pub fn compose(
    config: &WorkflowConfig,
    store: &FsStore,
    input_entity: Option<&Path>,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.extend(orchestrator_vars(config, store, input_entity));
    env
}

/// Compose the stdin template context: orchestrator-defined variables only
/// (user env, `DIR_*` vars), never `INPUT_ENTITY` and never the inherited
/// process environment. Only variables the workflow document itself defines
/// are in scope for `{{name}}` substitution.
pub fn compose_template_ctx(config: &WorkflowConfig, store: &FsStore) -> HashMap<String, String> {
    orchestrator_vars(config, store, None)
}

/// Uppercase, replacing every character outside `[A-Z0-9]` with `_`.
pub fn mangle(s: &str) -> String {
    s.chars()
        .map(|c| {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_alphanumeric() {
                upper
            } else {
                '_'
            }
        })
        .collect()
}
