//! Workflow Engine (C7): the top-level loop driving phases to fixpoint in
//! order, with jump recursion, completion hooks, and the termination rule.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::WorkflowConfig;
use crate::engine::EngineCtx;
use crate::env;
use crate::error::DirorchError;
use crate::fsstore::FsStore;
use crate::hookrunner::{self, HookOutcome};
use crate::phase_engine::{self, BoxFuture, FixpointReport, JumpHandler};
use crate::runtime_state::RuntimeStateStore;
use crate::{log_info, log_warn};

/// Jump recursion depth above which a warning is logged on every further
/// jump. Chosen generously; this crate does not forbid deep or cyclic jump
/// chains, only calls them out once they get suspicious.
const JUMP_DEPTH_WARNING_THRESHOLD: u32 = 50;

struct RecursiveJump {
    ctx: EngineCtx,
    depth: u32,
}

impl JumpHandler for RecursiveJump {
    fn handle(&self, phase_name: String) -> BoxFuture<'static, Result<(), DirorchError>> {
        let ctx = self.ctx.clone();
        let depth = self.depth + 1;
        Box::pin(async move {
            if depth >= JUMP_DEPTH_WARNING_THRESHOLD {
                log_warn!(
                    "[jump] recursion depth {} entering '{}' — possible jump cycle",
                    depth,
                    phase_name
                );
            }
            log_info!("[jump] entering {}", phase_name);
            let handler = RecursiveJump {
                ctx: ctx.clone(),
                depth,
            };
            let report = phase_engine::run_phase_to_fixpoint(&ctx, &phase_name, &handler).await?;
            log_info!(
                "[jump] exiting {} ({} moves)",
                phase_name,
                report.total_moves
            );
            Ok(())
        })
    }
}

pub struct WorkflowEngine {
    ctx: EngineCtx,
    state_store: RuntimeStateStore,
}

impl WorkflowEngine {
    pub fn new(
        root: PathBuf,
        config: WorkflowConfig,
        state_file: &str,
    ) -> Result<Self, DirorchError> {
        let store = FsStore::new(root)?;
        let state_path = store.root().join(state_file);
        let retries = config.retries;
        Ok(Self {
            ctx: EngineCtx {
                store: Arc::new(store),
                config: Arc::new(config),
                retries,
            },
            state_store: RuntimeStateStore::new(state_path),
        })
    }

    pub async fn run(&self) -> Result<(), DirorchError> {
        self.ctx.store.ensure_dirs(&self.ctx.config).await?;

        let phase_names = self.ctx.config.phase_names();
        let loaded = self.state_store.load().await;
        let fresh_start = loaded.is_none();

        let mut idx = match loaded {
            Some(phase) if self.ctx.config.phases.contains_key(&phase) => {
                phase_names.iter().position(|p| p == &phase).unwrap_or(0)
            }
            _ => 0,
        };

        if fresh_start {
            if let Some(init_hook) = &self.ctx.config.init {
                log_info!("[init] running");
                let hook_env = env::compose(&self.ctx.config, &self.ctx.store, None);
                let template_ctx = env::compose_template_ctx(&self.ctx.config, &self.ctx.store);
                let outcome = hookrunner::run(
                    init_hook,
                    &hook_env,
                    self.ctx.retries,
                    &template_ctx,
                    self.ctx.store.root(),
                )
                .await?;
                if outcome == HookOutcome::Exhausted {
                    return Err(DirorchError::InitExhausted);
                }
                log_info!("[init] complete");
            }
        }

        let n = phase_names.len();
        // The first loop iteration is the cursor's initial entry, whatever
        // phase it lands on (resume may start anywhere) — it never counts as
        // a "wrap to the first phase" for the termination rule, even when
        // the cursor itself is phase 0. Every later arrival at phase 0 is a
        // genuine wrap and is eligible to terminate the run.
        let mut first_iteration = true;

        loop {
            let phase_name = phase_names[idx].clone();
            log_info!("[phase] {} starting", phase_name);
            self.state_store.save(&phase_name).await?;

            let jump_handler = RecursiveJump {
                ctx: self.ctx.clone(),
                depth: 0,
            };
            let report: FixpointReport =
                phase_engine::run_phase_to_fixpoint(&self.ctx, &phase_name, &jump_handler).await?;
            log_info!(
                "[phase] {} at fixpoint ({} moves)",
                phase_name,
                report.total_moves
            );

            if idx == 0 && !first_iteration && report.first_pass_moves == 0 {
                log_info!("[workflow] idle on first phase; terminating");
                return Ok(());
            }
            first_iteration = false;

            for completion in &self.ctx.config.phases[&phase_name].completions {
                log_info!("[completion] {} running: {}", phase_name, completion.cmd());
                let hook_env = env::compose(&self.ctx.config, &self.ctx.store, None);
                let template_ctx = env::compose_template_ctx(&self.ctx.config, &self.ctx.store);
                let outcome = hookrunner::run(
                    completion,
                    &hook_env,
                    self.ctx.retries,
                    &template_ctx,
                    self.ctx.store.root(),
                )
                .await?;
                if outcome == HookOutcome::Exhausted {
                    return Err(DirorchError::CompletionExhausted(phase_name.clone()));
                }
            }

            idx = (idx + 1) % n;
        }
    }
}
