//! Phase Engine (C6): drives a single phase to fixpoint, in `transitions` or
//! `entity` mode.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::config::{PhaseMode, TransitionRule, FAILED_STATE};
use crate::engine::EngineCtx;
use crate::env;
use crate::error::DirorchError;
use crate::hookrunner::{self, HookOutcome};
use crate::{group, log_info, log_warn};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Recursive jump callback: invoked synchronously whenever a successful
/// transition (or entity-mode step) carries a `jump`.
pub trait JumpHandler: Send + Sync {
    fn handle(&self, phase_name: String) -> BoxFuture<'static, Result<(), DirorchError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixpointReport {
    pub total_moves: u64,
    pub first_pass_moves: u64,
}

enum MoveOutcome {
    Success,
    ToFailed,
}

/// Run `rule` for one entity: compose env, invoke the hook (if any), move
/// the file. Returns `None` if there was no hook (pure move, always
/// succeeds).
async fn apply_rule_to_entity(
    ctx: &EngineCtx,
    phase_name: &str,
    rule: &TransitionRule,
    filename: &str,
) -> Result<MoveOutcome, DirorchError> {
    match &rule.hook {
        None => {
            ctx.store
                .move_entity(phase_name, &rule.from, &rule.to, filename)
                .await?;
            log_info!("[move] {}/{}: {} -> {}", phase_name, rule.from, filename, rule.to);
            Ok(MoveOutcome::Success)
        }
        Some(hook) => {
            let entity_path = ctx.store.entity_path(phase_name, &rule.from, filename);
            let hook_env = env::compose(&ctx.config, &ctx.store, Some(&entity_path));
            let template_ctx = env::compose_template_ctx(&ctx.config, &ctx.store);

            let outcome = hookrunner::run(
                hook,
                &hook_env,
                ctx.retries,
                &template_ctx,
                ctx.store.root(),
            )
            .await?;

            match outcome {
                HookOutcome::Success => {
                    ctx.store
                        .move_entity(phase_name, &rule.from, &rule.to, filename)
                        .await?;
                    log_info!(
                        "[move] {}/{}: {} -> {}",
                        phase_name,
                        rule.from,
                        filename,
                        rule.to
                    );
                    Ok(MoveOutcome::Success)
                }
                HookOutcome::Exhausted => {
                    ctx.store
                        .move_entity(phase_name, &rule.from, FAILED_STATE, filename)
                        .await?;
                    log_warn!(
                        "[move] {}/{}: {} exhausted retries -> {}",
                        phase_name,
                        rule.from,
                        filename,
                        FAILED_STATE
                    );
                    Ok(MoveOutcome::ToFailed)
                }
            }
        }
    }
}

async fn run_transitions_pass(
    ctx: &EngineCtx,
    phase_name: &str,
    on_jump: &dyn JumpHandler,
) -> Result<u64, DirorchError> {
    let phase = ctx.config.phases[phase_name].clone();
    let mut pass_moves = 0u64;

    for rule in &phase.transitions {
        let filenames = ctx.store.list_entities(phase_name, &rule.from).await?;
        if filenames.is_empty() {
            continue;
        }

        let results = group::run_grouped(&filenames, {
            let ctx = ctx.clone();
            let phase_name = phase_name.to_string();
            let rule = rule.clone();
            move |filename| {
                let ctx = ctx.clone();
                let phase_name = phase_name.clone();
                let rule = rule.clone();
                async move {
                    apply_rule_to_entity(&ctx, &phase_name, &rule, &filename).await
                }
            }
        })
        .await;

        for (_, outcome) in results {
            match outcome? {
                MoveOutcome::Success => {
                    pass_moves += 1;
                    if let Some(jump) = &rule.jump {
                        on_jump.handle(jump.clone()).await?;
                    }
                }
                MoveOutcome::ToFailed => {
                    pass_moves += 1;
                }
            }
        }
    }

    Ok(pass_moves)
}

async fn run_transitions_mode(
    ctx: &EngineCtx,
    phase_name: &str,
    on_jump: &dyn JumpHandler,
) -> Result<FixpointReport, DirorchError> {
    let mut report = FixpointReport::default();
    let mut first_pass = true;

    loop {
        let pass_moves = run_transitions_pass(ctx, phase_name, on_jump).await?;
        if first_pass {
            report.first_pass_moves = pass_moves;
            first_pass = false;
        }
        report.total_moves += pass_moves;
        if pass_moves == 0 {
            break;
        }
    }

    Ok(report)
}

async fn run_entity_mode(
    ctx: &EngineCtx,
    phase_name: &str,
    on_jump: &dyn JumpHandler,
) -> Result<FixpointReport, DirorchError> {
    let phase = ctx.config.phases[phase_name].clone();
    let mut report = FixpointReport::default();
    let mut first_pass = true;

    loop {
        let mut pass_moves = 0u64;
        let mut at_rest: HashSet<(String, String)> = HashSet::new();

        loop {
            let mut picked: Option<(String, String)> = None;
            'find: for state in &phase.states {
                let names = ctx.store.list_entities(phase_name, state).await?;
                for name in names {
                    if !at_rest.contains(&(state.clone(), name.clone())) {
                        picked = Some((state.clone(), name));
                        break 'find;
                    }
                }
            }

            let Some((mut current_state, filename)) = picked else {
                break;
            };

            loop {
                let rule = phase.transitions.iter().find(|r| r.from == current_state);
                let Some(rule) = rule else {
                    at_rest.insert((current_state.clone(), filename.clone()));
                    break;
                };

                match apply_rule_to_entity(ctx, phase_name, rule, &filename).await? {
                    MoveOutcome::Success => {
                        pass_moves += 1;
                        if let Some(jump) = &rule.jump {
                            on_jump.handle(jump.clone()).await?;
                        }
                        current_state = rule.to.clone();
                    }
                    MoveOutcome::ToFailed => {
                        pass_moves += 1;
                        break;
                    }
                }
            }
        }

        if first_pass {
            report.first_pass_moves = pass_moves;
            first_pass = false;
        }
        report.total_moves += pass_moves;
        if pass_moves == 0 {
            break;
        }
    }

    Ok(report)
}

pub async fn run_phase_to_fixpoint(
    ctx: &EngineCtx,
    phase_name: &str,
    on_jump: &dyn JumpHandler,
) -> Result<FixpointReport, DirorchError> {
    match ctx.config.phases[phase_name].mode {
        PhaseMode::Transitions => run_transitions_mode(ctx, phase_name, on_jump).await,
        PhaseMode::Entity => run_entity_mode(ctx, phase_name, on_jump).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use crate::fsstore::FsStore;
    use std::sync::Arc;

    struct NoJump;
    impl JumpHandler for NoJump {
        fn handle(&self, _phase_name: String) -> BoxFuture<'static, Result<(), DirorchError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn ctx_for(dir: &std::path::Path, yaml: &str) -> EngineCtx {
        let config = WorkflowConfig::from_yaml_str(yaml).unwrap();
        let store = FsStore::new(dir).unwrap();
        EngineCtx {
            store: Arc::new(store),
            config: Arc::new(config),
            retries: 0,
        }
    }

    #[tokio::test]
    async fn pure_move_transition_reaches_fixpoint_in_one_pass() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(
            dir.path(),
            "phases:\n  tasks:\n    states: [new, done]\n    transitions:\n      - from: new\n        to: done\n",
        );
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        std::fs::write(dir.path().join("tasks/new/a.txt"), "").unwrap();
        std::fs::write(dir.path().join("tasks/new/b.txt"), "").unwrap();

        let report = run_phase_to_fixpoint(&ctx, "tasks", &NoJump).await.unwrap();
        assert_eq!(report.first_pass_moves, 2);
        assert_eq!(report.total_moves, 2);
        assert!(dir.path().join("tasks/done/a.txt").exists());
        assert!(dir.path().join("tasks/done/b.txt").exists());
    }

    #[tokio::test]
    async fn always_failing_hook_quarantines_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(
            dir.path(),
            "phases:\n  p:\n    states: [new, ok]\n    transitions:\n      - from: new\n        to: ok\n        cmd: \"false\"\n",
        );
        let ctx = EngineCtx { retries: 2, ..ctx };
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        std::fs::write(dir.path().join("p/new/x"), "").unwrap();

        let report = run_phase_to_fixpoint(&ctx, "p", &NoJump).await.unwrap();
        assert_eq!(report.total_moves, 1);
        assert!(dir.path().join("p/_failed/x").exists());
        assert!(!dir.path().join("p/new/x").exists());
    }

    #[tokio::test]
    async fn entity_mode_drives_one_entity_through_all_transitions_before_the_next() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(
            dir.path(),
            "phases:\n  p:\n    mode: entity\n    states: [new, mid, done]\n    transitions:\n      - from: new\n        to: mid\n        cmd: \"true\"\n      - from: mid\n        to: done\n        cmd: \"true\"\n",
        );
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        std::fs::write(dir.path().join("p/new/a"), "").unwrap();
        std::fs::write(dir.path().join("p/new/b"), "").unwrap();

        let report = run_phase_to_fixpoint(&ctx, "p", &NoJump).await.unwrap();
        assert_eq!(report.total_moves, 4);
        assert!(dir.path().join("p/done/a").exists());
        assert!(dir.path().join("p/done/b").exists());
    }

    #[tokio::test]
    async fn inherited_process_env_is_not_exposed_to_the_stdin_template() {
        std::env::set_var("DIRORCH_PHASE_ENGINE_TEST_VAR", "leaked-if-broken");
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(
            dir.path(),
            "phases:\n  p:\n    states: [new, ok]\n    transitions:\n      - from: new\n        to: ok\n        cmd: \"true\"\n        stdin: \"{{DIRORCH_PHASE_ENGINE_TEST_VAR}}\"\n",
        );
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        std::fs::write(dir.path().join("p/new/x"), "").unwrap();

        // The template references a variable that is only set in the
        // inherited process environment, never in the workflow's own `env`
        // or `DIR_*` vars. Rendering must fail (unknown variable), burning
        // the retry budget and quarantining the entity rather than silently
        // substituting the process value.
        run_phase_to_fixpoint(&ctx, "p", &NoJump).await.unwrap();

        assert!(dir.path().join("p/_failed/x").exists());
        assert!(!dir.path().join("p/ok/x").exists());
        std::env::remove_var("DIRORCH_PHASE_ENGINE_TEST_VAR");
    }

    #[tokio::test]
    async fn user_declared_env_is_exposed_to_the_stdin_template() {
        let dir = tempfile::tempdir().unwrap();
        let out_file = dir.path().join("out.txt");
        let ctx = ctx_for(
            dir.path(),
            &format!(
                "env:\n  GREETING: hello\nphases:\n  p:\n    states: [new, ok]\n    transitions:\n      - from: new\n        to: ok\n        cmd: \"cat > {}\"\n        stdin: \"{{{{GREETING}}}}\"\n",
                out_file.display()
            ),
        );
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        std::fs::write(dir.path().join("p/new/x"), "").unwrap();

        run_phase_to_fixpoint(&ctx, "p", &NoJump).await.unwrap();

        assert!(dir.path().join("p/ok/x").exists());
        assert_eq!(std::fs::read_to_string(&out_file).unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_phase_is_already_at_fixpoint() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_for(
            dir.path(),
            "phases:\n  p:\n    states: [new, done]\n",
        );
        ctx.store.ensure_dirs(&ctx.config).await.unwrap();
        let report = run_phase_to_fixpoint(&ctx, "p", &NoJump).await.unwrap();
        assert_eq!(report.first_pass_moves, 0);
        assert_eq!(report.total_moves, 0);
    }
}
