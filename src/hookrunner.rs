//! Hook Runner (C2): spawns the shell command for a hook spec and enforces
//! the retry policy. Grounded in the same subprocess-spawning shape as an
//! agent runner, without timeout enforcement or process-group
//! reassignment — neither is part of this orchestrator's contract.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;

use crate::config::HookSpec;
use crate::error::DirorchError;
use crate::template;
use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    Exhausted,
}

#[cfg(unix)]
fn shell() -> &'static str {
    "sh"
}
#[cfg(unix)]
fn shell_flag() -> &'static str {
    "-c"
}
#[cfg(not(unix))]
fn shell() -> &'static str {
    "cmd"
}
#[cfg(not(unix))]
fn shell_flag() -> &'static str {
    "/C"
}

/// Run `hook` to completion or exhaustion. `retries` is the number of
/// *additional* attempts after the first failure (`retries = 0` means one
/// attempt total). `template_ctx` is used only if the hook has `stdin` set.
pub async fn run(
    hook: &HookSpec,
    env: &HashMap<String, String>,
    retries: u32,
    template_ctx: &HashMap<String, String>,
    root: &Path,
) -> Result<HookOutcome, DirorchError> {
    let attempts = retries as u64 + 1;

    for attempt in 1..=attempts {
        log_debug!(
            "[hook] attempt {}/{}: {}",
            attempt,
            attempts,
            hook.cmd()
        );

        let stdin_bytes = match hook.stdin_template() {
            Some(tmpl) => match template::render(tmpl, template_ctx, root) {
                Ok(rendered) => Some(rendered.into_bytes()),
                Err(e) => {
                    log_warn!(
                        "[hook] attempt {}/{} failed to render stdin: {}",
                        attempt,
                        attempts,
                        e
                    );
                    continue;
                }
            },
            None => None,
        };

        let mut cmd = tokio::process::Command::new(shell());
        cmd.arg(shell_flag()).arg(hook.cmd());
        cmd.env_clear();
        cmd.envs(env);
        cmd.stdin(if stdin_bytes.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log_warn!(
                    "[hook] attempt {}/{} failed to spawn: {}",
                    attempt,
                    attempts,
                    e
                );
                continue;
            }
        };

        if let Some(bytes) = stdin_bytes {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(&bytes).await {
                    log_warn!(
                        "[hook] attempt {}/{} failed writing stdin: {}",
                        attempt,
                        attempts,
                        e
                    );
                }
                drop(stdin);
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => return Ok(HookOutcome::Success),
            Ok(status) => log_warn!(
                "[hook] attempt {}/{} exited with {:?}",
                attempt,
                attempts,
                status.code()
            ),
            Err(e) => log_warn!(
                "[hook] attempt {}/{} failed waiting on child: {}",
                attempt,
                attempts,
                e
            ),
        }
    }

    Ok(HookOutcome::Exhausted)
}
