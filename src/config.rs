//! Parsing and validation of the workflow configuration document (YAML).

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::DirorchError;

pub const FAILED_STATE: &str = "_failed";

/// Either a bare command string or a `{cmd, stdin}` mapping.
///
/// The bare-string form is by far the common case, so it stays terse in the
/// document; the structured form exists for hooks that need rendered stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookSpec {
    Bare(String),
    Structured {
        cmd: String,
        stdin: Option<String>,
    },
}

impl HookSpec {
    pub fn cmd(&self) -> &str {
        match self {
            HookSpec::Bare(cmd) => cmd,
            HookSpec::Structured { cmd, .. } => cmd,
        }
    }

    pub fn stdin_template(&self) -> Option<&str> {
        match self {
            HookSpec::Bare(_) => None,
            HookSpec::Structured { stdin, .. } => stdin.as_deref(),
        }
    }
}

impl<'de> Deserialize<'de> for HookSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HookSpecRaw {
            Bare(String),
            Structured {
                cmd: String,
                #[serde(default)]
                stdin: Option<String>,
            },
        }

        match HookSpecRaw::deserialize(deserializer)? {
            HookSpecRaw::Bare(cmd) => Ok(HookSpec::Bare(cmd)),
            HookSpecRaw::Structured { cmd, stdin } => Ok(HookSpec::Structured { cmd, stdin }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseMode {
    #[default]
    Transitions,
    Entity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransitionDoc {
    from: String,
    to: String,
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default)]
    jump: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PhaseDoc {
    states: Vec<String>,
    mode: PhaseMode,
    transitions: Vec<TransitionDoc>,
    #[serde(alias = "completion")]
    completions: Vec<HookSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct WorkflowDoc {
    phases: IndexMap<String, PhaseDoc>,
    retries: Option<u32>,
    env: HashMap<String, String>,
    environment: HashMap<String, String>,
    init: Option<HookSpec>,
}

const DEFAULT_RETRIES: u32 = 3;

/// A fully validated, typed transition rule.
#[derive(Debug, Clone)]
pub struct TransitionRule {
    pub from: String,
    pub to: String,
    pub hook: Option<HookSpec>,
    pub jump: Option<String>,
}

/// A fully validated, typed phase.
#[derive(Debug, Clone)]
pub struct Phase {
    pub name: String,
    pub states: Vec<String>,
    pub mode: PhaseMode,
    pub transitions: Vec<TransitionRule>,
    pub completions: Vec<HookSpec>,
}

/// A fully validated, typed workflow configuration.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub phases: IndexMap<String, Phase>,
    pub retries: u32,
    pub env: HashMap<String, String>,
    pub init: Option<HookSpec>,
}

impl WorkflowConfig {
    pub fn from_yaml_str(contents: &str) -> Result<WorkflowConfig, DirorchError> {
        let doc: WorkflowDoc = serde_yaml_ng::from_str(contents)
            .map_err(|e| DirorchError::ConfigInvalid(format!("  - {}", e)))?;
        validate_and_build(doc)
    }

    /// Ordered list of phase names, declaration order.
    pub fn phase_names(&self) -> Vec<String> {
        self.phases.keys().cloned().collect()
    }
}

fn validate_and_build(doc: WorkflowDoc) -> Result<WorkflowConfig, DirorchError> {
    let mut errors = Vec::new();

    if doc.phases.is_empty() {
        errors.push("phases: must declare at least one phase".to_string());
    }

    let phase_names: Vec<String> = doc.phases.keys().cloned().collect();

    let mut phases = IndexMap::new();
    for (name, phase_doc) in &doc.phases {
        if phase_doc.states.is_empty() {
            errors.push(format!("phases.{}.states: must be non-empty", name));
        }
        let mut seen = std::collections::HashSet::new();
        for state in &phase_doc.states {
            if state == FAILED_STATE {
                errors.push(format!(
                    "phases.{}.states: '{}' is reserved and cannot be declared",
                    name, FAILED_STATE
                ));
            }
            if !seen.insert(state.clone()) {
                errors.push(format!(
                    "phases.{}.states: duplicate state '{}'",
                    name, state
                ));
            }
        }

        let mut transitions = Vec::with_capacity(phase_doc.transitions.len());
        for (i, t) in phase_doc.transitions.iter().enumerate() {
            if !phase_doc.states.contains(&t.from) {
                errors.push(format!(
                    "phases.{}.transitions[{}].from: '{}' is not a declared state",
                    name, i, t.from
                ));
            }
            if !phase_doc.states.contains(&t.to) {
                errors.push(format!(
                    "phases.{}.transitions[{}].to: '{}' is not a declared state",
                    name, i, t.to
                ));
            }
            if t.stdin.is_some() && t.cmd.is_none() {
                errors.push(format!(
                    "phases.{}.transitions[{}].stdin: requires 'cmd' to be set",
                    name, i
                ));
            }
            if let Some(jump) = &t.jump {
                if !phase_names.contains(jump) {
                    errors.push(format!(
                        "phases.{}.transitions[{}].jump: '{}' is not a declared phase",
                        name, i, jump
                    ));
                }
            }
            let hook = t.cmd.clone().map(|cmd| HookSpec::Structured {
                cmd,
                stdin: t.stdin.clone(),
            });
            transitions.push(TransitionRule {
                from: t.from.clone(),
                to: t.to.clone(),
                hook,
                jump: t.jump.clone(),
            });
        }

        phases.insert(
            name.clone(),
            Phase {
                name: name.clone(),
                states: phase_doc.states.clone(),
                mode: phase_doc.mode,
                transitions,
                completions: phase_doc.completions.clone(),
            },
        );
    }

    if !errors.is_empty() {
        return Err(DirorchError::ConfigInvalid(
            errors
                .into_iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n"),
        ));
    }

    let mut env = doc.environment;
    env.extend(doc.env);

    Ok(WorkflowConfig {
        phases,
        retries: doc.retries.unwrap_or(DEFAULT_RETRIES),
        env,
        init: doc.init,
    })
}
