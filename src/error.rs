use std::path::PathBuf;

/// Classified error type threaded through every component.
///
/// The CLI entry point is the only place one of these gets turned into a
/// process exit code; every other layer just propagates with `?`.
#[derive(Debug, thiserror::Error)]
pub enum DirorchError {
    #[error("configuration invalid:\n{0}")]
    ConfigInvalid(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error(
        "entity '{filename}' already exists in {phase}/{to_state} (rename destination collision)"
    )]
    DestinationExists {
        phase: String,
        to_state: String,
        filename: String,
    },

    #[error("init hook exhausted its retries")]
    InitExhausted,

    #[error("completion hook for phase '{0}' exhausted its retries")]
    CompletionExhausted(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("workflow file not found: tried '{direct}' and '{resolved}'")]
    WorkflowNotFound { direct: PathBuf, resolved: PathBuf },

    #[error("cannot resolve config home: neither $XDG_CONFIG_DIR nor $HOME is set")]
    NoConfigHome,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DirorchError> for String {
    fn from(e: DirorchError) -> String {
        e.to_string()
    }
}
