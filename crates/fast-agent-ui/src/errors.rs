/// Failures raised by an agent collaborator.
///
/// Every variant is caught at the turn boundary and rendered as one terminal
/// `Error` message; none of them escapes a turn stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// The agent could not be created from its template.
    #[error("agent init failed: {0}")]
    Init(String),
    /// The agent refused or failed to start a run.
    #[error("{0}")]
    Start(String),
    /// The agent's event stream failed after it started.
    #[error("{0}")]
    Stream(String),
    /// The agent's memory reset failed.
    #[error("memory reset failed: {0}")]
    Reset(String),
    /// A scripted agent could not load or continue its script.
    #[error("script error: {0}")]
    Script(String),
}

impl AgentError {
    /// Creates a mid-stream failure.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Creates a start-of-run failure.
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start(message.into())
    }
}

/// Failures raised while turning a step event into transcript messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The agent emitted a step kind this front end has no rendering for.
    #[error("Unsupported step type: {kind}")]
    UnsupportedStepKind { kind: String },
}

/// Top-level error type for building the chat interface and opening sessions.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    /// Invalid interface configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Filesystem setup failed (for example creating the upload folder).
    #[error("io error ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The agent template could not produce a session agent.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Failure that terminates a turn. Only ever rendered, never returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TurnError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}
