use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::event::AgentEvent;

/// Stream of agent events for one run. Items arrive in the order the agent
/// produced them; an `Err` item ends the run.
pub type AgentEventStream = BoxStream<'static, Result<AgentEvent, AgentError>>;

/// One tool entry of an agent's catalog, shown by `/tools`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Identity an agent reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
}

/// Input for starting one agent run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunRequest {
    pub task: String,
    /// Ask the agent to forget earlier turns before this run.
    pub reset_memory: bool,
    pub images: Vec<PathBuf>,
    pub additional_args: serde_json::Map<String, serde_json::Value>,
}

impl RunRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn reset_memory(mut self, reset: bool) -> Self {
        self.reset_memory = reset;
        self
    }
}

/// A multi-step agent driven by the chat front end.
#[async_trait::async_trait]
pub trait Agent: Send + Sync {
    fn profile(&self) -> AgentProfile;

    /// True when the agent streams its model output as text deltas, in which
    /// case step headers and model text are not repeated from step events.
    fn streams_outputs_inline(&self) -> bool {
        false
    }

    async fn start_run(&self, request: RunRequest) -> Result<AgentEventStream, AgentError>;

    async fn reset_memory(&self) -> Result<(), AgentError>;
}

/// Produces an independent agent for each chat session.
pub trait AgentFactory: Send + Sync {
    fn profile(&self) -> AgentProfile;

    fn create_agent(&self) -> Result<Arc<dyn Agent>, AgentError>;
}
