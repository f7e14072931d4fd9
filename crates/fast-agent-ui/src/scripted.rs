//! Deterministic agent that replays scripted turns.
//!
//! Scripts are JSON documents:
//!
//! ```json
//! {
//!   "name": "math_agent",
//!   "description": "Adds numbers",
//!   "stream_outputs": true,
//!   "tools": [{"name": "add", "description": "Adds two integers"}],
//!   "event_delay_ms": 20,
//!   "turns": [[
//!     {"type": "delta", "fragment": "Adding"},
//!     {"type": "action", "step_number": 1,
//!      "tool_calls": [{"name": "add", "arguments": {"answer": "3"}}]},
//!     {"type": "final_answer", "output": {"kind": "text", "value": "3"}}
//!   ]]
//! }
//! ```
//!
//! A `{"type": "fail", "message": "..."}` entry makes the run's stream fail at
//! that point.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::agent::{Agent, AgentEventStream, AgentFactory, AgentProfile, RunRequest, ToolInfo};
use crate::errors::AgentError;
use crate::event::AgentEvent;

/// One scripted item of a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptEntry {
    Event(AgentEvent),
    Fail { message: String },
}

impl<'de> Deserialize<'de> for ScriptEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.get("type").and_then(Value::as_str) == Some("fail") {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("scripted failure")
                .to_string();
            return Ok(Self::Fail { message });
        }
        AgentEvent::from_value(value)
            .map(Self::Event)
            .map_err(D::Error::custom)
    }
}

impl From<AgentEvent> for ScriptEntry {
    fn from(event: AgentEvent) -> Self {
        Self::Event(event)
    }
}

fn default_cycle() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stream_outputs: bool,
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub turns: Vec<Vec<ScriptEntry>>,
    #[serde(default)]
    pub event_delay_ms: u64,
    /// Restart from the first turn once every turn was played.
    #[serde(default = "default_cycle")]
    pub cycle: bool,
}

impl Script {
    pub fn new(turns: Vec<Vec<ScriptEntry>>) -> Self {
        Self {
            name: None,
            description: None,
            stream_outputs: false,
            tools: Vec::new(),
            turns,
            event_delay_ms: 0,
            cycle: true,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AgentError> {
        serde_json::from_str(raw).map_err(|err| AgentError::Script(err.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| AgentError::Script(format!("{}: {err}", path.display())))?;
        Self::from_json_str(&raw)
    }
}

#[derive(Debug, Default)]
struct ScriptProgress {
    next_turn: usize,
    memory: Vec<String>,
}

/// Agent that plays back a [`Script`], one scripted turn per run.
///
/// As an [`AgentFactory`] it hands out fresh copies that share the script but
/// keep their own turn position and memory.
#[derive(Debug)]
pub struct ScriptedAgent {
    script: Arc<Script>,
    progress: Mutex<ScriptProgress>,
    fail_reset: bool,
}

impl ScriptedAgent {
    pub fn new(script: Script) -> Self {
        Self::from_shared(Arc::new(script), false)
    }

    fn from_shared(script: Arc<Script>, fail_reset: bool) -> Self {
        Self {
            script,
            progress: Mutex::new(ScriptProgress::default()),
            fail_reset,
        }
    }

    /// Makes every `reset_memory` call fail.
    pub fn with_failing_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    /// Tasks remembered since the last reset, oldest first.
    pub fn memory(&self) -> Vec<String> {
        self.progress().memory.clone()
    }

    fn progress(&self) -> std::sync::MutexGuard<'_, ScriptProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_turn(&self, request: &RunRequest) -> Result<Vec<ScriptEntry>, AgentError> {
        let mut progress = self.progress();
        if request.reset_memory {
            progress.memory.clear();
        }
        progress.memory.push(request.task.clone());

        let turns = &self.script.turns;
        let index = progress.next_turn;
        let turn = if index < turns.len() {
            &turns[index]
        } else if self.script.cycle && !turns.is_empty() {
            &turns[index % turns.len()]
        } else {
            return Err(AgentError::Script("script exhausted".into()));
        };
        progress.next_turn += 1;
        Ok(turn.clone())
    }
}

#[async_trait::async_trait]
impl Agent for ScriptedAgent {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: self.script.name.clone(),
            description: self.script.description.clone(),
            tools: self.script.tools.clone(),
        }
    }

    fn streams_outputs_inline(&self) -> bool {
        self.script.stream_outputs
    }

    async fn start_run(&self, request: RunRequest) -> Result<AgentEventStream, AgentError> {
        let entries = self.next_turn(&request)?;
        debug!(
            event = "scripted.run_started",
            domain = "agent",
            entries = entries.len() as u64,
            reset_memory = request.reset_memory
        );

        let delay = Duration::from_millis(self.script.event_delay_ms);
        let events = stream::iter(entries).then(move |entry| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match entry {
                ScriptEntry::Event(event) => Ok(event),
                ScriptEntry::Fail { message } => Err(AgentError::stream(message)),
            }
        });
        Ok(events.boxed())
    }

    async fn reset_memory(&self) -> Result<(), AgentError> {
        if self.fail_reset {
            return Err(AgentError::Reset("scripted memory is read-only".into()));
        }
        self.progress().memory.clear();
        Ok(())
    }
}

impl AgentFactory for ScriptedAgent {
    fn profile(&self) -> AgentProfile {
        Agent::profile(self)
    }

    fn create_agent(&self) -> Result<Arc<dyn Agent>, AgentError> {
        Ok(Arc::new(Self::from_shared(
            Arc::clone(&self.script),
            self.fail_reset,
        )))
    }
}
