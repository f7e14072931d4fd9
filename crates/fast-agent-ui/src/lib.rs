//! Streaming pipeline that turns a stepwise agent's events into a chat
//! transcript.
//!
//! An [`Agent`] emits step events interleaved with text deltas. A turn
//! classifies each step into transcript messages, aggregates deltas into one
//! pending message, and yields a [`TranscriptSnapshot`] after every change.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fast_agent_ui::prelude::*;
//! use fast_agent_ui::{Script, ScriptedAgent};
//! use futures::StreamExt as _;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), InterfaceError> {
//! let script = Script::from_path("agent.json".as_ref())?;
//! let interface = ChatInterface::builder(Arc::new(ScriptedAgent::new(script)))
//!     .upload_folder("uploads")
//!     .build()?;
//!
//! let mut session = interface.open_session()?;
//! if let Some(mut turn) = interface.submit(&mut session, "What is 1 + 2?") {
//!     while let Some(snapshot) = turn.next().await {
//!         println!("{} messages", snapshot.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Agent and agent template contracts.
pub mod agent;
/// Step classification into transcript messages.
pub mod classify;
/// Text delta aggregation.
pub mod delta;
/// Public error types.
pub mod errors;
/// Step events and text deltas produced by agents.
pub mod event;
/// Chat interface facade and its builder.
pub mod interface;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Scripted agent for demos and tests.
pub mod scripted;
/// Session state, turn controller, and reset.
pub mod session;
/// Transcript messages and the pending-message invariant.
pub mod transcript;
/// Upload validation and storage.
pub mod upload;

pub use agent::{Agent, AgentEventStream, AgentFactory, AgentProfile, RunRequest, ToolInfo};
pub use classify::{classify, clean_model_output, format_code_content, step_footnote};
pub use delta::{DeltaBuffer, accumulate, render_deltas};
pub use errors::{AgentError, ClassifyError, InterfaceError};
pub use event::{
    ActionStep, AgentEvent, FinalAnswerStep, PlanningStep, StepEvent, TextDelta, TokenUsage,
    ToolCall, TypedAnswer,
};
pub use interface::{ChatInterface, InterfaceBuilder, compose_prompt};
pub use observability::{LogSettings, LogSink, init_observability};
pub use scripted::{Script, ScriptEntry, ScriptedAgent};
pub use session::{SessionState, TurnStream, escape_angle_brackets, reset_conversation, run_turn};
pub use transcript::{
    MessageContent, MessageStatus, Role, Transcript, TranscriptMessage, TranscriptSnapshot,
};
pub use upload::{UploadHandler, UploadLogEntry, UploadStatus, UploadedFile};
