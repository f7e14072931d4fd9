//! Common imports for driving an agent from a chat front end.
pub use crate::{
    Agent, AgentError, AgentEvent, AgentEventStream, AgentFactory, AgentProfile, ChatInterface,
    InterfaceError, MessageContent, MessageStatus, Role, RunRequest, SessionState, StepEvent,
    ToolInfo, TranscriptMessage, TranscriptSnapshot, TurnStream, UploadStatus, UploadedFile,
};
