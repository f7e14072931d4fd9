use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::agent::{AgentFactory, ToolInfo};
use crate::errors::InterfaceError;
use crate::session::{SessionState, TurnStream, reset_conversation, run_turn};
use crate::upload::{
    DEFAULT_ALLOWED_FILE_TYPES, UploadHandler, UploadLogEntry, UploadStatus, UploadedFile,
};

pub const DEFAULT_TITLE: &str = "Agent interface";
pub const DEFAULT_DESCRIPTION: &str = "AI Assistant with tools and multi-step reasoning";

struct InterfaceInner {
    template: Arc<dyn AgentFactory>,
    name: Option<String>,
    description: Option<String>,
    tools: Option<Vec<ToolInfo>>,
    uploads: Option<UploadHandler>,
    reset_agent_memory: bool,
}

/// Chat front end over an agent template.
///
/// Cheap to clone. Every [`SessionState`] it opens owns an agent created from
/// the template, so sessions never share memory.
#[derive(Clone)]
pub struct ChatInterface {
    inner: Arc<InterfaceInner>,
}

impl ChatInterface {
    pub fn builder(template: Arc<dyn AgentFactory>) -> InterfaceBuilder {
        InterfaceBuilder {
            template,
            name: None,
            description: None,
            tools: None,
            upload_folder: None,
            allowed_file_types: None,
            reset_agent_memory: false,
        }
    }

    /// Display title: the configured or agent name with `_` read as spaces,
    /// capitalized.
    pub fn title(&self) -> String {
        let name = non_blank(self.inner.name.clone())
            .or_else(|| non_blank(self.inner.template.profile().name))
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        capitalize(&name.replace('_', " "))
    }

    pub fn description(&self) -> String {
        non_blank(self.inner.description.clone())
            .or_else(|| non_blank(self.inner.template.profile().description))
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string())
    }

    pub fn tools(&self) -> Vec<ToolInfo> {
        match &self.inner.tools {
            Some(tools) if !tools.is_empty() => tools.clone(),
            _ => self.inner.template.profile().tools,
        }
    }

    pub fn uploads_enabled(&self) -> bool {
        self.inner.uploads.is_some()
    }

    pub fn upload_folder(&self) -> Option<&std::path::Path> {
        self.inner.uploads.as_ref().map(UploadHandler::folder)
    }

    /// Accepted upload extensions; empty when uploads are disabled.
    pub fn allowed_file_types(&self) -> &[String] {
        self.inner.uploads.as_ref().map_or(&[][..], UploadHandler::allowed)
    }

    /// Opens a session with its own agent from the template.
    pub fn open_session(&self) -> Result<SessionState, InterfaceError> {
        let agent = self.inner.template.create_agent()?;
        let session = SessionState::new(agent, self.inner.reset_agent_memory);
        info!(
            event = "session.opened",
            domain = "interface",
            session_id = %session.id()
        );
        Ok(session)
    }

    /// Starts a turn for `text`, or returns `None` when the text is blank.
    pub fn submit<'a>(&self, session: &'a mut SessionState, text: &str) -> Option<TurnStream<'a>> {
        let prompt = compose_prompt(text, session.upload_log())?;
        Some(run_turn(session, prompt))
    }

    pub fn upload(&self, session: &mut SessionState, file: Option<&UploadedFile>) -> UploadStatus {
        match &self.inner.uploads {
            Some(handler) => handler.upload(file, session.upload_log_mut()),
            None => UploadStatus::Disabled,
        }
    }

    pub async fn reset(&self, session: &mut SessionState) {
        reset_conversation(session).await;
    }
}

/// Builds the prompt sent to the agent: `None` for blank text, otherwise the
/// text followed by the list of uploaded files when there are any.
pub fn compose_prompt(text: &str, log: &[UploadLogEntry]) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let mut prompt = text.to_string();
    if !log.is_empty() {
        let paths: Vec<String> = log
            .iter()
            .map(|entry| format!("'{}'", entry.sanitized_path.display()))
            .collect();
        prompt.push_str(&format!(
            "\n\nYou have been provided with these files, which might be helpful: [{}]",
            paths.join(", ")
        ));
    }
    Some(prompt)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Builder for [`ChatInterface`].
pub struct InterfaceBuilder {
    template: Arc<dyn AgentFactory>,
    name: Option<String>,
    description: Option<String>,
    tools: Option<Vec<ToolInfo>>,
    upload_folder: Option<PathBuf>,
    allowed_file_types: Option<Vec<String>>,
    reset_agent_memory: bool,
}

impl InterfaceBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the tool catalog reported by the agent.
    pub fn tools(mut self, tools: Vec<ToolInfo>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Enables uploads into `folder`, which is created on build.
    pub fn upload_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.upload_folder = Some(folder.into());
        self
    }

    pub fn allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_file_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Ask the agent to forget earlier turns at the start of every run.
    pub fn reset_agent_memory(mut self, reset: bool) -> Self {
        self.reset_agent_memory = reset;
        self
    }

    /// Validates upload settings and creates the upload folder if needed.
    pub fn build(self) -> Result<ChatInterface, InterfaceError> {
        let allowed = self
            .allowed_file_types
            .unwrap_or_else(|| DEFAULT_ALLOWED_FILE_TYPES.map(String::from).to_vec());
        if allowed.is_empty() {
            return Err(InterfaceError::Config(
                "allowed_file_types must not be empty".into(),
            ));
        }
        if let Some(bad) = allowed.iter().find(|ext| !ext.starts_with('.') || ext.len() < 2) {
            return Err(InterfaceError::Config(format!(
                "file type must look like `.ext`: {bad}"
            )));
        }

        let uploads = match self.upload_folder {
            Some(folder) => {
                std::fs::create_dir_all(&folder).map_err(|source| InterfaceError::Io {
                    path: folder.display().to_string(),
                    source,
                })?;
                Some(UploadHandler::new(folder, allowed))
            }
            None => None,
        };

        Ok(ChatInterface {
            inner: Arc::new(InterfaceInner {
                template: self.template,
                name: self.name,
                description: self.description,
                tools: self.tools,
                uploads,
                reset_agent_memory: self.reset_agent_memory,
            }),
        })
    }
}
