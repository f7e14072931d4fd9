use fast_agent_ui::{ChatInterface, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Upload(Option<String>),
    Files,
    Tools,
    Clear,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
Commands:
  /help           show this help
  /upload <path>  upload a file for the agent to use
  /files          list uploaded files
  /tools          list the agent's tools
  /clear          reset the conversation and agent memory
  /quit           exit
Anything else is sent to the agent.";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/upload" => SlashCommand::Upload((!rest.is_empty()).then(|| rest.to_string())),
        "/files" => SlashCommand::Files,
        "/tools" => SlashCommand::Tools,
        "/clear" | "/reset" => SlashCommand::Clear,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

/// Reply to `/files`: the upload log, or why it is empty.
pub fn files_report(interface: &ChatInterface, session: &SessionState) -> String {
    if !interface.uploads_enabled() {
        return "File uploads are disabled (start with --upload-folder).".to_string();
    }
    let accepted = format!("Accepted types: {}", interface.allowed_file_types().join(", "));
    if session.upload_log().is_empty() {
        return format!("No files uploaded.\n{accepted}");
    }
    session
        .upload_log()
        .iter()
        .map(|entry| format!("{} -> {}", entry.original_name, entry.sanitized_path.display()))
        .chain(std::iter::once(accepted))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reply to `/tools`.
pub fn tools_report(interface: &ChatInterface) -> String {
    let tools = interface.tools();
    if tools.is_empty() {
        return "No tools available.".to_string();
    }
    tools
        .iter()
        .map(|tool| format!("{}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n")
}
