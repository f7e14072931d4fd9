//! Incremental terminal rendering of transcript snapshots.

use fast_agent_ui::{MessageContent, Role, TranscriptMessage, TranscriptSnapshot};

/// Prints each message once; a pending message is streamed by printing only
/// the text appended since the previous snapshot.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    committed: usize,
    partial: Option<String>,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets what was printed, e.g. after the transcript was cleared.
    pub fn reset(&mut self) {
        self.committed = 0;
        self.partial = None;
    }

    /// Returns the text to write for `snapshot` given what was already printed.
    pub fn render(&mut self, snapshot: &TranscriptSnapshot) -> String {
        if snapshot.len() < self.committed {
            self.reset();
        }

        let mut out = String::new();
        for (index, message) in snapshot.iter().enumerate().skip(self.committed) {
            let printed = self.partial.take();
            // Delta text arrives with `<`/`>` escaped; everything else is verbatim.
            let body = message_body(message, message.is_pending() || printed.is_some());
            let printed = printed.unwrap_or_default();

            if printed.is_empty() {
                out.push_str(&message_prefix(message));
                out.push_str(&body);
            } else if let Some(suffix) = body.strip_prefix(printed.as_str()) {
                out.push_str(suffix);
            } else {
                out.push('\n');
                out.push_str(&message_prefix(message));
                out.push_str(&body);
            }

            if message.is_pending() {
                self.partial = Some(body);
                break;
            }
            out.push('\n');
            self.committed = index + 1;
        }
        out
    }
}

fn message_prefix(message: &TranscriptMessage) -> String {
    match (message.role, message.title.as_deref()) {
        (Role::User, _) => "you: ".to_string(),
        (Role::Assistant, Some(title)) => format!("[{title}]\n"),
        (Role::Assistant, None) => String::new(),
    }
}

fn message_body(message: &TranscriptMessage, streamed: bool) -> String {
    match &message.content {
        MessageContent::Text(text) if streamed => text.replace("\\<", "<").replace("\\>", ">"),
        MessageContent::Text(text) => text.clone(),
        MessageContent::Media { path, mime_type } => format!("[{mime_type}] {path}"),
    }
}

/// One snapshot as a single JSON line.
pub fn json_line(snapshot: &TranscriptSnapshot) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(snapshot)?;
    line.push('\n');
    Ok(line)
}
