//! User-visible conversation transcript.
//!
//! The transcript is an append-only log with an explicit pending index. Only the
//! pending entry, which is always the last one, can change after it was
//! appended. All mutation goes through [`Transcript`] so the at-most-one-pending
//! invariant cannot be broken by callers.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle flag: `Pending` messages are still streaming and may change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Done,
}

/// Message body: markdown text or a media file reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Media { path: String, mime_type: String },
}

impl MessageContent {
    /// Returns the text body, or `None` for media content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Media { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: MessageContent,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TranscriptMessage {
    /// Creates a finished user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
            status: MessageStatus::Done,
            title: None,
        }
    }

    /// Creates a finished assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
            status: MessageStatus::Done,
            title: None,
        }
    }

    /// Creates a finished assistant media message.
    pub fn media(path: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Media {
                path: path.into(),
                mime_type: mime_type.into(),
            },
            status: MessageStatus::Done,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == MessageStatus::Pending
    }

    /// Returns the text body, or `None` for media content.
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }
}

/// Read-only copy of the transcript handed to renderers after each mutation.
pub type TranscriptSnapshot = Vec<TranscriptMessage>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
    pending: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }

    /// Index of the message currently streaming, if any.
    pub fn pending_index(&self) -> Option<usize> {
        self.pending
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.messages.clone()
    }

    /// Finalizes the pending message (if any) and appends `message` as done.
    pub fn push_done(&mut self, mut message: TranscriptMessage) {
        self.finish_pending();
        message.status = MessageStatus::Done;
        self.messages.push(message);
    }

    /// Replaces the pending assistant message's text, or appends a new pending
    /// assistant message when nothing is streaming.
    pub fn stream_pending(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.pending.and_then(|index| self.messages.get_mut(index)) {
            Some(message) => message.content = MessageContent::Text(text),
            None => {
                self.messages.push(TranscriptMessage {
                    role: Role::Assistant,
                    content: MessageContent::Text(text),
                    status: MessageStatus::Pending,
                    title: None,
                });
                self.pending = Some(self.messages.len() - 1);
            }
        }
    }

    /// Flips the pending message to done. Returns whether one was pending.
    pub fn finish_pending(&mut self) -> bool {
        let Some(index) = self.pending.take() else {
            return false;
        };
        if let Some(message) = self.messages.get_mut(index) {
            message.status = MessageStatus::Done;
        }
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.pending = None;
    }
}
