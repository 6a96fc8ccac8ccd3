//! UI-agnostic application state types
//!
//! This module contains data structures that are shared between different UIs
//! and don't depend on any specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::question::{QuestionDescriptor, QuestionType};

/// A single entry in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub question_id: Option<String>,
    pub question_type: Option<QuestionType>,
    pub module: Option<String>,
    pub module_title: Option<String>,
}

/// Who (or what) produced a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Bot,
    System,
    Error,
}

impl MessageKind {
    /// Maps a server `role` field onto a message kind.
    pub fn from_role(role: &str) -> Option<Self> {
        match role {
            "user" => Some(MessageKind::User),
            "bot" | "assistant" => Some(MessageKind::Bot),
            "system" => Some(MessageKind::System),
            _ => None,
        }
    }
}

impl ChatMessage {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            question_id: None,
            question_type: None,
            module: None,
            module_title: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Bot, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, content)
    }

    /// Tags the message with the metadata of the question it belongs to.
    pub fn for_question(mut self, question: &QuestionDescriptor) -> Self {
        self.question_id = question.id.clone();
        self.question_type = question.kind;
        self.module = question.module.clone();
        self.module_title = question.module_title.clone();
        self
    }
}

/// Lifecycle of the realtime connection owned by a chat controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Closed by the server with the normal close code.
    Closed,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }

    /// True while a socket is (or is about to be) open.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}
