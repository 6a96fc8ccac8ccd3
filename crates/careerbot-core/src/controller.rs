//! Chat session state machine
//!
//! [`ChatController`] owns the conversation state and decides what should
//! happen to the realtime connection. It performs no I/O: every operation
//! returns the [`Effect`]s a runtime must carry out (see
//! [`crate::connection::ChatSession`]), and transport activity is fed back in
//! through [`ChatController::handle`].
//!
//! Each opened connection gets a new generation number. Events are tagged
//! with the generation of the socket that produced them and anything from a
//! superseded socket is dropped, so a slow close of an old connection can
//! never touch the state of the new one.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::protocol::{parse_event, ServerEvent};
use crate::question::{Progress, QuestionDescriptor, DEFAULT_TOTAL_QUESTIONS};
use crate::state::{ChatMessage, ConnectionState, MessageKind};

/// Close code of an orderly WebSocket shutdown.
pub const NORMAL_CLOSE: u16 = 1000;

/// Pause between closing the old socket and opening a new one on "new chat".
pub const NEW_CHAT_DELAY: Duration = Duration::from_millis(100);

pub const DUPLICATE_ANSWER_MESSAGE: &str =
    "This answer repeats a previous one. Please give a different answer.";
pub const FINISHED_MESSAGE: &str = "Conversation complete. Thank you for your answers!";
pub const MALFORMED_NOTICE: &str = "Received a message the client could not read";

/// Work the runtime must perform on behalf of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a connection for `generation` after `delay`.
    Open { generation: u64, delay: Duration },
    /// Send one raw text frame on the `generation` connection.
    Send { generation: u64, text: String },
    /// Close the `generation` connection with the normal close code.
    Close { generation: u64 },
}

/// What the transport observed on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// The connection ended. `code` is `None` when no close frame arrived.
    Closed { code: Option<u16> },
    Error(String),
}

/// A transport event tagged with the connection it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

impl SessionEvent {
    pub fn new(generation: u64, event: TransportEvent) -> Self {
        Self { generation, event }
    }
}

#[derive(Debug)]
pub struct ChatController {
    state: ConnectionState,
    generation: u64,
    opened: bool,
    messages: Vec<ChatMessage>,
    current_question: Option<QuestionDescriptor>,
    question_revision: u64,
    progress: Progress,
    default_total: u32,
    awaiting_response: bool,
    finished: bool,
    validation_error: Option<String>,
    connection_error: Option<String>,
    notice: Option<String>,
    // Position in `messages` a server history replay is being matched against.
    replay_cursor: Option<usize>,
}

impl Default for ChatController {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_QUESTIONS)
    }
}

impl ChatController {
    pub fn new(default_total: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            opened: false,
            messages: Vec::new(),
            current_question: None,
            question_revision: 0,
            progress: Progress::reset(default_total),
            default_total,
            awaiting_response: false,
            finished: false,
            validation_error: None,
            connection_error: None,
            notice: None,
            replay_cursor: None,
        }
    }

    // Accessors

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn current_question(&self) -> Option<&QuestionDescriptor> {
        self.current_question.as_ref()
    }

    /// Bumped every time a question event arrives, so front-ends can tell a
    /// re-sent question apart from the one they already show.
    pub fn question_revision(&self) -> u64 {
        self.question_revision
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn connection_error(&self) -> Option<&str> {
        self.connection_error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// An answer would be sent right now.
    pub fn can_send(&self) -> bool {
        self.state == ConnectionState::Connected && !self.awaiting_response
    }

    /// The reconnect action is on offer.
    pub fn can_reconnect(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Closed
        ) && self.generation > 0
    }

    // Operations

    /// Opens the first connection. A no-op while one is already live.
    pub fn connect(&mut self) -> Vec<Effect> {
        if self.state.is_live() {
            return Vec::new();
        }
        self.open(Duration::ZERO)
    }

    /// Opens a fresh connection after an abnormal or normal close, keeping the
    /// conversation so the server's history replay can be matched against it.
    pub fn reconnect(&mut self) -> Vec<Effect> {
        if self.state.is_live() {
            return Vec::new();
        }
        self.replay_cursor = (!self.messages.is_empty()).then_some(0);
        self.awaiting_response = false;
        self.open(Duration::ZERO)
    }

    /// Drops the whole conversation and starts over on a new connection.
    pub fn new_chat(&mut self) -> Vec<Effect> {
        let mut effects = self.close_live();
        self.messages.clear();
        self.current_question = None;
        self.question_revision += 1;
        self.progress = Progress::reset(self.default_total);
        self.awaiting_response = false;
        self.finished = false;
        self.validation_error = None;
        self.notice = None;
        self.replay_cursor = None;
        info!("starting a new chat");
        effects.extend(self.open(NEW_CHAT_DELAY));
        effects
    }

    /// Sends an answer if the connection is up and nothing is pending.
    /// Otherwise does nothing.
    pub fn send_answer(&mut self, text: &str) -> Vec<Effect> {
        if !self.can_send() {
            debug!(state = self.state.label(), awaiting = self.awaiting_response, "answer dropped");
            return Vec::new();
        }
        let mut message = ChatMessage::user(text);
        if let Some(question) = &self.current_question {
            message = message.for_question(question);
        }
        self.messages.push(message);
        self.replay_cursor = None;
        self.awaiting_response = true;
        self.validation_error = None;
        vec![Effect::Send {
            generation: self.generation,
            text: text.to_string(),
        }]
    }

    pub fn dismiss_validation(&mut self) {
        self.validation_error = None;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Closes the owned connection and invalidates its generation. Called on
    /// logout and on exit.
    pub fn teardown(&mut self) -> Vec<Effect> {
        let effects = self.close_live();
        self.state = ConnectionState::Disconnected;
        self.awaiting_response = false;
        // Nothing from the closed socket may land after teardown.
        self.generation += 1;
        effects
    }

    /// Applies one transport event.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        if event.generation != self.generation {
            debug!(
                stale = event.generation,
                current = self.generation,
                "ignoring event from superseded connection"
            );
            return Vec::new();
        }

        match event.event {
            TransportEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    info!(generation = self.generation, "chat connected");
                    self.state = ConnectionState::Connected;
                    self.opened = true;
                    self.connection_error = None;
                }
            }
            TransportEvent::Message(text) => {
                if self.state == ConnectionState::Connected {
                    self.on_message(&text);
                }
            }
            TransportEvent::Closed { code } => self.on_closed(code),
            TransportEvent::Error(message) => {
                warn!(generation = self.generation, error = %message, "chat transport error");
            }
        }
        Vec::new()
    }

    fn open(&mut self, delay: Duration) -> Vec<Effect> {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.opened = false;
        self.connection_error = None;
        vec![Effect::Open {
            generation: self.generation,
            delay,
        }]
    }

    fn close_live(&mut self) -> Vec<Effect> {
        if self.state.is_live() {
            vec![Effect::Close {
                generation: self.generation,
            }]
        } else {
            Vec::new()
        }
    }

    fn on_closed(&mut self, code: Option<u16>) {
        self.awaiting_response = false;
        self.replay_cursor = None;
        match code {
            Some(NORMAL_CLOSE) => {
                info!(generation = self.generation, "chat closed by server");
                self.state = ConnectionState::Closed;
            }
            _ => {
                warn!(generation = self.generation, code = ?code, "chat connection lost");
                self.state = ConnectionState::Disconnected;
                self.connection_error = Some(if self.opened {
                    match code {
                        Some(code) => format!("Connection lost (code {})", code),
                        None => "Connection lost".to_string(),
                    }
                } else {
                    "No connection to the server".to_string()
                });
            }
        }
    }

    fn on_message(&mut self, text: &str) {
        let event = match parse_event(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "unreadable chat message");
                self.notice = Some(MALFORMED_NOTICE.to_string());
                return;
            }
        };

        match event {
            ServerEvent::History { kind, content } => {
                if self.matches_replay(kind, &content) {
                    return;
                }
                self.messages.push(ChatMessage::new(kind, content));
            }
            ServerEvent::Question(question) => {
                if let Some(progress) = question.progress {
                    self.progress = self.progress.advance(progress);
                }
                let replayed = self.matches_replay(MessageKind::Bot, &question.prompt);
                if !replayed {
                    self.messages
                        .push(ChatMessage::bot(question.prompt.clone()).for_question(&question));
                }
                self.current_question = Some(question);
                self.question_revision += 1;
                self.awaiting_response = false;
                self.validation_error = None;
                self.finished = false;
            }
            ServerEvent::Duplicate => {
                self.replay_cursor = None;
                self.messages.push(ChatMessage::error(DUPLICATE_ANSWER_MESSAGE));
                self.awaiting_response = false;
            }
            ServerEvent::Rejected { code, message } => {
                self.replay_cursor = None;
                debug!(code = ?code, "answer rejected");
                self.validation_error = Some(message);
                self.awaiting_response = false;
            }
            ServerEvent::Finished => {
                self.replay_cursor = None;
                self.messages.push(ChatMessage::system(FINISHED_MESSAGE));
                self.current_question = None;
                self.question_revision += 1;
                self.awaiting_response = false;
                self.finished = true;
            }
        }
    }

    /// During a replay window, consumes an event that repeats the message
    /// already held at the replay position. The first mismatch ends the window.
    fn matches_replay(&mut self, kind: MessageKind, content: &str) -> bool {
        let Some(cursor) = self.replay_cursor else {
            return false;
        };
        match self.messages.get(cursor) {
            Some(held) if held.kind == kind && held.content == content => {
                self.replay_cursor = Some(cursor + 1);
                debug!(position = cursor, "skipping replayed message");
                true
            }
            _ => {
                self.replay_cursor = None;
                false
            }
        }
    }
}
