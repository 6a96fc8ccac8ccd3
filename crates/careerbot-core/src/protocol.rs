//! Server events on the chat WebSocket
//!
//! The server sends loosely-shaped JSON objects; [`parse_event`] classifies
//! them in a fixed order: `error`, then `event`, then `prompt`, then
//! `role`/`content`. Outbound answers are plain text frames and need no
//! encoding here.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::question::QuestionDescriptor;
use crate::state::MessageKind;

/// A classified inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A previously exchanged message, replayed after (re)connecting.
    History { kind: MessageKind, content: String },
    /// The next question to answer.
    Question(QuestionDescriptor),
    /// The last answer repeats an earlier one.
    Duplicate,
    /// The last answer was rejected by server-side validation.
    Rejected { code: Option<String>, message: String },
    /// The questionnaire is complete.
    Finished,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error("unrecognized message shape")]
    UnrecognizedShape,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

const DUPLICATE_CODES: [&str; 2] = ["duplicate", "duplicate_answer"];

pub fn parse_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(obj) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    if let Some(error) = obj.get("error") {
        return Ok(classify_error(error));
    }

    if let Some(event) = obj.get("event") {
        return match event.as_str() {
            Some("finished") => Ok(ServerEvent::Finished),
            Some(other) => Err(ProtocolError::UnknownEvent(other.to_string())),
            None => Err(ProtocolError::UnknownEvent(event.to_string())),
        };
    }

    if obj.contains_key("prompt") {
        let question: QuestionDescriptor = serde_json::from_value(Value::Object(obj))?;
        return Ok(ServerEvent::Question(question));
    }

    parse_history(&obj)
}

fn classify_error(error: &Value) -> ServerEvent {
    match error {
        Value::String(s) if DUPLICATE_CODES.contains(&s.as_str()) => ServerEvent::Duplicate,
        Value::String(s) => ServerEvent::Rejected {
            code: None,
            message: s.clone(),
        },
        Value::Object(_) => {
            let body: ErrorBody = serde_json::from_value(error.clone()).unwrap_or(ErrorBody {
                code: None,
                message: None,
            });
            let code = body.code.map(|c| match c {
                Value::String(s) => s,
                other => other.to_string(),
            });
            if code
                .as_deref()
                .is_some_and(|c| DUPLICATE_CODES.contains(&c))
            {
                return ServerEvent::Duplicate;
            }
            let message = body
                .message
                .filter(|m| !m.trim().is_empty())
                .or_else(|| code.clone())
                .unwrap_or_else(|| "The answer was not accepted".to_string());
            ServerEvent::Rejected { code, message }
        }
        other => ServerEvent::Rejected {
            code: None,
            message: other.to_string(),
        },
    }
}

fn parse_history(obj: &Map<String, Value>) -> Result<ServerEvent, ProtocolError> {
    let (Some(role), Some(content)) = (
        obj.get("role").and_then(Value::as_str),
        obj.get("content").and_then(Value::as_str),
    ) else {
        return Err(ProtocolError::UnrecognizedShape);
    };
    let kind = MessageKind::from_role(role)
        .ok_or_else(|| ProtocolError::UnknownRole(role.to_string()))?;
    Ok(ServerEvent::History {
        kind,
        content: content.to_string(),
    })
}
