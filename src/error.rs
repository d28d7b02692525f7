use serde::Serialize;
use thiserror::Error;

/// One invalid form or request field, with a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no model response found")]
    NoResponseFound,

    #[error("could not decode agent response: {0}")]
    DecodeFailed(String),
}

/// Everything that can end a submission before it reaches the result view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("a submission is already in flight")]
    Busy,

    #[error("invalid input ({} field(s))", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("session could not be created: {0}")]
    Session(String),

    #[error("server error: {status} {body}")]
    Server { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("no response from agent")]
    NoResponse,

    #[error("undecodable agent response: {0}")]
    Decode(String),
}

impl FlowError {
    /// The single message shown in the form's error box.
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Busy => "Eine Anfrage läuft bereits.".to_string(),
            FlowError::Invalid(fields) => fields
                .iter()
                .map(|f| format!("{}: {}", f.field, f.message))
                .collect::<Vec<_>>()
                .join("\n"),
            FlowError::Session(_) => "Session konnte nicht erstellt werden.".to_string(),
            FlowError::Server { status, body } => {
                format!("Fehler vom Server: {} {}", status, body)
            }
            FlowError::Network(e) => format!("Netzwerkfehler: {}", e),
            FlowError::NoResponse => "Keine Antwort vom Agenten erhalten.".to_string(),
            FlowError::Decode(_) => {
                "Die Antwort des Agenten konnte nicht verarbeitet werden. Bitte versuche es erneut."
                    .to_string()
            }
        }
    }
}

impl From<ParseError> for FlowError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NoResponseFound => FlowError::NoResponse,
            ParseError::DecodeFailed(e) => FlowError::Decode(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum ContactError {
    #[error("invalid contact request ({} field(s))", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("contact storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("contact storage is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}
