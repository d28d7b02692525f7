//! Framework recommendations for agentic AI use cases.
//!
//! A use case is sent to an agent runtime, the recommendation (and an optional
//! judge review) is parsed from the returned events and kept in a small
//! persisted history that can be copied or exported as markdown.

pub mod agent;
pub mod config;
pub mod contact;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod flow;
pub mod history;
pub mod model;
pub mod parser;
pub mod storage;

pub use agent::{AgentBackend, AgentClient};
pub use error::{ContactError, FieldError, FlowError, ParseError};
pub use flow::{AgentReply, Answer, Flow, Phase, Submission};
pub use history::{HistoryStore, MAX_HISTORY, STORAGE_KEY};
pub use model::{FormInput, HistoryEntry, JudgeEvaluation, Recommendation};
