use uuid::Uuid;

use crate::agent::AgentBackend;
use crate::config::AgentConfig;
use crate::diagnostics::{self, Kind};
use crate::error::FlowError;
use crate::history::HistoryStore;
use crate::model::{FormInput, HistoryEntry, JudgeEvaluation, Recommendation};
use crate::parser::{self, AgentEvent, SlotMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Answer {
    Recommendation,
    Judge,
}

/// Author routing for the recommendation and judge agents.
pub fn answer_slots(config: &AgentConfig) -> SlotMap<Answer> {
    SlotMap::new()
        .route(config.recommendation_author.clone(), Answer::Recommendation)
        .route(config.judge_author.clone(), Answer::Judge)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub recommendation: Recommendation,
    pub judge: Option<JudgeEvaluation>,
}

/// Turn the event list of a run into a reply. The recommendation is
/// required; an undecodable judge answer is noted and dropped.
pub fn interpret(events: &[AgentEvent], slots: &SlotMap<Answer>) -> Result<AgentReply, FlowError> {
    let answers = parser::extract_answers(events, slots);
    let recommendation: Recommendation = parser::require(&answers, Answer::Recommendation)?;

    let judge = match parser::optional::<JudgeEvaluation, _>(&answers, Answer::Judge) {
        Ok(judge) => judge,
        Err(e) => {
            tracing::warn!("judge evaluation dropped: {}", e);
            diagnostics::log_with(Kind::Parse, format!("Judge-Bewertung verworfen: {}", e));
            None
        }
    };

    Ok(AgentReply {
        recommendation,
        judge,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub session_id: String,
    pub input: FormInput,
}

/// Create the session, run the agent, interpret the events.
pub async fn execute(
    backend: &dyn AgentBackend,
    submission: &Submission,
    slots: &SlotMap<Answer>,
) -> Result<AgentReply, FlowError> {
    backend.create_session(&submission.session_id).await?;
    let events = backend
        .run(&submission.session_id, &submission.input.to_agent_input())
        .await?;
    tracing::debug!("run returned {} events", events.len());
    interpret(&events, slots)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Form,
    Loading { session_id: String, input: FormInput },
    Result,
}

pub struct Flow {
    phase: Phase,
    form: FormInput,
    error: Option<String>,
    active: Option<HistoryEntry>,
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}

impl Flow {
    pub fn new() -> Self {
        Flow {
            phase: Phase::Form,
            form: FormInput::default(),
            error: None,
            active: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    pub fn form(&self) -> &FormInput {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormInput {
        &mut self.form
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn active_entry(&self) -> Option<&HistoryEntry> {
        self.active.as_ref()
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.active.as_ref().map(|e| &e.recommendation)
    }

    pub fn judge_evaluation(&self) -> Option<&JudgeEvaluation> {
        self.active.as_ref().and_then(|e| e.judge_evaluation.as_ref())
    }

    /// Validate `input` and enter `Loading` under a fresh session id.
    pub fn begin(&mut self, input: FormInput) -> Result<Submission, FlowError> {
        if self.is_loading() {
            return Err(FlowError::Busy);
        }
        self.form = input;
        if let Err(fields) = self.form.validate() {
            let err = FlowError::Invalid(fields);
            self.error = Some(err.user_message());
            return Err(err);
        }

        let session_id = Uuid::new_v4().to_string();
        self.error = None;
        self.active = None;
        self.phase = Phase::Loading {
            session_id: session_id.clone(),
            input: self.form.clone(),
        };
        tracing::info!("submitting use case under session {}", session_id);

        Ok(Submission {
            session_id,
            input: self.form.clone(),
        })
    }

    /// Apply the outcome of a submission. Returns false when the outcome
    /// belongs to a session that is no longer current.
    pub fn finish(
        &mut self,
        session_id: &str,
        outcome: Result<AgentReply, FlowError>,
        history: &mut HistoryStore,
    ) -> bool {
        let submitted = match &self.phase {
            Phase::Loading { session_id: current, input } if current == session_id => input.clone(),
            _ => {
                tracing::debug!("ignoring outcome of stale session {}", session_id);
                return false;
            }
        };

        match outcome {
            Ok(reply) => {
                let entry = history.add(submitted, reply.recommendation, reply.judge);
                tracing::info!(
                    "recommendation {} stored as {}",
                    entry.recommendation.framework,
                    entry.id
                );
                diagnostics::log(format!("Empfehlung {} gespeichert", entry.recommendation.framework));
                self.active = Some(entry);
                self.phase = Phase::Result;
            }
            Err(e) => {
                tracing::warn!("submission failed: {}", e);
                self.form = submitted;
                self.error = Some(e.user_message());
                self.phase = Phase::Form;
            }
        }
        true
    }

    /// Run a whole submission in place.
    pub async fn submit(
        &mut self,
        backend: &dyn AgentBackend,
        history: &mut HistoryStore,
        slots: &SlotMap<Answer>,
        input: FormInput,
    ) -> Result<HistoryEntry, FlowError> {
        let submission = self.begin(input)?;
        let outcome = execute(backend, &submission, slots).await;
        let failure = outcome.as_ref().err().cloned();
        self.finish(&submission.session_id, outcome, history);
        match (failure, &self.active) {
            (Some(e), _) => Err(e),
            (None, Some(entry)) => Ok(entry.clone()),
            (None, None) => Err(FlowError::NoResponse),
        }
    }

    /// Show a past entry. The store is left untouched.
    pub fn select(&mut self, entry: &HistoryEntry) -> bool {
        if self.is_loading() {
            return false;
        }
        self.active = Some(entry.clone());
        self.error = None;
        self.phase = Phase::Result;
        true
    }

    /// Start a new analysis: everything back to defaults.
    pub fn reset(&mut self) {
        self.phase = Phase::Form;
        self.form = FormInput::default();
        self.error = None;
        self.active = None;
    }
}
