use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::diagnostics::{self, Kind};
use crate::model::{FormInput, HistoryEntry, JudgeEvaluation, Recommendation};
use crate::storage::KeyValueStore;

pub const STORAGE_KEY: &str = "agent4agents_history";
pub const MAX_HISTORY: usize = 10;

/// Receives persistence failures the store swallows.
pub type PersistenceSink = Box<dyn Fn(&anyhow::Error) + Send>;

fn default_sink() -> PersistenceSink {
    Box::new(|err| {
        tracing::warn!("history not persisted: {:#}", err);
        diagnostics::log_with(Kind::Persistence, format!("History nicht gespeichert: {}", err));
    })
}

/// Bounded, newest-first list of past recommendations.
///
/// Every mutation rewrites the whole list under [`STORAGE_KEY`]. Write
/// failures go to the persistence sink and never reach the caller; the
/// in-memory list stays authoritative until the next successful write.
pub struct HistoryStore {
    medium: Box<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
    sink: PersistenceSink,
}

impl HistoryStore {
    pub fn new(medium: Box<dyn KeyValueStore>) -> Self {
        HistoryStore {
            medium,
            entries: Vec::new(),
            sink: default_sink(),
        }
    }

    /// Construct and load in one step.
    pub fn open(medium: Box<dyn KeyValueStore>) -> Self {
        let mut store = Self::new(medium);
        store.initialize();
        store
    }

    pub fn on_persist_failure(mut self, sink: impl Fn(&anyhow::Error) + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Load the persisted list. Unreadable or malformed data yields an empty list.
    pub fn initialize(&mut self) {
        self.entries = match self.medium.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(MAX_HISTORY);
                    entries
                }
                Err(e) => {
                    tracing::warn!("discarding unreadable history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("history medium unavailable: {:#}", e);
                Vec::new()
            }
        };
        tracing::debug!("history loaded with {} entries", self.entries.len());
    }

    pub fn add(
        &mut self,
        form_input: FormInput,
        recommendation: Recommendation,
        judge_evaluation: Option<JudgeEvaluation>,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            id: self.fresh_id(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            form_input,
            recommendation,
            judge_evaluation,
        };
        self.entries.insert(0, entry.clone());
        self.entries.truncate(MAX_HISTORY);
        self.persist();
        entry
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|e| e.id != id);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.medium.set(STORAGE_KEY, &json));
        if let Err(e) = result {
            (self.sink)(&e);
        }
    }
}
