use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Info,
    Http,
    Parse,
    Persistence,
    Contact,
}

impl Kind {
    /// Something the user lost: a dropped judge review or an unsaved history.
    pub fn is_warning(self) -> bool {
        matches!(self, Kind::Parse | Kind::Persistence)
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub at: DateTime<Utc>,
    pub kind: Kind,
    pub text: String,
}

impl Entry {
    pub fn is_warning(&self) -> bool {
        self.kind.is_warning()
    }

    /// Footer rendition, e.g. `14:03:22 History nicht gespeichert: ...`.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.at.format("%H:%M:%S"), self.text)
    }
}

static JOURNAL: Lazy<Mutex<VecDeque<Entry>>> = Lazy::new(|| Mutex::new(VecDeque::with_capacity(CAPACITY)));

pub fn log<T: Into<String>>(line: T) {
    log_with(Kind::Info, line);
}

pub fn log_with<T: Into<String>>(kind: Kind, line: T) {
    let entry = Entry {
        at: Utc::now(),
        kind,
        text: line.into(),
    };
    tracing::debug!(target: "diagnostics", kind = ?entry.kind, "{}", entry.text);
    if let Ok(mut journal) = JOURNAL.lock() {
        if journal.len() >= CAPACITY {
            journal.pop_front();
        }
        journal.push_back(entry);
    }
}

pub fn recent(n: usize) -> Vec<Entry> {
    match JOURNAL.lock() {
        Ok(journal) => {
            let skip = journal.len().saturating_sub(n);
            journal.iter().skip(skip).cloned().collect()
        }
        Err(_) => Vec::new(),
    }
}

/// Line for the status footer: the newest warning among the last `window`
/// entries, else the newest entry.
pub fn headline(window: usize) -> Option<Entry> {
    let entries = recent(window);
    entries
        .iter()
        .rev()
        .find(|e| e.is_warning())
        .or_else(|| entries.last())
        .cloned()
}
