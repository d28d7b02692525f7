use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::diagnostics::{self, Kind};
use crate::error::{ContactError, FieldError};
use crate::model::{FormInput, HistoryEntry, Recommendation};

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactContext {
    pub recommendation: Recommendation,
    pub form_input: FormInput,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub message: Option<String>,
    pub context: ContactContext,
}

impl ContactRequest {
    /// Request about `entry`, carrying its recommendation as context.
    pub fn for_entry(name: &str, email: &str, message: &str, entry: &HistoryEntry) -> Self {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            message: Some(message.to_string()),
            context: ContactContext {
                recommendation: entry.recommendation.clone(),
                form_input: entry.form_input.clone(),
                timestamp: entry.timestamp.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    pub received_at: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub context: ContactContext,
}

fn check_name_and_email(name: &str, email: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name ist erforderlich"));
    }
    if email.trim().is_empty() {
        errors.push(FieldError::new("email", "E-Mail ist erforderlich"));
    } else if !EMAIL.is_match(email.trim()) {
        errors.push(FieldError::new("email", "Ungültige E-Mail-Adresse"));
    }
}

/// Validate an untyped request body, listing every offending field.
pub fn validate_value(body: &Value) -> Result<ContactRequest, Vec<FieldError>> {
    let mut errors = Vec::new();
    let Some(obj) = body.as_object() else {
        return Err(vec![FieldError::new("body", "Ungültige Eingabe")]);
    };

    let name = match obj.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => {
            errors.push(FieldError::new("name", "Name ist erforderlich"));
            String::new()
        }
    };
    let email = match obj.get("email") {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            if !EMAIL.is_match(s.trim()) {
                errors.push(FieldError::new("email", "Ungültige E-Mail-Adresse"));
            }
            s.clone()
        }
        _ => {
            errors.push(FieldError::new("email", "E-Mail ist erforderlich"));
            String::new()
        }
    };
    let message = match obj.get("message") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new("message", "Nachricht muss Text sein"));
            None
        }
    };
    let context = match obj.get("context") {
        Some(v) => match serde_json::from_value::<ContactContext>(v.clone()) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                errors.push(FieldError::new("context", format!("Ungültiger Kontext: {}", e)));
                None
            }
        },
        None => {
            errors.push(FieldError::new("context", "Kontext ist erforderlich"));
            None
        }
    };

    match context {
        Some(context) if errors.is_empty() => Ok(ContactRequest {
            name,
            email,
            message,
            context,
        }),
        _ => Err(errors),
    }
}

/// Append-only collection of contact requests in one JSON file.
pub struct ContactBook {
    path: PathBuf,
}

impl ContactBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ContactBook { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse, validate and store a raw JSON body. Returns the record id.
    pub fn submit_json(&self, body: &str) -> Result<String, ContactError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|_| ContactError::Invalid(vec![FieldError::new("body", "Ungültige Eingabe")]))?;
        let request = validate_value(&value).map_err(ContactError::Invalid)?;
        self.submit(request)
    }

    pub fn submit(&self, request: ContactRequest) -> Result<String, ContactError> {
        let mut errors = Vec::new();
        check_name_and_email(&request.name, &request.email, &mut errors);
        if !errors.is_empty() {
            return Err(ContactError::Invalid(errors));
        }

        let record = ContactRecord {
            id: Uuid::new_v4().to_string(),
            received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            name: request.name,
            email: request.email.trim().to_string(),
            message: request.message.unwrap_or_default(),
            context: request.context,
        };

        let mut records = self.records();
        records.push(record.clone());
        self.write(&records)?;

        tracing::info!("stored contact request {}", record.id);
        diagnostics::log_with(Kind::Contact, format!("Kontaktanfrage {} gespeichert", record.id));
        Ok(record.id)
    }

    /// All stored records. A missing or unreadable file counts as empty.
    pub fn records(&self) -> Vec<ContactRecord> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable contact file {}: {}", self.path.display(), e);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    fn write(&self, records: &[ContactRecord]) -> Result<(), ContactError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(records)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, data)?;
        std::fs::rename(temp_path, &self.path)?;
        Ok(())
    }
}
