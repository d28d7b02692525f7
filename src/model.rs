use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FieldError;

const REQUIRED: &str = "Dieses Feld ist erforderlich";

/// Framework suggestion produced by the primary agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub framework: String,
    pub ease_of_use: String,
    pub summary: String,
    pub reasoning: String,
    pub ki_notwendig: bool,
    #[serde(default)]
    pub alternative_ohne_ki: Option<String>,
}

impl Recommendation {
    /// The no-AI alternative, only when AI is deemed unnecessary and one was given.
    pub fn alternative(&self) -> Option<&str> {
        if self.ki_notwendig {
            return None;
        }
        self.alternative_ohne_ki
            .as_deref()
            .filter(|alt| !alt.trim().is_empty())
    }
}

/// Quality review of a recommendation produced by the judge agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEvaluation {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    #[serde(default)]
    pub framework_fit: String,
    #[serde(default)]
    pub ease_of_use_realistic: bool,
}

impl JudgeEvaluation {
    /// `8/10`, or `7.5/10` for fractional scores.
    pub fn score_label(&self) -> String {
        if self.score.fract() == 0.0 {
            format!("{}/10", self.score as i64)
        } else {
            format!("{}/10", self.score)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormInput {
    pub use_case_description: String,
    pub preferred_model_ecosystem: String,
    pub interaction_channel: String,
    pub integration_targets: String,
}

impl Default for FormInput {
    fn default() -> Self {
        FormInput {
            use_case_description: String::new(),
            preferred_model_ecosystem: "keine".to_string(),
            interaction_channel: String::new(),
            integration_targets: String::new(),
        }
    }
}

impl FormInput {
    /// Required-field check. Returns every offending field at once.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.use_case_description.trim().is_empty() {
            errors.push(FieldError::new("useCaseDescription", REQUIRED));
        }
        if self.preferred_model_ecosystem.trim().is_empty() {
            errors.push(FieldError::new("preferredModelEcosystem", REQUIRED));
        }
        if self.interaction_channel.trim().is_empty() {
            errors.push(FieldError::new("interactionChannel", REQUIRED));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_agent_input(&self) -> AgentInput {
        AgentInput {
            use_case_description: self.use_case_description.clone(),
            preferred_model_ecosystem: self.preferred_model_ecosystem.clone(),
            interaction_channel: self.interaction_channel.clone(),
            integration_targets: self.integration_targets.clone(),
        }
    }
}

/// Structured input as the agent expects it inside the user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInput {
    pub use_case_description: String,
    pub preferred_model_ecosystem: String,
    pub interaction_channel: String,
    pub integration_targets: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: String,
    pub form_input: FormInput,
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_evaluation: Option<JudgeEvaluation>,
}

/// One option of a fixed select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

pub const MODEL_ECOSYSTEMS: &[Choice] = &[
    Choice { value: "openai", label: "OpenAI GPT" },
    Choice { value: "google", label: "Google Gemini" },
    Choice { value: "anthropic", label: "Anthropic Claude" },
    Choice { value: "keine", label: "Keine Präferenz" },
    Choice { value: "andere", label: "Ein anderes (bitte in Integration Targets angeben)" },
];

pub const INTERACTION_CHANNELS: &[Choice] = &[
    Choice { value: "chatbot", label: "Chatbot / Konversation" },
    Choice { value: "background", label: "Hintergrundprozess / Automatisierung" },
    Choice { value: "api", label: "API / Service" },
    Choice { value: "dashboard", label: "Dashboard / UI" },
    Choice { value: "andere", label: "Anderer Kanal" },
];

pub fn find_choice(choices: &'static [Choice], value: &str) -> Option<Choice> {
    choices.iter().copied().find(|c| c.value == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_form_prefers_no_ecosystem() {
        let form = FormInput::default();
        assert_eq!(form.preferred_model_ecosystem, "keine");
        assert!(form.use_case_description.is_empty());
    }

    #[test]
    fn test_validate_reports_all_missing_fields() {
        let form = FormInput {
            use_case_description: "   ".to_string(),
            preferred_model_ecosystem: "keine".to_string(),
            interaction_channel: String::new(),
            integration_targets: String::new(),
        };
        let errors = form.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["useCaseDescription", "interactionChannel"]);
    }

    #[test]
    fn test_integration_targets_are_optional() {
        let form = FormInput {
            use_case_description: "Tickets klassifizieren".to_string(),
            preferred_model_ecosystem: "openai".to_string(),
            interaction_channel: "api".to_string(),
            integration_targets: String::new(),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_recommendation_without_alternative_key() {
        let json = r#"{"framework":"N8N","ease_of_use":"High","summary":"S","reasoning":"R","ki_notwendig":false}"#;
        let rec: Recommendation = serde_json::from_str(json).unwrap();
        assert_eq!(rec.alternative_ohne_ki, None);
        assert_eq!(rec.alternative(), None);
    }

    #[test]
    fn test_alternative_hidden_when_ai_needed() {
        let rec = Recommendation {
            framework: "CrewAI".into(),
            ease_of_use: "Medium".into(),
            summary: "S".into(),
            reasoning: "R".into(),
            ki_notwendig: true,
            alternative_ohne_ki: Some("Skript".into()),
        };
        assert_eq!(rec.alternative(), None);
    }

    #[test]
    fn test_score_label() {
        let mut judge = JudgeEvaluation {
            score: 8.0,
            strengths: vec![],
            weaknesses: vec![],
            improvement_suggestions: vec![],
            framework_fit: String::new(),
            ease_of_use_realistic: true,
        };
        assert_eq!(judge.score_label(), "8/10");
        judge.score = 7.5;
        assert_eq!(judge.score_label(), "7.5/10");
    }

    #[test]
    fn test_history_entry_uses_camel_case_keys() {
        let entry = HistoryEntry {
            id: "1".into(),
            timestamp: "2026-01-02T03:04:05.000Z".into(),
            form_input: FormInput::default(),
            recommendation: Recommendation {
                framework: "N8N".into(),
                ease_of_use: "High".into(),
                summary: "S".into(),
                reasoning: "R".into(),
                ki_notwendig: true,
                alternative_ohne_ki: None,
            },
            judge_evaluation: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("formInput").is_some());
        assert!(value["formInput"].get("useCaseDescription").is_some());
        assert!(value.get("judgeEvaluation").is_none());
        assert!(value["recommendation"].get("ki_notwendig").is_some());
    }

    #[test]
    fn test_find_choice() {
        assert_eq!(find_choice(INTERACTION_CHANNELS, "api").map(|c| c.label), Some("API / Service"));
        assert!(find_choice(MODEL_ECOSYSTEMS, "unknown").is_none());
    }
}
