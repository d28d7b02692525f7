use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

use crate::error::ParseError;

static LEADING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?:json)?\n?").unwrap());
static TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?```$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl AgentEvent {
    pub fn model(author: &str, text: &str) -> Self {
        AgentEvent {
            author: Some(author.to_string()),
            content: Some(Content {
                role: "model".to_string(),
                parts: Some(vec![Part {
                    text: Some(text.to_string()),
                }]),
            }),
        }
    }

    /// First non-blank text part of a model message.
    pub fn model_text(&self) -> Option<&str> {
        let content = self.content.as_ref()?;
        if content.role != "model" {
            return None;
        }
        content
            .parts
            .as_deref()?
            .iter()
            .filter_map(|p| p.text.as_deref())
            .find(|t| !t.trim().is_empty())
    }
}

/// Routes event authors to logical answer slots.
#[derive(Debug, Clone)]
pub struct SlotMap<K> {
    by_author: HashMap<String, K>,
    fallback: Option<K>,
}

impl<K: Copy + Eq + Hash> SlotMap<K> {
    pub fn new() -> Self {
        SlotMap {
            by_author: HashMap::new(),
            fallback: None,
        }
    }

    /// One slot filled by whichever model message comes last.
    pub fn single(slot: K) -> Self {
        SlotMap {
            by_author: HashMap::new(),
            fallback: Some(slot),
        }
    }

    pub fn route(mut self, author: impl Into<String>, slot: K) -> Self {
        self.by_author.insert(author.into(), slot);
        self
    }

    /// Slot used for authors without an explicit route.
    pub fn fallback(mut self, slot: K) -> Self {
        self.fallback = Some(slot);
        self
    }

    fn slot_for(&self, author: Option<&str>) -> Option<K> {
        author
            .and_then(|a| self.by_author.get(a).copied())
            .or(self.fallback)
    }

    fn slot_count(&self) -> usize {
        let mut slots: Vec<K> = self.by_author.values().copied().collect();
        slots.extend(self.fallback);
        let mut distinct: Vec<K> = Vec::with_capacity(slots.len());
        for slot in slots {
            if !distinct.contains(&slot) {
                distinct.push(slot);
            }
        }
        distinct.len()
    }
}

impl<K: Copy + Eq + Hash> Default for SlotMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the latest model answer per slot.
pub fn extract_answers<'a, K: Copy + Eq + Hash>(
    events: &'a [AgentEvent],
    slots: &SlotMap<K>,
) -> HashMap<K, &'a str> {
    let wanted = slots.slot_count();
    let mut answers = HashMap::new();

    for event in events.iter().rev() {
        let Some(text) = event.model_text() else {
            continue;
        };
        let Some(slot) = slots.slot_for(event.author.as_deref()) else {
            continue;
        };
        answers.entry(slot).or_insert(text);
        if answers.len() == wanted {
            break;
        }
    }

    answers
}

/// Drop a surrounding markdown code fence, if any.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = LEADING_FENCE.find(trimmed).map(|m| m.end()).unwrap_or(0);
    let rest = &trimmed[start..];
    let end = TRAILING_FENCE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Strip fences and decode JSON into `T`.
pub fn decode_answer<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    serde_json::from_str(strip_fences(text)).map_err(|e| ParseError::DecodeFailed(e.to_string()))
}

/// Decode the answer of a required slot.
pub fn require<T: DeserializeOwned, K: Copy + Eq + Hash>(
    answers: &HashMap<K, &str>,
    slot: K,
) -> Result<T, ParseError> {
    let text = answers.get(&slot).ok_or(ParseError::NoResponseFound)?;
    decode_answer(text)
}

/// Decode the answer of an optional slot. Missing or undecodable answers
/// come back as `Ok(None)` and `Err` respectively so the caller can note the
/// degradation without failing.
pub fn optional<T: DeserializeOwned, K: Copy + Eq + Hash>(
    answers: &HashMap<K, &str>,
    slot: K,
) -> Result<Option<T>, ParseError> {
    match answers.get(&slot) {
        Some(text) => decode_answer(text).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Slot {
        Main,
        Review,
    }

    fn user(text: &str) -> AgentEvent {
        AgentEvent {
            author: Some("user".into()),
            content: Some(Content {
                role: "user".into(),
                parts: Some(vec![Part {
                    text: Some(text.into()),
                }]),
            }),
        }
    }

    #[test]
    fn test_fallback_takes_unrouted_authors() {
        let slots = SlotMap::new().route("JudgeAgent", Slot::Review).fallback(Slot::Main);
        let events = vec![
            AgentEvent::model("CompassAgent", "first"),
            AgentEvent::model("JudgeAgent", "review"),
            user("noise"),
            AgentEvent::model("Helper", "later"),
        ];
        let answers = extract_answers(&events, &slots);
        assert_eq!(answers.get(&Slot::Main), Some(&"later"));
        assert_eq!(answers.get(&Slot::Review), Some(&"review"));

        let only_judge = vec![AgentEvent::model("JudgeAgent", "review")];
        let answers = extract_answers(&only_judge, &slots);
        assert_eq!(answers.get(&Slot::Main), None);
        assert_eq!(answers.get(&Slot::Review), Some(&"review"));
    }

    #[test]
    fn test_single_model_event() {
        let events = vec![user("hi"), AgentEvent::model("CompassAgent", "{\"a\":1}")];
        let answers = extract_answers(&events, &SlotMap::single(Slot::Main));
        assert_eq!(answers.get(&Slot::Main), Some(&"{\"a\":1}"));
    }

    #[test]
    fn test_no_model_event_is_no_response() {
        let events = vec![user("hi"), AgentEvent::default()];
        let answers = extract_answers(&events, &SlotMap::single(Slot::Main));
        assert!(answers.is_empty());
        let err = require::<serde_json::Value, _>(&answers, Slot::Main).unwrap_err();
        assert_eq!(err, ParseError::NoResponseFound);
    }

    #[test]
    fn test_first_non_empty_part_wins() {
        let event = AgentEvent {
            author: None,
            content: Some(Content {
                role: "model".into(),
                parts: Some(vec![
                    Part { text: None },
                    Part { text: Some("  ".into()) },
                    Part { text: Some("second".into()) },
                    Part { text: Some("third".into()) },
                ]),
            }),
        };
        assert_eq!(event.model_text(), Some("second"));
    }

    #[test]
    fn test_latest_event_per_author_wins() {
        let events = vec![
            AgentEvent::model("A", "old"),
            AgentEvent::model("B", "review"),
            AgentEvent::model("A", "new"),
        ];
        let slots = SlotMap::new().route("A", Slot::Main).route("B", Slot::Review);
        let answers = extract_answers(&events, &slots);
        assert_eq!(answers[&Slot::Main], "new");
        assert_eq!(answers[&Slot::Review], "review");
    }

    #[test]
    fn test_unrouted_author_is_ignored_without_fallback() {
        let events = vec![AgentEvent::model("A", "main"), AgentEvent::model("C", "noise")];
        let slots = SlotMap::new().route("A", Slot::Main);
        let answers = extract_answers(&events, &slots);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[&Slot::Main], "main");
    }

    #[test]
    fn test_single_slot_takes_last_model_message() {
        let events = vec![AgentEvent::model("A", "first"), AgentEvent::model("B", "last")];
        let answers = extract_answers(&events, &SlotMap::single(Slot::Main));
        assert_eq!(answers[&Slot::Main], "last");
    }

    #[test]
    fn test_blank_answer_counts_as_missing() {
        let events = vec![AgentEvent::model("A", "main"), AgentEvent::model("B", "   \n")];
        let slots = SlotMap::new().route("A", Slot::Main).route("B", Slot::Review);
        let answers = extract_answers(&events, &slots);
        assert!(!answers.contains_key(&Slot::Review));
        let review: Option<serde_json::Value> = optional(&answers, Slot::Review).unwrap();
        assert!(review.is_none());
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_fences("```json\n{\"score\":8}\n```"), "{\"score\":8}");
        assert_eq!(strip_fences("  ```\n[1]\n```  "), "[1]");
        assert_eq!(strip_fences("{\"plain\":true}"), "{\"plain\":true}");
    }

    #[test]
    fn test_strip_leaves_interior_fences() {
        let text = "```json\n{\"code\":\"```x```\"}\n```";
        assert_eq!(strip_fences(text), "{\"code\":\"```x```\"}");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let samples = [
            "```json\n{\"a\":1}\n```",
            "```\n {\"a\":1} \n```",
            "{\"a\":1}",
            "  plain text  ",
            "```json{\"a\":1}```",
        ];
        for sample in samples {
            let once = strip_fences(sample);
            assert_eq!(strip_fences(once), once, "sample {:?}", sample);
        }
    }

    #[test]
    fn test_decode_failure_is_distinct() {
        let err = decode_answer::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(err, ParseError::DecodeFailed(_)));
    }

    #[test]
    fn test_events_decode_with_missing_fields() {
        let raw = r#"[{"id":"e1"},{"author":"A","content":{"role":"model"}},{"content":{"role":"model","parts":[{"functionCall":{}},{"text":"ok"}]}}]"#;
        let events: Vec<AgentEvent> = serde_json::from_str(raw).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].model_text(), None);
        assert_eq!(events[1].model_text(), None);
        assert_eq!(events[2].model_text(), Some("ok"));
    }
}
