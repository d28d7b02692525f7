use std::sync::Mutex;

use async_trait::async_trait;

use agent4agents::config::AgentConfig;
use agent4agents::flow::{answer_slots, Flow, Phase};
use agent4agents::model::AgentInput;
use agent4agents::parser::{AgentEvent, Content, Part};
use agent4agents::storage::MemoryStore;
use agent4agents::{AgentBackend, FlowError, FormInput, HistoryStore};

const RECOMMENDATION: &str = r#"{"framework":"LangChain","ease_of_use":"Medium","summary":"S","reasoning":"R","ki_notwendig":true,"alternative_ohne_ki":null}"#;

/// Scripted agent runtime that records the calls it receives.
struct FakeBackend {
    session: Result<(), FlowError>,
    run: Result<Vec<AgentEvent>, FlowError>,
    calls: Mutex<Vec<String>>,
    inputs: Mutex<Vec<AgentInput>>,
}

impl FakeBackend {
    fn replying(events: Vec<AgentEvent>) -> Self {
        FakeBackend {
            session: Ok(()),
            run: Ok(events),
            calls: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentBackend for FakeBackend {
    async fn create_session(&self, session_id: &str) -> Result<(), FlowError> {
        self.calls.lock().unwrap().push(format!("session:{}", session_id));
        self.session.clone()
    }

    async fn run(&self, session_id: &str, input: &AgentInput) -> Result<Vec<AgentEvent>, FlowError> {
        self.calls.lock().unwrap().push(format!("run:{}", session_id));
        self.inputs.lock().unwrap().push(input.clone());
        self.run.clone()
    }
}

fn scenario_input() -> FormInput {
    FormInput {
        use_case_description: "Unser Kundenservice erhält täglich mehrere hundert Anfragen per Chat. ".repeat(6),
        preferred_model_ecosystem: "keine".to_string(),
        interaction_channel: "chatbot".to_string(),
        integration_targets: String::new(),
    }
}

fn user_echo() -> AgentEvent {
    AgentEvent {
        author: Some("user".to_string()),
        content: Some(Content {
            role: "user".to_string(),
            parts: Some(vec![Part {
                text: Some("{...}".to_string()),
            }]),
        }),
    }
}

fn history() -> HistoryStore {
    HistoryStore::open(Box::new(MemoryStore::new()))
}

#[tokio::test]
async fn scenario_a_recommendation_without_judge() {
    let config = AgentConfig::default();
    let backend = FakeBackend::replying(vec![user_echo(), AgentEvent::model("CompassAgent", RECOMMENDATION)]);
    let mut history = history();
    let mut flow = Flow::new();

    let input = scenario_input();
    assert!(input.use_case_description.chars().count() >= 300);
    let entry = flow
        .submit(&backend, &mut history, &answer_slots(&config), input.clone())
        .await
        .unwrap();

    assert_eq!(flow.phase(), &Phase::Result);
    assert_eq!(history.len(), 1);
    assert_eq!(history.entries()[0], entry);
    assert_eq!(entry.recommendation.framework, "LangChain");
    assert_eq!(entry.recommendation.ease_of_use, "Medium");
    assert!(entry.recommendation.ki_notwendig);
    assert_eq!(entry.recommendation.alternative_ohne_ki, None);
    assert!(entry.judge_evaluation.is_none());
    assert_eq!(entry.form_input, input);

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("session:"));
    assert_eq!(calls[0]["session:".len()..], calls[1]["run:".len()..]);

    let sent = backend.inputs.lock().unwrap()[0].clone();
    assert_eq!(sent.interaction_channel, "chatbot");
    assert_eq!(sent.preferred_model_ecosystem, "keine");
}

#[tokio::test]
async fn scenario_b_fenced_judge_is_attached() {
    let config = AgentConfig::default();
    let judge = "```json\n{\"score\":8,\"strengths\":[\"passt\"],\"weaknesses\":[],\"improvement_suggestions\":[\"Kosten\"],\"framework_fit\":\"gut\",\"ease_of_use_realistic\":true}\n```";
    let backend = FakeBackend::replying(vec![
        user_echo(),
        AgentEvent::model("CompassAgent", RECOMMENDATION),
        AgentEvent::model("JudgeAgent", judge),
    ]);
    let mut history = history();
    let mut flow = Flow::new();

    let entry = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap();

    let evaluation = entry.judge_evaluation.as_ref().unwrap();
    assert_eq!(evaluation.score, 8.0);
    assert_eq!(evaluation.strengths, vec!["passt".to_string()]);
    assert!(evaluation.ease_of_use_realistic);
    assert_eq!(flow.judge_evaluation(), Some(evaluation));
    assert_eq!(history.entries()[0].judge_evaluation.as_ref().map(|j| j.score), Some(8.0));
}

#[tokio::test]
async fn scenario_c_server_error_returns_to_form() {
    let config = AgentConfig::default();
    let backend = FakeBackend {
        run: Err(FlowError::Server {
            status: 500,
            body: "boom".to_string(),
        }),
        ..FakeBackend::replying(Vec::new())
    };
    let mut history = history();
    let mut flow = Flow::new();

    let err = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Server { status: 500, .. }));
    assert_eq!(flow.phase(), &Phase::Form);
    let message = flow.error().unwrap();
    assert!(message.contains("500"));
    assert!(message.contains("boom"));
    assert!(history.is_empty());
}

#[tokio::test]
async fn scenario_d_invalid_judge_degrades_to_absent() {
    let config = AgentConfig::default();
    let backend = FakeBackend::replying(vec![
        AgentEvent::model("CompassAgent", RECOMMENDATION),
        AgentEvent::model("JudgeAgent", "{not json"),
    ]);
    let mut history = history();
    let mut flow = Flow::new();

    let entry = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap();

    assert_eq!(flow.phase(), &Phase::Result);
    assert!(entry.judge_evaluation.is_none());
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn session_failure_skips_run() {
    let config = AgentConfig::default();
    let backend = FakeBackend {
        session: Err(FlowError::Session("status 503".to_string())),
        ..FakeBackend::replying(vec![AgentEvent::model("CompassAgent", RECOMMENDATION)])
    };
    let mut history = history();
    let mut flow = Flow::new();

    let err = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Session(_)));
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(flow.error(), Some("Session konnte nicht erstellt werden."));
    assert!(history.is_empty());
}

#[tokio::test]
async fn no_model_answer_creates_no_entry() {
    let config = AgentConfig::default();
    let backend = FakeBackend::replying(vec![user_echo()]);
    let mut history = history();
    let mut flow = Flow::new();

    let err = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap_err();

    assert_eq!(err, FlowError::NoResponse);
    assert_eq!(flow.error(), Some("Keine Antwort vom Agenten erhalten."));
    assert!(history.is_empty());
}

#[tokio::test]
async fn judge_wins_last_write_per_author() {
    let config = AgentConfig::default();
    let backend = FakeBackend::replying(vec![
        AgentEvent::model("JudgeAgent", "{\"score\":2}"),
        AgentEvent::model("CompassAgent", RECOMMENDATION),
        AgentEvent::model("JudgeAgent", "{\"score\":9}"),
    ]);
    let mut history = history();
    let mut flow = Flow::new();

    let entry = flow
        .submit(&backend, &mut history, &answer_slots(&config), scenario_input())
        .await
        .unwrap();

    assert_eq!(entry.judge_evaluation.map(|j| j.score), Some(9.0));
}

#[tokio::test]
async fn eleven_submissions_keep_ten_newest() {
    let config = AgentConfig::default();
    let backend = FakeBackend::replying(vec![AgentEvent::model("CompassAgent", RECOMMENDATION)]);
    let mut history = history();
    let mut flow = Flow::new();
    let slots = answer_slots(&config);

    let mut ids = Vec::new();
    for _ in 0..11 {
        let entry = flow
            .submit(&backend, &mut history, &slots, scenario_input())
            .await
            .unwrap();
        ids.push(entry.id);
        flow.reset();
    }

    assert_eq!(history.len(), 10);
    assert!(history.get(&ids[0]).is_none());
    assert_eq!(history.entries()[0].id, ids[10]);
}
