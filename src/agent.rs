use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::AgentConfig;
use crate::diagnostics::{self, Kind};
use crate::error::FlowError;
use crate::model::AgentInput;
use crate::parser::AgentEvent;

/// The agent runtime as the submission flow sees it.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn create_session(&self, session_id: &str) -> Result<(), FlowError>;
    async fn run(&self, session_id: &str, input: &AgentInput) -> Result<Vec<AgentEvent>, FlowError>;
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    session_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    app_name: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    #[serde(rename = "newMessage")]
    new_message: Message,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    parts: Vec<MessagePart>,
}

#[derive(Debug, Serialize)]
struct MessagePart {
    text: String,
}

/// HTTP client for the agent runtime's session and run endpoints.
#[derive(Clone)]
pub struct AgentClient {
    base_url: String,
    app_name: String,
    user_id: String,
    client: reqwest::Client,
}

impl AgentClient {
    pub fn with_config(config: &AgentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("falling back to default http client: {}", e);
                reqwest::Client::new()
            });

        AgentClient {
            base_url: config.host.trim_end_matches('/').to_string(),
            app_name: config.app_name.clone(),
            user_id: config.user_id.clone(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions",
            self.base_url, self.app_name, self.user_id
        )
    }

    fn run_url(&self) -> String {
        format!("{}/run", self.base_url)
    }
}

#[async_trait]
impl AgentBackend for AgentClient {
    async fn create_session(&self, session_id: &str) -> Result<(), FlowError> {
        let url = self.sessions_url();
        tracing::debug!("POST {}", url);
        diagnostics::log_with(Kind::Http, format!("POST {}", url));

        let response = self
            .client
            .post(&url)
            .json(&CreateSessionRequest { session_id })
            .send()
            .await
            .map_err(|e| FlowError::Session(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FlowError::Session(format!("status {}", response.status())));
        }
        Ok(())
    }

    async fn run(&self, session_id: &str, input: &AgentInput) -> Result<Vec<AgentEvent>, FlowError> {
        let text = serde_json::to_string_pretty(input).map_err(|e| FlowError::Network(e.to_string()))?;
        let request = RunRequest {
            app_name: &self.app_name,
            user_id: &self.user_id,
            session_id,
            new_message: Message {
                role: "user".to_string(),
                parts: vec![MessagePart { text }],
            },
        };

        let url = self.run_url();
        tracing::debug!("POST {} (session {})", url, session_id);
        diagnostics::log_with(Kind::Http, format!("POST {}", url));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| FlowError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Server {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<AgentEvent>>()
            .await
            .map_err(|e| FlowError::Network(format!("unreadable event list: {}", e)))
    }
}
