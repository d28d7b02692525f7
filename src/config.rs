use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const HOST_ENV: &str = "AGENT4AGENTS_HOST";

fn default_host() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_name() -> String {
    "agent4agents".to_string()
}

fn default_user_id() -> String {
    "user".to_string()
}

fn default_recommendation_author() -> String {
    "CompassAgent".to_string()
}

fn default_judge_author() -> String {
    "JudgeAgent".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Event author whose answer is the recommendation.
    #[serde(default = "default_recommendation_author")]
    pub recommendation_author: String,
    /// Event author whose answer is the quality review.
    #[serde(default = "default_judge_author")]
    pub judge_author: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            host: default_host(),
            app_name: default_app_name(),
            user_id: default_user_id(),
            recommendation_author: default_recommendation_author(),
            judge_author: default_judge_author(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub history_db: Option<PathBuf>,
    pub contacts_file: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn history_db(&self) -> PathBuf {
        self.history_db
            .clone()
            .unwrap_or_else(|| Config::get_config_dir().join("history.sqlite"))
    }

    pub fn contacts_file(&self) -> PathBuf {
        self.contacts_file
            .clone()
            .unwrap_or_else(|| Config::get_config_dir().join("data").join("contacts.json"))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join("Downloads"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 960,
            height: 820,
            min_width: 640,
            min_height: 480,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            Config::default()
        };

        if let Ok(host) = std::env::var(HOST_ENV) {
            if !host.trim().is_empty() {
                config.agent.host = host;
            }
        }
        config
    }

    /// Parse `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Error parsing {}: {}. Using defaults.", path.display(), e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Error reading {}: {}. Using defaults.", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/agent4agents")
        } else {
            PathBuf::from(".")
        }
    }
}
