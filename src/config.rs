//! Configuration for the production board.
//!
//! Settings are read from `.prodboard/board.toml` in the project directory.
//! Remote credentials may also come from the environment (or a `.env`
//! file next to the project), which is how deployments usually provide
//! them. Resolution order is file → environment → default.
//!
//! # Configuration File Format
//!
//! ```toml
//! [remote]
//! url = "https://example.supabase.co"
//! anon_key = "eyJhbGciOi..."
//! table = "production_projects"
//! timeout_secs = 10
//!
//! [storage]
//! dir = "/var/lib/prodboard"
//!
//! [feedback]
//! success_ms = 1500
//! error_ms = 2500
//!
//! [moves]
//! ordering = "serialized"
//!
//! [source]
//! refresh_secs = 300
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::board::controller::{ControllerOptions, MoveOrdering};
use crate::board::gateway::DEFAULT_TABLE;

pub const ENV_REMOTE_URL: &str = "PRODBOARD_REMOTE_URL";
pub const ENV_REMOTE_KEY: &str = "PRODBOARD_REMOTE_KEY";
pub const ENV_REMOTE_TABLE: &str = "PRODBOARD_REMOTE_TABLE";

/// Remote persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    /// Request timeout for one upsert batch
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            table: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory for the local placement file (default: platform data dir)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSection {
    #[serde(default = "default_success_ms")]
    pub success_ms: u64,
    #[serde(default = "default_error_ms")]
    pub error_ms: u64,
}

fn default_success_ms() -> u64 {
    1500
}

fn default_error_ms() -> u64 {
    2500
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            success_ms: default_success_ms(),
            error_ms: default_error_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovesSection {
    #[serde(default)]
    pub ordering: MoveOrdering,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Seconds between project source refreshes
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

fn default_refresh_secs() -> u64 {
    300
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
        }
    }
}

/// Parsed board.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardToml {
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub feedback: FeedbackSection,
    #[serde(default)]
    pub moves: MovesSection,
    #[serde(default)]
    pub source: SourceSection,
}

/// Fully resolved remote settings. Only exists when both URL and key are
/// known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl BoardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse board.toml")
    }

    /// Load `board.toml` from `board_dir`, or defaults when it doesn't exist.
    pub fn load_or_default(board_dir: &Path) -> Result<Self> {
        let config_path = board_dir.join("board.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize board.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Resolve remote settings, consulting `env` for anything the file
    /// leaves out.
    pub fn remote_settings_with<F>(&self, env: F) -> Option<RemoteSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |file: &Option<String>, var: &str| {
            file.clone()
                .or_else(|| env(var))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = pick(&self.remote.url, ENV_REMOTE_URL)?;
        let api_key = pick(&self.remote.anon_key, ENV_REMOTE_KEY)?;
        let table = pick(&self.remote.table, ENV_REMOTE_TABLE)
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());
        Some(RemoteSettings {
            url,
            api_key,
            table,
            timeout: Duration::from_secs(self.remote.timeout_secs),
        })
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(ref url) = self.remote.url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            warnings.push(format!("Invalid remote url '{}': expected http(s)://", url));
        }
        if self.remote.url.is_some() != self.remote.anon_key.is_some() {
            warnings.push(
                "Remote url and anon_key must be set together; persistence stays local until both are present"
                    .to_string(),
            );
        }
        if self.remote.timeout_secs == 0 {
            warnings.push("remote.timeout_secs is 0; every upsert will time out".to_string());
        }
        if self.feedback.error_ms < self.feedback.success_ms {
            warnings.push(format!(
                "feedback.error_ms ({}) is shorter than feedback.success_ms ({})",
                self.feedback.error_ms, self.feedback.success_ms
            ));
        }
        if self.source.refresh_secs == 0 {
            warnings.push("source.refresh_secs must be greater than 0".to_string());
        }

        warnings
    }
}

/// Runtime configuration: project paths plus the parsed file.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub project_dir: PathBuf,
    pub board_dir: PathBuf,
    pub toml: BoardToml,
}

impl BoardConfig {
    /// Load configuration for `project_dir`, reading `.env` there if present.
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        // Missing .env is the normal case.
        let _ = dotenvy::from_path(project_dir.join(".env"));
        let board_dir = project_dir.join(".prodboard");
        let toml = BoardToml::load_or_default(&board_dir)?;

        Ok(Self {
            project_dir,
            board_dir,
            toml,
        })
    }

    /// Directory for the local placement store.
    pub fn storage_dir(&self) -> PathBuf {
        self.toml
            .storage
            .dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("prodboard")))
            .unwrap_or_else(|| self.board_dir.join("state"))
    }

    /// Get path to log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.board_dir.join("logs")
    }

    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        self.toml
            .remote_settings_with(|var| std::env::var(var).ok())
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            ordering: self.toml.moves.ordering,
            success_ttl: Duration::from_millis(self.toml.feedback.success_ms),
            error_ttl: Duration::from_millis(self.toml.feedback.error_ms),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.toml.source.refresh_secs.max(1))
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
