//! Configuration module for drivestage.
//!
//! All settings come from environment variables. [`Config::from_lookup`]
//! parses them through an injectable lookup function so tests never touch
//! the process environment; [`Config::validate`] then checks the variables
//! each service role requires.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{FolderId, StageFolders};

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_INPUT_FOLDER_ID: &str = "INPUT_FOLDER_ID";
pub const ENV_TEMP_FOLDER_ID: &str = "TEMP_FOLDER_ID";
pub const ENV_OUTPUT_FOLDER_ID: &str = "OUTPUT_FOLDER_ID";
pub const ENV_DRIVE_FOLDER_ID: &str = "DRIVE_FOLDER_ID";
pub const ENV_DRIVE_ID: &str = "DRIVE_ID";
pub const ENV_OUTPUT_MODE: &str = "OUTPUT_MODE";
pub const ENV_PROCESSING_DELAY_MS: &str = "PROCESSING_DELAY_MS";
pub const ENV_RELAY_MODE: &str = "RELAY_MODE";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_PUBSUB_TOPIC: &str = "PUBSUB_TOPIC";
pub const ENV_PROJECT_ID: &str = "GOOGLE_CLOUD_PROJECT";
pub const ENV_CHANNEL_ID: &str = "CHANNEL_ID";
pub const ENV_CALLBACK_URL: &str = "CALLBACK_URL";
pub const ENV_POLL_INTERVAL_SECS: &str = "POLL_INTERVAL_SECS";
pub const ENV_RECENCY_WINDOW_SECS: &str = "RECENCY_WINDOW_SECS";
pub const ENV_CREDENTIALS_FILE: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_ACCESS_TOKEN: &str = "DRIVE_ACCESS_TOKEN";
pub const ENV_PORT: &str = "PORT";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Longest accepted recency window for the poll watcher (one year)
pub const MAX_RECENCY_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// The process role being started; decides which variables are required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Mover,
    PushWatcher,
    PollWatcher,
}

/// How a processed file reaches the output folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Rewrite the parent from staging to output
    #[default]
    Move,
    /// Download from staging and create a new object in output
    Copy,
}

/// Transport used by the watcher to reach the mover
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    #[default]
    Webhook,
    PubSub,
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(OutputMode::Move),
            "copy" => Ok(OutputMode::Copy),
            other => Err(format!("invalid output mode '{other}'; valid options: move, copy")),
        }
    }
}

impl FromStr for RelayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(RelayMode::Webhook),
            "pubsub" => Ok(RelayMode::PubSub),
            other => Err(format!("invalid relay mode '{other}'; valid options: webhook, pubsub")),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("invalid log format '{other}'; valid options: text, json")),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Move => f.write_str("move"),
            OutputMode::Copy => f.write_str("copy"),
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Webhook => f.write_str("webhook"),
            RelayMode::PubSub => f.write_str("pubsub"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for drivestage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub folders: FoldersConfig,
    pub pipeline: PipelineConfig,
    pub watcher: WatcherConfig,
    pub credentials: CredentialsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Folder identifiers, kept as raw strings until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldersConfig {
    pub input: Option<String>,
    pub staging: Option<String>,
    pub output: Option<String>,
    /// Folder watched for new files; falls back to `input`.
    pub monitored: Option<String>,
    /// Shared drive ID; enables all-drives request flags when set.
    pub drive_id: Option<String>,
}

/// Mover pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub output_mode: OutputMode,
    /// Duration of the simulated processing step, in milliseconds.
    pub processing_delay_ms: u64,
}

/// Watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub relay_mode: RelayMode,
    pub webhook_url: Option<String>,
    pub pubsub_topic: Option<String>,
    pub project_id: Option<String>,
    pub channel_id: Option<String>,
    /// Push address for the change channel; falls back to `webhook_url`.
    pub callback_url: Option<String>,
    pub poll_interval_secs: u64,
    pub recency_window_secs: u64,
}

/// Credential sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path to a service account key or authorized-user credentials file.
    pub credentials_file: Option<PathBuf>,
    /// Pre-issued bearer token; takes precedence over the file.
    pub access_token: Option<String>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::Move,
            processing_delay_ms: 2000,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            relay_mode: RelayMode::Webhook,
            webhook_url: None,
            pubsub_topic: None,
            project_id: None,
            channel_id: None,
            callback_url: None,
            poll_interval_secs: 5,
            recency_window_secs: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Environment variable at fault, e.g. `"INPUT_FOLDER_ID"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, Vec<ValidationError>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// Empty values are treated as unset. Values that fail to parse are
    /// collected and returned together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Vec<ValidationError>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut errors = Vec::new();
        let mut config = Config::default();

        config.folders = FoldersConfig {
            input: get(ENV_INPUT_FOLDER_ID),
            staging: get(ENV_TEMP_FOLDER_ID),
            output: get(ENV_OUTPUT_FOLDER_ID),
            monitored: get(ENV_DRIVE_FOLDER_ID),
            drive_id: get(ENV_DRIVE_ID),
        };

        if let Some(v) = get(ENV_OUTPUT_MODE) {
            match v.parse() {
                Ok(mode) => config.pipeline.output_mode = mode,
                Err(msg) => errors.push(ValidationError::new(ENV_OUTPUT_MODE, msg)),
            }
        }
        if let Some(v) = get(ENV_PROCESSING_DELAY_MS) {
            match v.parse() {
                Ok(ms) => config.pipeline.processing_delay_ms = ms,
                Err(_) => errors.push(ValidationError::new(
                    ENV_PROCESSING_DELAY_MS,
                    format!("expected a number of milliseconds, got '{v}'"),
                )),
            }
        }

        if let Some(v) = get(ENV_RELAY_MODE) {
            match v.parse() {
                Ok(mode) => config.watcher.relay_mode = mode,
                Err(msg) => errors.push(ValidationError::new(ENV_RELAY_MODE, msg)),
            }
        }
        config.watcher.webhook_url = get(ENV_WEBHOOK_URL);
        config.watcher.pubsub_topic = get(ENV_PUBSUB_TOPIC);
        config.watcher.project_id = get(ENV_PROJECT_ID);
        config.watcher.channel_id = get(ENV_CHANNEL_ID);
        config.watcher.callback_url = get(ENV_CALLBACK_URL);
        for (key, slot) in [
            (ENV_POLL_INTERVAL_SECS, &mut config.watcher.poll_interval_secs),
            (ENV_RECENCY_WINDOW_SECS, &mut config.watcher.recency_window_secs),
        ] {
            if let Some(v) = get(key) {
                match v.parse() {
                    Ok(secs) => *slot = secs,
                    Err(_) => errors.push(ValidationError::new(
                        key,
                        format!("expected a number of seconds, got '{v}'"),
                    )),
                }
            }
        }

        config.credentials = CredentialsConfig {
            credentials_file: get(ENV_CREDENTIALS_FILE).map(PathBuf::from),
            access_token: get(ENV_ACCESS_TOKEN),
        };

        if let Some(v) = get(ENV_PORT) {
            match v.parse() {
                Ok(port) => config.server.port = port,
                Err(_) => errors.push(ValidationError::new(
                    ENV_PORT,
                    format!("expected a TCP port, got '{v}'"),
                )),
            }
        }

        if let Some(v) = get(ENV_LOG_FORMAT) {
            match v.parse() {
                Ok(format) => config.logging.format = format,
                Err(msg) => errors.push(ValidationError::new(ENV_LOG_FORMAT, msg)),
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Reads the environment and validates it for `role` in one step.
    ///
    /// Every problem found is reported in the returned error.
    pub fn load(role: ServiceRole) -> anyhow::Result<Self> {
        let config = Self::from_env().map_err(join_errors)?;
        let errors = config.validate(role);
        if !errors.is_empty() {
            return Err(join_errors(errors));
        }
        Ok(config)
    }
}

fn join_errors(errors: Vec<ValidationError>) -> anyhow::Error {
    let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
    anyhow::anyhow!("Invalid configuration:\n  {}", lines.join("\n  "))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn require_folder(
    errors: &mut Vec<ValidationError>,
    field: &str,
    value: Option<&String>,
) -> Option<FolderId> {
    match value {
        None => {
            errors.push(ValidationError::new(field, "must be set"));
            None
        }
        Some(v) => match FolderId::new(v.clone()) {
            Ok(id) => Some(id),
            Err(e) => {
                errors.push(ValidationError::new(field, e.to_string()));
                None
            }
        },
    }
}

fn require_url(errors: &mut Vec<ValidationError>, field: &str, value: Option<&String>) {
    match value {
        None => errors.push(ValidationError::new(field, "must be set")),
        Some(v) => match url::Url::parse(v) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            Ok(u) => errors.push(ValidationError::new(
                field,
                format!("unsupported URL scheme '{}'", u.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {e}"))),
        },
    }
}

impl Config {
    /// Validate the configuration for `role` and return all errors found.
    ///
    /// An empty vector means the configuration is usable for that role.
    pub fn validate(&self, role: ServiceRole) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match role {
            ServiceRole::Mover => {
                require_folder(&mut errors, ENV_INPUT_FOLDER_ID, self.folders.input.as_ref());
                require_folder(&mut errors, ENV_TEMP_FOLDER_ID, self.folders.staging.as_ref());
                require_folder(&mut errors, ENV_OUTPUT_FOLDER_ID, self.folders.output.as_ref());
            }
            ServiceRole::PushWatcher | ServiceRole::PollWatcher => {
                let field = if self.folders.monitored.is_some() {
                    ENV_DRIVE_FOLDER_ID
                } else {
                    ENV_INPUT_FOLDER_ID
                };
                require_folder(&mut errors, field, self.monitored_folder_raw());
                self.validate_relay(&mut errors);
            }
        }

        if role == ServiceRole::PushWatcher {
            if self.watcher.channel_id.is_none() {
                errors.push(ValidationError::new(ENV_CHANNEL_ID, "must be set"));
            }
            let field = if self.watcher.callback_url.is_some() {
                ENV_CALLBACK_URL
            } else {
                ENV_WEBHOOK_URL
            };
            require_url(&mut errors, field, self.callback_url());
        }

        if role == ServiceRole::PollWatcher {
            if self.watcher.poll_interval_secs == 0 {
                errors.push(ValidationError::new(
                    ENV_POLL_INTERVAL_SECS,
                    "must be greater than 0",
                ));
            }
            if self.watcher.recency_window_secs == 0 {
                errors.push(ValidationError::new(
                    ENV_RECENCY_WINDOW_SECS,
                    "must be greater than 0",
                ));
            } else if self.watcher.recency_window_secs > MAX_RECENCY_WINDOW_SECS {
                errors.push(ValidationError::new(
                    ENV_RECENCY_WINDOW_SECS,
                    format!("must be at most {MAX_RECENCY_WINDOW_SECS}"),
                ));
            }
        }

        errors
    }

    fn validate_relay(&self, errors: &mut Vec<ValidationError>) {
        match self.watcher.relay_mode {
            RelayMode::Webhook => {
                require_url(errors, ENV_WEBHOOK_URL, self.watcher.webhook_url.as_ref());
            }
            RelayMode::PubSub => match self.watcher.pubsub_topic.as_deref() {
                None => errors.push(ValidationError::new(ENV_PUBSUB_TOPIC, "must be set")),
                Some(topic) if !topic.starts_with("projects/") => {
                    if self.watcher.project_id.is_none() {
                        errors.push(ValidationError::new(
                            ENV_PROJECT_ID,
                            "must be set when PUBSUB_TOPIC is not a full topic path",
                        ));
                    }
                }
                Some(_) => {}
            },
        }
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    fn monitored_folder_raw(&self) -> Option<&String> {
        self.folders.monitored.as_ref().or(self.folders.input.as_ref())
    }

    /// The three pipeline folders.
    ///
    /// # Errors
    /// Returns the validation errors if any folder is missing or invalid.
    pub fn stage_folders(&self) -> Result<StageFolders, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let input = require_folder(&mut errors, ENV_INPUT_FOLDER_ID, self.folders.input.as_ref());
        let staging =
            require_folder(&mut errors, ENV_TEMP_FOLDER_ID, self.folders.staging.as_ref());
        let output =
            require_folder(&mut errors, ENV_OUTPUT_FOLDER_ID, self.folders.output.as_ref());
        match (input, staging, output) {
            (Some(i), Some(s), Some(o)) => Ok(StageFolders::new(i, s, o)),
            _ => Err(errors),
        }
    }

    /// The folder the watcher observes (`DRIVE_FOLDER_ID`, else `INPUT_FOLDER_ID`).
    pub fn monitored_folder(&self) -> Result<FolderId, ValidationError> {
        let raw = self
            .monitored_folder_raw()
            .ok_or_else(|| ValidationError::new(ENV_DRIVE_FOLDER_ID, "must be set"))?;
        FolderId::new(raw.clone())
            .map_err(|e| ValidationError::new(ENV_DRIVE_FOLDER_ID, e.to_string()))
    }

    /// Push address for the change channel (`CALLBACK_URL`, else `WEBHOOK_URL`).
    pub fn callback_url(&self) -> Option<&String> {
        self.watcher
            .callback_url
            .as_ref()
            .or(self.watcher.webhook_url.as_ref())
    }

    /// Full Pub/Sub topic path, `projects/<project>/topics/<topic>`.
    pub fn pubsub_topic_path(&self) -> Option<String> {
        let topic = self.watcher.pubsub_topic.as_deref()?;
        if topic.starts_with("projects/") {
            return Some(topic.to_string());
        }
        let project = self.watcher.project_id.as_deref()?;
        Some(format!("projects/{project}/topics/{topic}"))
    }
}
