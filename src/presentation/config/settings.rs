use config::{Config, ConfigError, Environment as EnvironmentSource, File};
use serde::Deserialize;

use crate::application::services::PartialReplyPolicy;

use super::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub backend: BackendSettings,
    pub chat: ChatSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    pub stream_framing: StreamFraming,
    pub partial_reply: PartialReplyPolicy,
}

/// How the completion body is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFraming {
    /// Body bytes are the reply text itself.
    #[default]
    Raw,
    /// Body is server-sent events whose `data` fields carry the reply text. An
    /// event not ended by a blank line before the body closes is dropped.
    EventStream,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Settings {
    /// Defaults, overridden by `appsettings.{environment}` (optional) and then by
    /// `APP_`-prefixed variables such as `APP_BACKEND__BASE_URL`.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Self::builder(environment)?
            .add_source(
                EnvironmentSource::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn builder(
        environment: Environment,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("backend.base_url", "http://localhost:8000")?
            .set_default("backend.request_timeout_secs", 30)?
            .set_default("chat.stream_framing", "raw")?
            .set_default("chat.partial_reply", "remove")?
            .set_default("logging.level", "info")?
            .set_default("logging.enable_json", false)?
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.as_str()))
                    .required(false),
            ))
    }
}
