use std::{collections::HashMap, fs, path::Path, time::Duration};

use shared::protocol::DEFAULT_IMAGE_PROMPT;
use url::Url;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_CONFIG_FILE: &str = "chat_client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    /// Delay applied before a successful response replaces its placeholder.
    pub response_delay: Duration,
    /// Delay applied before an error replaces its placeholder.
    pub error_delay: Duration,
    pub feedback_notice_ttl: Duration,
    pub image_prompt: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8001".into(),
            request_timeout: Duration::from_secs(60),
            response_delay: Duration::ZERO,
            error_delay: Duration::ZERO,
            feedback_notice_ttl: Duration::from_secs(3),
            image_prompt: DEFAULT_IMAGE_PROMPT.into(),
        }
    }
}

impl ClientSettings {
    pub fn base_url(&self) -> ClientResult<Url> {
        let raw = self.api_base_url.trim().trim_end_matches('/');
        let url = Url::parse(raw)
            .map_err(|e| ClientError::Config(format!("invalid api base url '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "api base url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }
}

/// Defaults, then `chat_client.toml` (or `path`), then `APP__*` environment overrides.
pub fn load_settings(path: Option<&Path>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file_overrides(&mut settings, &raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), %err, "failed to read client config"),
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_overrides(settings: &mut ClientSettings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            tracing::warn!(%err, "ignoring unparsable client config");
            return;
        }
    };

    if let Some(v) = file_cfg.get("api_base_url").and_then(toml::Value::as_str) {
        settings.api_base_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("image_prompt").and_then(toml::Value::as_str) {
        settings.image_prompt = v.to_string();
    }
    if let Some(v) = millis(file_cfg.get("request_timeout_ms")) {
        settings.request_timeout = v;
    }
    if let Some(v) = millis(file_cfg.get("response_delay_ms")) {
        settings.response_delay = v;
    }
    if let Some(v) = millis(file_cfg.get("error_delay_ms")) {
        settings.error_delay = v;
    }
    if let Some(v) = millis(file_cfg.get("feedback_notice_ms")) {
        settings.feedback_notice_ttl = v;
    }
}

fn millis(value: Option<&toml::Value>) -> Option<Duration> {
    let ms = value?.as_integer()?;
    u64::try_from(ms).ok().map(Duration::from_millis)
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CHAT_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__IMAGE_PROMPT") {
        settings.image_prompt = v;
    }

    let env_millis = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
    if let Some(ms) = env_millis("APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = env_millis("APP__RESPONSE_DELAY_MS") {
        settings.response_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = env_millis("APP__ERROR_DELAY_MS") {
        settings.error_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = env_millis("APP__FEEDBACK_NOTICE_MS") {
        settings.feedback_notice_ttl = Duration::from_millis(ms);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
