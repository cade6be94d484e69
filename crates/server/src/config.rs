use std::{collections::HashMap, fs};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.remove.bg/v1.0/removebg";
pub const DEFAULT_API_KEY_ENV: &str = "REMOVE_BG_API";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub provider_url: String,
    /// Name of the environment variable holding the provider credential.
    pub api_key_env: String,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            provider_url: DEFAULT_PROVIDER_URL.into(),
            api_key_env: DEFAULT_API_KEY_ENV.into(),
            max_upload_bytes: 12 * 1024 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_config(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_config(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("ignoring server.toml: expected flat string keys");
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("provider_url") {
        settings.provider_url = v.clone();
    }
    if let Some(v) = file_cfg.get("api_key_env") {
        settings.api_key_env = v.clone();
    }
    if let Some(parsed) = file_cfg
        .get("max_upload_bytes")
        .and_then(|v| v.parse::<usize>().ok())
    {
        settings.max_upload_bytes = parsed;
    }
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("REMOVE_BG_API_URL") {
        settings.provider_url = v;
    }
    if let Some(v) = var("APP__PROVIDER_URL") {
        settings.provider_url = v;
    }

    if let Some(v) = var("APP__API_KEY_ENV") {
        settings.api_key_env = v;
    }

    if let Some(parsed) = var("APP__MAX_UPLOAD_BYTES").and_then(|v| v.parse::<usize>().ok()) {
        settings.max_upload_bytes = parsed;
    }
}

pub fn parse_provider_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim())
        .with_context(|| format!("invalid provider url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("provider url '{raw}' must use http or https");
    }
    Ok(url)
}

/// Source of the provider credential, consulted on every request.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvCredential {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
