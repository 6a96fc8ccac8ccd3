use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow, bail};
use url::Url;

use crate::question::DEFAULT_TOTAL_QUESTIONS;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "CAREERBOT_API_URL";

const CHAT_WS_PATH: &str = "/api/v1/chat/ws";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub default_total_questions: Option<u32>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the user config, writing a default file on first start so
    /// there is one to edit.
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::get_config_path()?)
    }

    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::new();
        config
            .save_to(path)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// API base URL: environment first, then the config file, then localhost.
    pub fn api_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn total_questions(&self) -> u32 {
        self.default_total_questions.unwrap_or(DEFAULT_TOTAL_QUESTIONS)
    }

    /// Chat WebSocket address for `token`.
    pub fn chat_url(&self, token: &str) -> Result<Url> {
        chat_url(&self.api_url(), token)
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("careerbot"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }

    pub fn token_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("token"))
    }
}

/// Turns an `http(s)` API base into the `ws(s)` chat endpoint with the token
/// as a query credential.
pub fn chat_url(api_url: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(api_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => bail!("unsupported API URL scheme {:?}", other),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot use {:?} as a WebSocket URL", api_url))?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), CHAT_WS_PATH);
    url.set_path(&path);
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}
