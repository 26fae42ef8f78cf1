use crate::error::BotError;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_url: String,
    pub ws_url: Option<String>,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    pub user_email: String,
    pub user_password: String,
    pub user_name: String,
    #[serde(default)]
    pub user_first_name: String,
    #[serde(default)]
    pub user_last_name: String,
    pub team_name: String,
    pub log_channel: String,
    pub main_channel: Option<String>,
    pub status_channel: Option<String>,
}

fn default_bot_name() -> String {
    "Mattermost Bot".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = config_file_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            BotError::ConfigInvalid(format!(
                "Cannot read config at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            BotError::ConfigInvalid(format!("Invalid TOML in {}: {}", config_path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            anyhow::bail!("server_url must start with http:// or https://");
        }
        if let Some(ref ws) = self.ws_url
            && !(ws.starts_with("ws://") || ws.starts_with("wss://"))
        {
            anyhow::bail!("ws_url must start with ws:// or wss://");
        }
        for (name, value) in [
            ("user_email", &self.user_email),
            ("user_password", &self.user_password),
            ("user_name", &self.user_name),
            ("team_name", &self.team_name),
            ("log_channel", &self.log_channel),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{name} must not be empty");
            }
        }
        Ok(())
    }

    /// Server URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Websocket base URL, derived from `server_url` unless set explicitly.
    pub fn effective_ws_url(&self) -> String {
        if let Some(ref ws) = self.ws_url {
            return ws.trim_end_matches('/').to_string();
        }
        let base = self.api_base();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        }
    }
}

fn config_file_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BotError::ConfigInvalid("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join("mbot-helper").join("config.toml"))
}
