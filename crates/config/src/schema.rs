/// Config schema types (server, database, whatsapp).

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrayerwallConfig {
    pub mode: Mode,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
}

/// Operating mode. Development renders pairing QR codes in the log by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl std::str::FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("unknown mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://prayerwall.db?mode=rwc".into(),
        }
    }
}

/// WhatsApp relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// When false, submissions are stored but never relayed.
    pub enabled: bool,

    /// Target group chat id (e.g. `120363...@g.us`). Relaying is skipped when unset.
    pub group_id: Option<String>,

    /// Sled database holding the linked-device credentials and Signal state.
    pub store_path: PathBuf,

    /// Upper bound on a single outbound send.
    pub request_timeout_secs: u64,

    /// Upper bound on session teardown at shutdown.
    pub shutdown_timeout_secs: u64,

    /// Render pairing codes as terminal QR codes. Defaults to on outside production.
    pub render_qr: Option<bool>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group_id: None,
            store_path: PathBuf::from("whatsapp-session"),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            render_qr: None,
        }
    }
}

impl WhatsAppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn render_qr(&self, mode: Mode) -> bool {
        self.render_qr.unwrap_or(!mode.is_production())
    }

    /// Configured group id, ignoring blank values and `${VAR}` placeholders
    /// left behind when the variable was unset.
    pub fn target(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty() && !g.contains("${"))
    }
}
