use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// User ids allowed to mutate queues. Empty means nobody can.
    #[serde(default)]
    pub sudo_users: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Whether a skip that empties the backlog tears the call down.
    #[serde(default = "default_true")]
    pub skip_leaves_call: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            skip_leaves_call: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    /// Simulated track length in seconds.
    #[serde(default = "default_track_length")]
    pub track_length_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            track_length_secs: default_track_length(),
        }
    }
}

/// Which `StreamEngine` the server runs against. `simulated` is the
/// in-process timer engine; a real group-call bridge plugs in here.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Simulated,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
    /// Height cap passed to the yt-dlp format selector.
    #[serde(default = "default_ytdlp_max_height")]
    pub ytdlp_max_height: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_download_bytes: default_max_download_bytes(),
            ytdlp_max_height: default_ytdlp_max_height(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8090".into()
}

fn default_true() -> bool {
    true
}

fn default_track_length() -> u64 {
    180
}

fn default_download_dir() -> String {
    "./data/media".into()
}

fn default_max_download_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_ytdlp_max_height() -> u32 {
    480
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', generating defaults...", path);
            let config = Config::default();
            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(&config)?)?;
            tracing::info!("Generated default config at '{}'", path);
            config
        };

        // Environment variable overrides
        if let Ok(value) = std::env::var("CADENZA_BIND_ADDRESS") {
            config.server.bind_address = value;
        }
        if let Ok(value) = std::env::var("CADENZA_SUDO_USERS") {
            config.auth.sudo_users = value
                .split(',')
                .filter_map(|id| id.trim().parse().ok())
                .collect();
        }
        if let Ok(value) = std::env::var("CADENZA_DOWNLOAD_DIR") {
            config.media.download_dir = value;
        }
        if let Ok(value) = std::env::var("CADENZA_TRACK_LENGTH_SECS") {
            if let Ok(secs) = value.parse() {
                config.engine.track_length_secs = secs;
            }
        }

        Ok(config)
    }
}
