//! Application-level configuration loading: limits, timing knobs and seeded sessions.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::registry::RegistrySettings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "DRILL_SYNC_CONFIG_PATH";

const DEFAULT_MAX_DURATION_SECONDS: u32 = 14_400;
const DEFAULT_MAX_NOTE_LENGTH: usize = 4_000;
const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_ROOM_GC_GRACE_MS: u64 = 300_000;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    max_duration_seconds: u32,
    max_note_length: usize,
    heartbeat_timeout: Duration,
    room_gc_grace: Duration,
    idle_timeout: Duration,
    broadcast_capacity: usize,
    content_service_url: Option<String>,
    sessions: IndexMap<String, Vec<String>>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        sessions = app_config.sessions.len(),
                        content_service = app_config.content_service_url.is_some(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Longest round a `start` may request, in seconds.
    pub fn max_duration_seconds(&self) -> u32 {
        self.max_duration_seconds
    }

    /// Longest note accepted by the relay, in characters.
    pub fn max_note_length(&self) -> usize {
        self.max_note_length
    }

    /// Grace period of a dropped participant.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// How long an empty room is kept around.
    pub fn room_gc_grace(&self) -> Duration {
        self.room_gc_grace
    }

    /// Silence after which a WebSocket is treated as dropped.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Per-room broadcast buffer.
    pub fn broadcast_capacity(&self) -> usize {
        self.broadcast_capacity
    }

    /// Base URL of the external session-content service, when one is configured.
    pub fn content_service_url(&self) -> Option<&str> {
        self.content_service_url.as_deref()
    }

    /// Sessions served by the in-memory directory, keyed by id.
    pub fn sessions(&self) -> &IndexMap<String, Vec<String>> {
        &self.sessions
    }

    /// Registry knobs derived from this configuration.
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            heartbeat_timeout: self.heartbeat_timeout,
            room_gc_grace: self.room_gc_grace,
            broadcast_capacity: self.broadcast_capacity,
        }
    }

    /// Add a session to the in-memory directory seed.
    pub fn with_session(mut self, session_id: impl Into<String>, drills: &[&str]) -> Self {
        self.sessions.insert(
            session_id.into(),
            drills.iter().map(|drill| drill.to_string()).collect(),
        );
        self
    }

    /// Override the limits enforced by the gateway.
    pub fn with_limits(mut self, max_duration_seconds: u32, max_note_length: usize) -> Self {
        self.max_duration_seconds = max_duration_seconds;
        self.max_note_length = max_note_length;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_duration_seconds: u32,
    max_note_length: usize,
    heartbeat_timeout_ms: u64,
    room_gc_grace_ms: u64,
    idle_timeout_ms: u64,
    broadcast_capacity: usize,
    content_service_url: Option<String>,
    sessions: Vec<RawSession>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS,
            max_note_length: DEFAULT_MAX_NOTE_LENGTH,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            room_gc_grace_ms: DEFAULT_ROOM_GC_GRACE_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            content_service_url: None,
            sessions: Vec::new(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let sessions = value
            .sessions
            .into_iter()
            .map(|session| (session.id, session.drills))
            .collect();
        Self {
            max_duration_seconds: value.max_duration_seconds.max(1),
            max_note_length: value.max_note_length,
            heartbeat_timeout: Duration::from_millis(value.heartbeat_timeout_ms),
            room_gc_grace: Duration::from_millis(value.room_gc_grace_ms),
            idle_timeout: Duration::from_millis(value.idle_timeout_ms.max(1_000)),
            broadcast_capacity: value.broadcast_capacity.max(1),
            content_service_url: value
                .content_service_url
                .filter(|url| !url.trim().is_empty()),
            sessions,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a seeded session.
struct RawSession {
    id: String,
    #[serde(default)]
    drills: Vec<String>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
