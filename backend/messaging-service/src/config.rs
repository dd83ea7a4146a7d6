use crate::error::AppError;
use crate::services::chat_service::ChatLimits;
use dotenvy::dotenv;
use serde::Deserialize;
use std::time::Duration;

/// Upper bound on `PRESENCE_TTL_SECS`: one day
pub const MAX_PRESENCE_TTL_SECS: u64 = 86_400;

/// Where realtime events go after a successful write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeBackend {
    /// Redis PUBLISH, fanned back into every node's local registry
    #[default]
    Redis,
    /// In-process only; single-node deployments
    Local,
}

/// Service configuration, read from the environment (and `.env` when present).
///
/// Field names map to upper-case variables: `database_url` ← `DATABASE_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default)]
    pub realtime_backend: RealtimeBackend,
    /// Optional server-held secret mixed into conversation key derivation
    #[serde(default)]
    pub conversation_key_secret: Option<String>,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default = "default_presence_ttl_secs")]
    pub presence_ttl_secs: u64,
    #[serde(default = "default_presence_sweep_interval_secs")]
    pub presence_sweep_interval_secs: u64,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    #[serde(default = "default_inflight_ttl_ms")]
    pub inflight_ttl_ms: u64,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_max_message_chars() -> usize {
    2000
}

fn default_max_page_size() -> u32 {
    100
}

fn default_presence_ttl_secs() -> u64 {
    300
}

fn default_presence_sweep_interval_secs() -> u64 {
    60
}

fn default_publish_timeout_ms() -> u64 {
    500
}

fn default_inflight_ttl_ms() -> u64 {
    5_000
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let cfg: Config = envy::from_env().map_err(|e| AppError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build from explicit key/value pairs instead of the process environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let cfg: Config = envy::from_iter(pairs).map_err(|e| AppError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("DATABASE_URL is empty".into()));
        }
        if self.max_message_chars == 0 {
            return Err(AppError::Config("MAX_MESSAGE_CHARS must be positive".into()));
        }
        if self.max_page_size == 0 {
            return Err(AppError::Config("MAX_PAGE_SIZE must be positive".into()));
        }
        if self.presence_ttl_secs == 0 {
            return Err(AppError::Config("PRESENCE_TTL_SECS must be positive".into()));
        }
        if self.presence_ttl_secs > MAX_PRESENCE_TTL_SECS {
            return Err(AppError::Config(format!(
                "PRESENCE_TTL_SECS must be at most {MAX_PRESENCE_TTL_SECS}"
            )));
        }
        if self.presence_sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "PRESENCE_SWEEP_INTERVAL_SECS must be positive".into(),
            ));
        }
        if self.publish_timeout_ms == 0 {
            return Err(AppError::Config("PUBLISH_TIMEOUT_MS must be positive".into()));
        }
        if self.inflight_ttl_ms == 0 {
            return Err(AppError::Config("INFLIGHT_TTL_MS must be positive".into()));
        }
        if matches!(&self.conversation_key_secret, Some(s) if s.is_empty()) {
            return Err(AppError::Config(
                "CONVERSATION_KEY_SECRET is set but empty".into(),
            ));
        }
        Ok(())
    }

    pub fn chat_limits(&self) -> ChatLimits {
        ChatLimits {
            max_message_chars: self.max_message_chars,
            max_page_size: self.max_page_size,
            publish_timeout: self.publish_timeout(),
            inflight_ttl: Duration::from_millis(self.inflight_ttl_ms),
        }
    }

    pub fn presence_ttl(&self) -> chrono::Duration {
        let secs = self.presence_ttl_secs.min(MAX_PRESENCE_TTL_SECS);
        i64::try_from(secs).map_or(chrono::Duration::days(1), chrono::Duration::seconds)
    }

    pub fn presence_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.presence_sweep_interval_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}
