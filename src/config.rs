use std::net::IpAddr;

use chrono::Duration;

use crate::engine::EngineOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub log_level: String,
    pub batch_size: i64,
    pub stale_lock_minutes: i64,
    pub max_retries: i32,
    pub tick_seconds: u64,
    pub token_secret: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::load(|key| std::env::var(key).ok())
    }

    fn load(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = required(&get, "DATABASE_URL")?;
        let token_secret = required(&get, "SEQUENCER_TOKEN_SECRET")?;

        let host: IpAddr = or_default(&get, "SEQUENCER_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_HOST: {e}"))?;

        let port: u16 = or_default(&get, "SEQUENCER_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_PORT: {e}"))?;

        let base_url = or_default(&get, "SEQUENCER_BASE_URL", &format!("http://{host}:{port}"));

        let log_level = or_default(&get, "SEQUENCER_LOG_LEVEL", "info");

        let batch_size: i64 = or_default(&get, "SEQUENCER_BATCH_SIZE", "50")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_BATCH_SIZE: {e}"))?;

        let stale_lock_minutes: i64 = or_default(&get, "SEQUENCER_STALE_LOCK_MINUTES", "10")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_STALE_LOCK_MINUTES: {e}"))?;

        let max_retries: i32 = or_default(&get, "SEQUENCER_MAX_RETRIES", "3")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_MAX_RETRIES: {e}"))?;

        // 0 disables the built-in ticker; an external scheduler hits the
        // trigger route instead.
        let tick_seconds: u64 = or_default(&get, "SEQUENCER_TICK_SECONDS", "0")
            .parse()
            .map_err(|e| format!("Invalid SEQUENCER_TICK_SECONDS: {e}"))?;

        let smtp = match (
            get("SEQUENCER_SMTP_HOST"),
            get("SEQUENCER_SMTP_PORT"),
            get("SEQUENCER_SMTP_USER"),
            get("SEQUENCER_SMTP_PASS"),
            get("SEQUENCER_SMTP_FROM"),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid SEQUENCER_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            base_url,
            log_level,
            batch_size,
            stale_lock_minutes,
            max_retries,
            tick_seconds,
            token_secret,
            smtp,
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            batch_size: self.batch_size,
            stale_lock: Duration::minutes(self.stale_lock_minutes),
            max_retries: self.max_retries,
            token_secret: self.token_secret.clone(),
        }
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, String> {
    get(key).ok_or_else(|| format!("Missing required environment variable: {key}"))
}

fn or_default(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get(key).unwrap_or_else(|| default.to_string())
}
