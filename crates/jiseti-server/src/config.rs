use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use jiseti_api::Settings;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

/// Process configuration, read once at startup.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// `None` when the domain policy is disabled with `*`.
    pub email_domain: Option<String>,
    pub mail: MailConfig,
}

pub struct MailConfig {
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
    pub timeout: Duration,
    pub retries: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = optional("JISETI_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("JISETI_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let email_domain: String = try_load("JISETI_EMAIL_DOMAIN", "gmail.com")?;

        Ok(Self {
            host: try_load("JISETI_HOST", "0.0.0.0")?,
            port: try_load("JISETI_PORT", "5000")?,
            db_path: try_load("JISETI_DB_PATH", "jiseti.db")?,
            jwt_secret,
            token_ttl: token_ttl(try_load("JISETI_TOKEN_TTL_HOURS", "24")?)?,
            email_domain: (email_domain.trim() != "*").then(|| email_domain.trim().to_string()),
            mail: MailConfig {
                relay_url: optional("JISETI_MAIL_RELAY_URL"),
                api_key: optional("JISETI_MAIL_API_KEY"),
                from: try_load("JISETI_MAIL_FROM", "no-reply@jiseti.local")?,
                timeout: Duration::from_secs(try_load("JISETI_MAIL_TIMEOUT_SECS", "10")?),
                retries: try_load("JISETI_MAIL_RETRIES", "2")?,
            },
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: self.token_ttl,
            email_domain: self.email_domain.clone(),
        }
    }
}

/// One year; longer lifetimes can overflow the expiry timestamp.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

fn token_ttl(hours: i64) -> Result<chrono::Duration> {
    match chrono::Duration::try_hours(hours) {
        Some(ttl) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => Ok(ttl),
        _ => {
            warn!("Invalid JISETI_TOKEN_TTL_HOURS value: {hours}");
            bail!("JISETI_TOKEN_TTL_HOURS: {hours} is not a usable token lifetime")
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{key}: {e}")
        })
        .with_context(|| format!("environment misconfigured ({key})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_rejects_unrepresentable_hours() {
        assert_eq!(token_ttl(24).unwrap(), chrono::Duration::hours(24));
        assert!(token_ttl(i64::MAX).is_err());
        assert!(token_ttl(MAX_TOKEN_TTL_HOURS + 1).is_err());
        assert!(token_ttl(0).is_err());
        assert!(token_ttl(-3).is_err());
    }
}
