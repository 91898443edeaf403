use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use murmur_db::DbConfig;

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub env: String,
    pub db: DbConfig,
    pub invitation_ttl: chrono::Duration,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("MURMUR_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MURMUR_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let mut db = DbConfig::new(PathBuf::from(get("MURMUR_DB_PATH", "murmur.db")));
        // A pool of size zero could never hand out a connection
        db.max_open_conns = parse(&lookup, "DB_MAX_OPEN_CONNS", 25u32)?.max(1);
        db.max_idle_conns = parse(&lookup, "DB_MAX_IDLE_CONNS", 5u32)?;
        db.max_idle_time = Duration::from_secs(parse(&lookup, "DB_MAX_IDLE_TIME_SECS", 900)?);
        db.acquire_timeout = Duration::from_secs(parse(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 10)?);
        db.query_timeout = Duration::from_secs(parse(&lookup, "DB_QUERY_TIMEOUT_SECS", 5)?);

        Ok(Self {
            host: get("MURMUR_HOST", "0.0.0.0"),
            port: parse(&lookup, "MURMUR_PORT", 8080)?,
            env: get("MURMUR_ENV", "development"),
            db,
            invitation_ttl: chrono::Duration::hours(parse(
                &lookup,
                "MURMUR_INVITATION_TTL_HOURS",
                72,
            )?),
            jwt_secret,
            jwt_issuer: get("MURMUR_JWT_ISSUER", "murmur"),
            jwt_audience: get("MURMUR_JWT_AUDIENCE", "murmur"),
            jwt_ttl: chrono::Duration::hours(parse(&lookup, "MURMUR_JWT_TTL_HOURS", 72)?),
            request_timeout: Duration::from_secs(parse(&lookup, "MURMUR_REQUEST_TIMEOUT_SECS", 60)?),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
