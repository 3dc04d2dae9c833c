use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::{info, warn};

/// Runtime settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub production: bool,
    pub port: u16,
    pub database_path: String,
    pub db_pool_size: u32,
    pub auth: AuthSettings,
    pub allowed_origins: Option<Vec<String>>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub frontend_url: String,
    pub storage: StorageSettings,
    pub mail: MailSettings,
}

/// Everything needed to mint and check session tokens.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub secure_cookies: bool,
}

#[derive(Clone, Debug)]
pub enum StorageSettings {
    Fs { root: String },
    S3 {
        endpoint: String,
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
    },
    Memory,
}

#[derive(Clone, Debug)]
pub enum MailBackend {
    Log,
    Webhook(String),
}

#[derive(Clone, Debug)]
pub struct MailSettings {
    pub backend: MailBackend,
    pub from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let production = env::var("RUST_ENV").map(|v| v == "production").unwrap_or(false);

        let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET must not be empty"));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").ok().map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });
        if production && allowed_origins.as_ref().map_or(true, Vec::is_empty) {
            return Err(anyhow!("ALLOWED_ORIGINS must be set in production"));
        }

        let storage = match try_load::<String>("STORAGE_BACKEND", "fs")?.as_str() {
            "fs" => StorageSettings::Fs {
                root: try_load("STORAGE_ROOT", "media")?,
            },
            "memory" => StorageSettings::Memory,
            "s3" => StorageSettings::S3 {
                endpoint: required("OBJECT_STORAGE_ENDPOINT")?,
                bucket: required("OBJECT_STORAGE_BUCKET")?,
                region: try_load("OBJECT_STORAGE_REGION", "us-east-1")?,
                access_key_id: required("OBJECT_STORAGE_ACCESS_KEY_ID")?,
                secret_access_key: required("OBJECT_STORAGE_SECRET_ACCESS_KEY")?,
            },
            other => return Err(anyhow!("Unknown STORAGE_BACKEND: {other}")),
        };

        let backend = match try_load::<String>("MAIL_BACKEND", "log")?.as_str() {
            "log" => MailBackend::Log,
            "webhook" => MailBackend::Webhook(required("MAIL_WEBHOOK_URL")?),
            other => return Err(anyhow!("Unknown MAIL_BACKEND: {other}")),
        };

        Ok(Self {
            production,
            port: try_load("PORT", "8080")?,
            database_path: try_load("DATABASE_PATH", "ayika.db")?,
            db_pool_size: try_load("DB_POOL_SIZE", "10")?,
            auth: AuthSettings {
                secret,
                issuer: env::var("JWT_ISSUER").ok(),
                audience: env::var("JWT_AUDIENCE").ok(),
                secure_cookies: production,
            },
            allowed_origins,
            rate_limit_per_second: try_load("RATE_LIMIT_PER_SECOND", "1200")?,
            rate_limit_burst: try_load("RATE_LIMIT_BURST", "2400")?,
            frontend_url: try_load("FRONTEND_URL", "http://localhost:5173")?,
            storage,
            mail: MailSettings {
                backend,
                from: try_load("MAIL_FROM", "noreply@ayika.org")?,
            },
        })
    }

    /// Development defaults around an explicit database path and secret.
    pub fn local(database_path: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            production: false,
            port: 8080,
            database_path: database_path.into(),
            db_pool_size: 4,
            auth: AuthSettings {
                secret: jwt_secret.into(),
                issuer: None,
                audience: None,
                secure_cookies: false,
            },
            allowed_origins: None,
            rate_limit_per_second: 1200,
            rate_limit_burst: 2400,
            frontend_url: "http://localhost:5173".to_string(),
            storage: StorageSettings::Memory,
            mail: MailSettings {
                backend: MailBackend::Log,
                from: "noreply@ayika.org".to_string(),
            },
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Invalid {key} value {raw:?}: {e}")
    })
}
