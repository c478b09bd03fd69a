use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::info;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub storage_dir: PathBuf,
    pub completions_base_url: String,
    pub completions_api_key: Option<String>,
    pub completions_model: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set to a production Postgres instance")?,
            max_connections: try_load("PORTAL_DB_MAX_CONNECTIONS", "5")?,
            storage_dir: try_load("PORTAL_STORAGE_DIR", "./storage")?,
            completions_base_url: try_load("COMPLETIONS_BASE_URL", "https://api.openai.com/v1")?,
            completions_api_key: env::var("COMPLETIONS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            completions_model: try_load("COMPLETIONS_MODEL", "gpt-4.1-nano")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}
