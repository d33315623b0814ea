use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_BASE: &str = "https://v3.football.api-sports.io";

const DEFAULT_DB_FILE: &str = "warehouse.sqlite";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
}

pub fn load() -> Result<Config> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let api_key = std::env::var("FOOTBALL_API_KEY")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .context("FOOTBALL_API_KEY is not set")?;
    let api_base = env_or("FOOTBALL_API_BASE", DEFAULT_API_BASE);
    let db_path = PathBuf::from(env_or("WAREHOUSE_DB", DEFAULT_DB_FILE));
    let request_timeout = std::env::var("FOOTBALL_API_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

    Ok(Config {
        api_key,
        api_base,
        db_path,
        request_timeout,
    })
}

pub fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => default.to_string(),
    }
}
