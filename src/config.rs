use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub mongo_url: String,
    pub mongo_db: String,
    pub redis_url: String,
    pub cache_backend: String,
    pub auth_verify_url: String,
    pub tmdb_api_key: String,
    pub omdb_api_key: String,
    pub cache_ttl_items: u64,
    pub cache_ttl_tmdb: u64,
    pub cache_ttl_omdb: u64,
    pub provider_timeout_ms: u64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("APP_PORT", "3001"),
            mongo_url: try_load("MONGO_URL", "mongodb://localhost:27017"),
            mongo_db: try_load("MONGO_DB", "movielist"),
            redis_url: try_load("REDIS_URL", "redis://localhost:6379"),
            cache_backend: try_load("CACHE_BACKEND", "redis"),
            auth_verify_url: try_load("AUTH_VERIFY_URL", ""),
            tmdb_api_key: read_secret("TMDB_API_KEY"),
            omdb_api_key: read_secret("OMDB_API_KEY"),
            cache_ttl_items: try_load("CACHE_TTL_ITEMS", "300"),
            cache_ttl_tmdb: try_load("CACHE_TTL_TMDB", "86400"),
            cache_ttl_omdb: try_load("CACHE_TTL_OMDB", "86400"),
            provider_timeout_ms: try_load("PROVIDER_TIMEOUT_MS", "10000"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Reads a secret from the container secrets mount, falling back to the
/// environment so local runs work without one. Missing keys disable the
/// dependent provider rather than aborting startup.
fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    if let Ok(value) = read_to_string(&path) {
        return value.trim().to_string();
    }

    env::var(secret_name).unwrap_or_else(|_| {
        warn!("{secret_name} not configured, dependent lookups will be limited");
        String::new()
    })
}
