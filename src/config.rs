use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    /// Ordered fallback chain used for quiz generation.
    pub generation_models: Vec<String>,
    /// Ordered fallback chain used for word extraction from images.
    pub vision_models: Vec<String>,
    pub session_ttl: Duration,
    pub public_rps: u32,
    pub max_upload_bytes: usize,
    pub max_words: usize,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let openai_base_url = get_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1");
        url::Url::parse(&openai_base_url)
            .map_err(|e| Error::Config(format!("Invalid value for OPENAI_BASE_URL: {}", e)))?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            openai_api_key: get_env("OPENAI_API_KEY")?,
            openai_base_url: openai_base_url.trim_end_matches('/').to_string(),
            generation_models: get_env_list("GENERATION_MODELS", "gpt-4o,gpt-4o-mini")?,
            vision_models: get_env_list("VISION_MODELS", "gpt-4o")?,
            session_ttl: Duration::from_secs(get_env_parse_or("SESSION_TTL_SECS", 30 * 60)?),
            public_rps: get_env_parse_or("PUBLIC_RPS", 20)?,
            max_upload_bytes: get_env_parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            max_words: get_env_parse_or("MAX_WORDS", 60)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn get_env_list(name: &str, default: &str) -> Result<Vec<String>> {
    let models = parse_model_list(&get_env_or(name, default));
    if models.is_empty() {
        return Err(Error::Config(format!("{} must name at least one model", name)));
    }
    Ok(models)
}

pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
