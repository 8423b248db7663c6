use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, anyhow};

/// Which generation service the intake forwards jobs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    Mock,
    Http,
}

impl FromStr for ServiceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "http" => Ok(Self::Http),
            other => Err(anyhow!("AI_SERVICE_MODE must be `mock` or `http`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenBackendConfig {
    pub port: u16,
    pub ai_service_url: String,
    pub ai_service_mode: ServiceMode,
    pub ai_service_timeout: Duration,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub mock_delay: Duration,
    pub max_product_images: usize,
    pub max_upload_bytes: usize,
    pub job_retention: Duration,
}

impl GenBackendConfig {
    pub fn load() -> anyhow::Result<Self> {
        load_dotenv_layers();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup instead of the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        Ok(Self {
            port,
            ai_service_url: lookup("AI_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            ai_service_mode: parse_or(&lookup, "AI_SERVICE_MODE", ServiceMode::Mock)?,
            ai_service_timeout: Duration::from_secs(parse_or(&lookup, "AI_SERVICE_TIMEOUT_SECS", 120)?),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            public_base_url,
            mock_delay: Duration::from_millis(parse_or(&lookup, "MOCK_DELAY_MS", 2000)?),
            max_product_images: parse_or(&lookup, "MAX_PRODUCT_IMAGES", 10)?,
            max_upload_bytes: parse_or::<usize>(&lookup, "MAX_UPLOAD_MB", 50)?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| anyhow!("MAX_UPLOAD_MB is too large"))?,
            job_retention: Duration::from_secs(parse_or(&lookup, "JOB_RETENTION_SECS", 3600)?),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid {key}: `{raw}`")),
        None => Ok(default),
    }
}

fn load_dotenv_layers() {
    for path in [".env", "crates/ag-backend/.env"] {
        let _ = dotenvy::from_path(path);
    }
}
