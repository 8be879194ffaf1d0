//! Process configuration read from the environment

use crate::llm::DEFAULT_MODEL;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Optional gateway base URL in front of the analysis API
    pub llm_gateway: Option<String>,
    pub session_store_path: PathBuf,
    pub pdf_font_dir: PathBuf,
    pub pdf_font_family: String,
    pub pdf_output_dir: PathBuf,
    pub analysis_timeout: Duration,
    pub chunk_delay: Duration,
    /// Idle sessions older than this are evicted; `None` keeps them forever
    pub session_ttl: Option<chrono::Duration>,
    pub worker_idle: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));
        let number = |var: &'static str, default: u64| parse_or(get(var), var, default);

        let session_ttl = match get("SESSION_TTL_DAYS") {
            Some(value) => {
                let days: i64 = parse(&value, "SESSION_TTL_DAYS")?;
                if days <= 0 {
                    return Err(ConfigError::Invalid {
                        var: "SESSION_TTL_DAYS",
                        value,
                    });
                }
                Some(chrono::Duration::days(days))
            }
            None => None,
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_TOKEN")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_gateway: get("LLM_GATEWAY"),
            session_store_path: get("SESSION_STORE_PATH")
                .map_or_else(|| PathBuf::from("fsm_storage.json"), PathBuf::from),
            pdf_font_dir: get("PDF_FONT_DIR")
                .map_or_else(|| PathBuf::from("assets/fonts"), PathBuf::from),
            pdf_font_family: get("PDF_FONT_FAMILY")
                .unwrap_or_else(|| "LiberationSans".to_string()),
            pdf_output_dir: get("PDF_OUTPUT_DIR").map_or_else(
                || std::env::temp_dir().join("socionics-bot"),
                PathBuf::from,
            ),
            analysis_timeout: Duration::from_secs(number("ANALYSIS_TIMEOUT_SECS", 300)?),
            chunk_delay: Duration::from_millis(number("CHUNK_DELAY_MS", 500)?),
            session_ttl,
            worker_idle: Duration::from_secs(number("WORKER_IDLE_SECS", 600)?),
        })
    }
}

fn parse<T: FromStr>(value: &str, var: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_or<T: FromStr>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |v| parse(&v, var))
}
