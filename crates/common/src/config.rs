use serde::Deserialize;

use crate::types::DedupMode;

const DEFAULT_RECIPIENTS_PATH: &str = "customers.csv";
const DEFAULT_REMINDER_ENDPOINT: &str = "http://127.0.0.1:9090/messages";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path to the CSV recipient list (default: customers.csv)
    pub recipients_path: String,

    /// URI every reminder is POSTed to
    pub reminder_endpoint: String,

    /// Per-call HTTP timeout in milliseconds (default: 1000)
    pub request_timeout_ms: u64,

    /// Cap on concurrent remote calls. `None` keeps the unbounded fan-out.
    pub max_in_flight: Option<usize>,

    /// Whether tasks sharing a payload may race past the cache check
    pub dedup_mode: DedupMode,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            recipients_path: std::env::var("RECIPIENTS_PATH")
                .unwrap_or_else(|_| DEFAULT_RECIPIENTS_PATH.to_string()),
            reminder_endpoint: std::env::var("REMINDER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_REMINDER_ENDPOINT.to_string()),
            request_timeout_ms: match std::env::var("REQUEST_TIMEOUT_MS") {
                Ok(raw) => parse_timeout_ms(&raw)?,
                Err(_) => 1000,
            },
            max_in_flight: match std::env::var("MAX_IN_FLIGHT") {
                Ok(raw) => parse_max_in_flight(&raw)?,
                Err(_) => None,
            },
            dedup_mode: std::env::var("DEDUP_MODE")
                .unwrap_or_else(|_| "best_effort".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("DEDUP_MODE: {e}"))?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recipients_path: DEFAULT_RECIPIENTS_PATH.to_string(),
            reminder_endpoint: DEFAULT_REMINDER_ENDPOINT.to_string(),
            request_timeout_ms: 1000,
            max_in_flight: None,
            dedup_mode: DedupMode::BestEffort,
        }
    }
}

/// A zero timeout would fail every call, so it is rejected.
fn parse_timeout_ms(raw: &str) -> anyhow::Result<u64> {
    let timeout: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("REQUEST_TIMEOUT_MS must be a valid u64"))?;
    if timeout == 0 {
        anyhow::bail!("REQUEST_TIMEOUT_MS must be greater than zero");
    }
    Ok(timeout)
}

/// `0` and the empty string both mean "no limit".
fn parse_max_in_flight(raw: &str) -> anyhow::Result<Option<usize>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let limit: usize = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("MAX_IN_FLIGHT must be a valid usize"))?;
    Ok((limit > 0).then_some(limit))
}
