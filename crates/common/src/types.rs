use serde::{Deserialize, Deserializer, Serialize};

/// A customer who should be reminded until the endpoint reports them as paid.
///
/// The serialized form doubles as the dedup key, so field order matters:
/// two records with identical fields always encode to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    pub email: String,
    pub text: String,
    /// Delay offsets such as `5s-30s-120s`
    pub schedule: String,
    #[serde(default, deserialize_with = "empty_as_false")]
    pub paid: bool,
}

impl RecipientRecord {
    pub fn new(
        email: impl Into<String>,
        text: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            text: text.into(),
            schedule: schedule.into(),
            paid: false,
        }
    }

    /// Canonical payload sent to the endpoint and used as the dedup key.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn empty_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// What the endpoint answers with. Only `paid` is read; everything else is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentAck {
    #[serde(default)]
    pub paid: bool,
}

impl PaymentAck {
    /// Decode a response body, treating anything unreadable as "not paid".
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

/// How a single delivery task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered; `paid` is the decoded flag.
    Acknowledged { paid: bool, status: u16 },
    /// The payload was already acknowledged as paid, no call was made.
    ShortCircuited,
    /// Transport error or timeout.
    Failed { reason: String },
    /// The task panicked or was cancelled before reporting.
    Aborted { reason: String },
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acknowledged { .. } => "acknowledged",
            DeliveryOutcome::ShortCircuited => "short_circuited",
            DeliveryOutcome::Failed { .. } => "failed",
            DeliveryOutcome::Aborted { .. } => "aborted",
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Acknowledged { paid, status } => {
                write!(f, "acknowledged (status {status}, paid={paid})")
            }
            DeliveryOutcome::ShortCircuited => write!(f, "short_circuited"),
            DeliveryOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            DeliveryOutcome::Aborted { reason } => write!(f, "aborted: {reason}"),
        }
    }
}

/// Deduplication strength for tasks sharing a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Tasks already past the cache check when the first ack lands still call out.
    #[default]
    BestEffort,
    /// Cache check, remote call and cache write run under one per-payload lock.
    Strict,
}

impl std::fmt::Display for DedupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupMode::BestEffort => write!(f, "best_effort"),
            DedupMode::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for DedupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(DedupMode::BestEffort),
            "strict" => Ok(DedupMode::Strict),
            other => Err(format!("unknown dedup mode '{other}'")),
        }
    }
}
