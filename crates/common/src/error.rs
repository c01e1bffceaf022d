use thiserror::Error;

/// Fatal errors: any of these aborts the run before a single reminder is sent.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to load recipients from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed recipient list: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid schedule for {recipient}: {message}")]
    Schedule { recipient: String, message: String },

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
