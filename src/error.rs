use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while refreshing a cache category.
///
/// None of these ever reach a reader of the cache: each refresh task logs the
/// error once and keeps the last good snapshot.
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status} for {endpoint}")]
    Upstream { status: u16, endpoint: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process `{program}` failed: {reason}")]
    Process { program: String, reason: String },

    #[error("process `{program}` did not exit within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("no usable output in {}", path.display())]
    EmptyOutput { path: PathBuf },

    #[error("{category} refresh produced no records")]
    EmptyResult { category: &'static str },

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
