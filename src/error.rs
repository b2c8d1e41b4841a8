use std::path::PathBuf;

/// Failures on the capture path. None of these escape the chapter engine:
/// they are logged and folded into its boolean result.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("element `{id}` did not become visible within {timeout_secs}s")]
    ElementNotFound { id: String, timeout_secs: u64 },

    #[error("element `{id}` disappeared from the page")]
    ElementDetached { id: String },

    #[error("element `{id}` has invalid geometry {width}x{height}")]
    InvalidGeometry { id: String, width: f64, height: f64 },

    #[error("invalid crop region: left {left} top {top} right {right} bottom {bottom}")]
    InvalidCropRegion {
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
    },

    #[error("timed out waiting for the reader to advance ({stage})")]
    NavigationTimeout { stage: &'static str },

    #[error("browser session error: {0:#}")]
    Session(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("read ledger {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse ledger {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ledger {path} must be a JSON object of chapter groups")]
    NotAnObject { path: PathBuf },

    #[error("write ledger {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
