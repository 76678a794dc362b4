use thiserror::Error;

/// Every way an upload run can end badly. `Display` is the exact text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("No active tab found.")]
    NoActiveTarget,

    #[error("Current tab doesn't appear to be a PDF. URL must end with .pdf.")]
    NotAPdf,

    #[error("Cannot fetch PDF: {status} {status_text}")]
    FetchFailed { status: u16, status_text: String },

    #[error("{0}")]
    Transport(String),

    #[error("Upload failed: {status} - {body}")]
    UploadRejected { status: u16, body: String },
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Transport(format!("Invalid server response: {}", err))
    }
}
