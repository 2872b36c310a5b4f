use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No visible iframe titled '{0}' appeared in time")]
    ElementNotFound(String),

    #[error("Unable to resolve the experience frame: {0}")]
    FrameResolution(String),

    #[error("Experience not rendering after {timeout_ms}ms: {detail}")]
    ReadinessTimeout { timeout_ms: u64, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
