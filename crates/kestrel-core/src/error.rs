use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read snapshot file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid results pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("No snapshot files found in {}", .0.display())]
    NoSnapshots(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
