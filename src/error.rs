//! Error types for the motion core

use std::time::Duration;

use thiserror::Error;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid command `{0}`")]
    InvalidCommand(String),

    #[error("vehicle link is closed")]
    LinkClosed,

    #[error("no reply from vehicle within {0:?}")]
    Timeout(Duration),

    #[error("vehicle rejected `{command}`: {reply}")]
    Rejected { command: String, reply: String },

    #[error("bad frame: {0}")]
    Frame(String),

    #[error("detector failed: {0}")]
    Detector(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn invalid_command<S: Into<String>>(msg: S) -> Self {
        Self::InvalidCommand(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
