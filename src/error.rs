// ABOUTME: Crate-wide error types.
// ABOUTME: Covers consumption, connection, authentication and transfer failures.

use crate::channel::EngineError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("result already consumed")]
    AlreadyConsumed,

    #[error("failed to open channel: {0}")]
    ChannelOpen(#[source] EngineError),

    #[error("failed to dispatch command: {0}")]
    Dispatch(#[source] EngineError),

    #[error("read failed: {0}")]
    Read(#[source] EngineError),

    #[error("output is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: no valid credentials")]
    AuthenticationFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("sftp error: {0}")]
    Sftp(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
