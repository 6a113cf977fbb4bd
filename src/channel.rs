// ABOUTME: Capability contract between the consumption core and an SSH engine.
// ABOUTME: Defines Transport, ExecChannel and the engine-native error type.

use async_trait::async_trait;

/// An error reported by the SSH engine, carrying its native code and message.
///
/// Codes follow the libssh convention: `-1` is the generic failure code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    /// Engine-native error code.
    pub code: i32,
    /// Engine-native error message.
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// An authenticated connection that can open remote-exec channels.
///
/// Implementations are shared read-only between any number of pending
/// executions. Each opened channel is independent.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a fresh exec channel.
    async fn open_channel(&self) -> Result<Box<dyn ExecChannel>, EngineError>;
}

/// One remote-exec channel, exclusively owned by the value consuming it.
///
/// Implementations must also release their underlying resources when dropped
/// without an explicit `close`, so abandoning a half-consumed value cannot
/// leak the channel.
#[async_trait]
pub trait ExecChannel: Send {
    /// Ask the remote side to run `command` on this channel.
    async fn exec(&mut self, command: &[u8]) -> Result<(), EngineError>;

    /// Read up to `buf.len()` bytes of command output into `buf`.
    ///
    /// Returns the number of bytes read. Zero means end of output; `buf`
    /// must not be empty.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError>;

    /// Tell the remote side that no more input will be sent.
    async fn send_eof(&mut self) -> Result<(), EngineError>;

    /// Exit status of the remote command.
    ///
    /// Available once the output has been fully drained.
    async fn exit_status(&mut self) -> Result<u32, EngineError>;

    /// Release the channel. Called at most once; drop covers abandonment.
    async fn close(&mut self);
}
