// ABOUTME: Command execution results with eager and lazy consumption.
// ABOUTME: One state machine drives the channel lifecycle for both modes.

use crate::channel::{ExecChannel, Transport};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;

/// Read buffer size for pulling command output.
const READ_CHUNK_LEN: usize = 8192;

/// Lifecycle of one remote execution.
enum State {
    /// Nothing remote has happened yet.
    NotStarted,
    /// Channel open, command dispatched, output being pulled.
    Consuming(Box<dyn ExecChannel>),
    /// Terminal. Reached at end of output and on every failure path.
    Finished,
}

/// Drives one remote command over one exclusively owned channel.
///
/// Shared by both consumption modes. Every path out of `Consuming` releases
/// the channel exactly once before the state settles on `Finished`.
struct Execution {
    transport: Arc<dyn Transport>,
    command: Vec<u8>,
    state: State,
    exit_status: Option<u32>,
}

impl Execution {
    fn new(transport: Arc<dyn Transport>, command: Vec<u8>) -> Self {
        Self {
            transport,
            command,
            state: State::NotStarted,
            exit_status: None,
        }
    }

    /// Open the channel and dispatch the command.
    ///
    /// The guard flips before the first engine call: a failed begin still
    /// counts as the one permitted consumption.
    async fn begin(&mut self) -> Result<()> {
        if !matches!(self.state, State::NotStarted) {
            return Err(Error::AlreadyConsumed);
        }
        self.state = State::Finished;

        let mut channel = self
            .transport
            .open_channel()
            .await
            .map_err(Error::ChannelOpen)?;

        if let Err(e) = channel.exec(&self.command).await {
            channel.close().await;
            return Err(Error::Dispatch(e));
        }

        self.state = State::Consuming(channel);
        Ok(())
    }

    /// Pull one chunk of output, or settle the execution at end of output.
    async fn advance(&mut self) -> Result<Option<Bytes>> {
        // Take ownership of the state so every path below settles it
        // explicitly. Only a successful partial read restores `Consuming`.
        let mut channel = match std::mem::replace(&mut self.state, State::Finished) {
            State::Consuming(channel) => channel,
            State::NotStarted | State::Finished => return Err(Error::AlreadyConsumed),
        };

        let mut buf = vec![0u8; READ_CHUNK_LEN];
        match channel.read(&mut buf).await {
            Ok(0) => {
                if let Err(e) = channel.send_eof().await {
                    tracing::debug!("Ignoring end-of-output notify failure: {}", e);
                }
                let status = channel.exit_status().await;
                channel.close().await;
                match status {
                    Ok(status) => {
                        self.exit_status = Some(status);
                        Ok(None)
                    }
                    Err(e) => Err(Error::Read(e)),
                }
            }
            Ok(read) => {
                buf.truncate(read);
                self.state = State::Consuming(channel);
                Ok(Some(Bytes::from(buf)))
            }
            Err(e) => {
                channel.close().await;
                Err(Error::Read(e))
            }
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if matches!(self.state, State::NotStarted) {
            self.begin().await?;
        }
        self.advance().await
    }

    /// Consume the whole output in one go. Requires a fresh execution.
    async fn drain(&mut self) -> Result<Vec<u8>> {
        if !matches!(self.state, State::NotStarted) {
            return Err(Error::AlreadyConsumed);
        }
        self.begin().await?;

        let mut payload = Vec::new();
        while let Some(chunk) = self.advance().await? {
            payload.extend_from_slice(&chunk);
        }
        Ok(payload)
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            State::NotStarted => "not started",
            State::Consuming(_) => "consuming",
            State::Finished => "finished",
        }
    }
}

/// Result of a remote command, consumed eagerly in one drain.
///
/// Nothing happens remotely until the first consumption call: at that point
/// the channel opens, the command dispatches, the output is drained in full,
/// the exit status is recorded and the channel is released.
pub struct CommandResult {
    exec: Execution,
}

impl CommandResult {
    /// Build a result for `command` over `transport`.
    pub fn new(transport: Arc<dyn Transport>, command: impl AsRef<[u8]>) -> Self {
        Self {
            exec: Execution::new(transport, command.as_ref().to_vec()),
        }
    }

    /// Full command output as raw bytes.
    ///
    /// Consumes the result: any further consumption call fails with
    /// [`Error::AlreadyConsumed`].
    pub async fn as_bytes(&mut self) -> Result<Bytes> {
        Ok(Bytes::from(self.exec.drain().await?))
    }

    /// Full command output decoded as UTF-8 text.
    ///
    /// Consumes the result like [`as_bytes`](Self::as_bytes). Output that is
    /// not valid UTF-8 fails with [`Error::Decode`].
    pub async fn as_text(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.exec.drain().await?)?)
    }

    /// Exit status of the remote command.
    ///
    /// `None` until consumption completed, fixed afterwards.
    pub fn return_code(&self) -> Option<u32> {
        self.exec.exit_status
    }
}

impl std::fmt::Debug for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResult")
            .field("command", &String::from_utf8_lossy(&self.exec.command))
            .field("state", &self.exec.state_name())
            .field("exit_status", &self.exec.exit_status)
            .finish()
    }
}

/// Result of a remote command, consumed lazily one chunk at a time.
///
/// The channel opens and the command dispatches on the first
/// [`next_chunk`](Self::next_chunk) call, not at construction. Chunk
/// boundaries are an implementation detail and carry no meaning.
pub struct LazyResult {
    exec: Execution,
}

impl LazyResult {
    /// Build a lazy result for `command` over `transport`.
    pub fn new(transport: Arc<dyn Transport>, command: impl AsRef<[u8]>) -> Self {
        Self {
            exec: Execution::new(transport, command.as_ref().to_vec()),
        }
    }

    /// Pull the next chunk of output.
    ///
    /// Returns `Ok(None)` once at the end of the sequence, after the exit
    /// status has been recorded and the channel released. Any call after
    /// that, and any call after a failed pull, fails with
    /// [`Error::AlreadyConsumed`].
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.exec.next_chunk().await
    }

    /// Full command output as raw bytes, drained in one go.
    ///
    /// Begins consumption, so it requires a fresh instance; once chunks have
    /// been pulled with [`next_chunk`](Self::next_chunk) this fails with
    /// [`Error::AlreadyConsumed`].
    pub async fn as_bytes(&mut self) -> Result<Bytes> {
        Ok(Bytes::from(self.exec.drain().await?))
    }

    /// Full command output decoded as UTF-8 text.
    pub async fn as_text(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.exec.drain().await?)?)
    }

    /// Exit status of the remote command.
    ///
    /// `None` until the output was fully consumed, fixed afterwards.
    pub fn return_code(&self) -> Option<u32> {
        self.exec.exit_status
    }

    /// Whether consumption has reached the terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self.exec.state, State::Finished)
    }
}

impl std::fmt::Debug for LazyResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyResult")
            .field("command", &String::from_utf8_lossy(&self.exec.command))
            .field("state", &self.exec.state_name())
            .field("exit_status", &self.exec.exit_status)
            .finish()
    }
}
