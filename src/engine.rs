// ABOUTME: russh-backed implementation of the channel capability contract.
// ABOUTME: Adapts the engine's message pump to buffered byte reads.

use crate::channel::{EngineError, ExecChannel, Transport};
use crate::session::SshHandler;
use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};
use std::sync::Arc;

/// Generic engine failure code (libssh convention).
const ENGINE_FAILURE: i32 = -1;

fn engine_error(e: russh::Error) -> EngineError {
    EngineError::new(ENGINE_FAILURE, e.to_string())
}

/// Channel source over an established russh connection.
pub(crate) struct RusshTransport {
    handle: Arc<Handle<SshHandler>>,
}

impl RusshTransport {
    pub(crate) fn new(handle: Arc<Handle<SshHandler>>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn open_channel(&self) -> Result<Box<dyn ExecChannel>, EngineError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(engine_error)?;
        Ok(Box::new(RusshChannel::new(channel)))
    }
}

/// Buffer between message-sized deliveries and caller-sized reads.
#[derive(Default)]
struct Pending {
    data: Vec<u8>,
    pos: usize,
}

impl Pending {
    fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Copy as much buffered data as fits into `buf`, advancing the cursor.
    fn serve(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.pos..];
        let take = remaining.len().min(buf.len());
        buf[..take].copy_from_slice(&remaining[..take]);
        self.pos += take;
        if self.pos >= self.data.len() {
            self.data.clear();
            self.pos = 0;
        }
        take
    }
}

/// One exec channel over russh.
///
/// The engine delivers output as discrete messages; reads are served from a
/// buffer refilled by pumping the message queue. Dropping the value without
/// `close` is safe: the engine reaps dropped channels.
struct RusshChannel {
    channel: Channel<Msg>,
    pending: Pending,
    exit_status: Option<u32>,
    ended: bool,
}

impl RusshChannel {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            pending: Pending::default(),
            exit_status: None,
            ended: false,
        }
    }

    /// Absorb one stream message into the channel state.
    fn absorb(&mut self, msg: Option<ChannelMsg>) {
        match msg {
            Some(ChannelMsg::Data { data }) => {
                self.pending.push(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                // Only stdout is surfaced; stderr is read off the wire and
                // dropped.
                if ext == 1 {
                    tracing::trace!("Discarding {} bytes of stderr output", data.len());
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                self.exit_status = Some(exit_status);
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                self.ended = true;
            }
            Some(_) => {}
        }
    }
}

#[async_trait]
impl ExecChannel for RusshChannel {
    async fn exec(&mut self, command: &[u8]) -> Result<(), EngineError> {
        self.channel
            .exec(true, command.to_vec())
            .await
            .map_err(engine_error)?;

        // Wait for the server's reply to the exec request. Output can start
        // arriving before the reply, so anything delivered early is kept for
        // read().
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => {
                    return Err(EngineError::new(
                        ENGINE_FAILURE,
                        "exec request rejected by server",
                    ));
                }
                None => {
                    return Err(EngineError::new(
                        ENGINE_FAILURE,
                        "channel closed before exec was confirmed",
                    ));
                }
                msg => {
                    self.absorb(msg);
                }
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        loop {
            if !self.pending.is_empty() {
                return Ok(self.pending.serve(buf));
            }
            if self.ended {
                return Ok(0);
            }
            let msg = self.channel.wait().await;
            self.absorb(msg);
        }
    }

    async fn send_eof(&mut self) -> Result<(), EngineError> {
        self.channel.eof().await.map_err(engine_error)
    }

    async fn exit_status(&mut self) -> Result<u32, EngineError> {
        loop {
            if let Some(status) = self.exit_status {
                return Ok(status);
            }
            // The status message can trail the data stream.
            match self.channel.wait().await {
                None => {
                    return Err(EngineError::new(
                        ENGINE_FAILURE,
                        "channel closed without exit status",
                    ));
                }
                msg => {
                    self.absorb(msg);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!("Ignoring channel close failure: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_splits_across_small_buffers() {
        let mut pending = Pending::default();
        pending.push(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(pending.serve(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(pending.serve(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert!(pending.is_empty());
    }

    #[test]
    fn serve_resets_after_full_drain() {
        let mut pending = Pending::default();
        pending.push(b"xy");

        let mut buf = [0u8; 8];
        assert_eq!(pending.serve(&mut buf), 2);
        assert!(pending.is_empty());

        pending.push(b"z");
        assert_eq!(pending.serve(&mut buf), 1);
        assert_eq!(&buf[..1], b"z");
    }

    #[test]
    fn push_appends_to_unserved_data() {
        let mut pending = Pending::default();
        pending.push(b"ab");
        pending.push(b"cd");

        let mut buf = [0u8; 8];
        assert_eq!(pending.serve(&mut buf), 4);
        assert_eq!(&buf[..4], b"abcd");
    }
}
