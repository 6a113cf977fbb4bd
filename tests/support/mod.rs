// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and a scripted in-memory transport.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use skiff::{EngineError, ExecChannel, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("skiff=debug".parse().unwrap())
            .add_directive("russh=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// One scripted read outcome.
pub enum ReadStep {
    Chunk(Vec<u8>),
    Fail(EngineError),
}

/// A scripted exec channel.
///
/// Counts every release: explicit `close` calls as well as being dropped
/// without one. Tests assert the count is exactly one.
pub struct ScriptedChannel {
    steps: VecDeque<ReadStep>,
    cursor: usize,
    exit_status: u32,
    exec_failure: Option<EngineError>,
    status_failure: Option<EngineError>,
    releases: Arc<AtomicUsize>,
    released: bool,
}

impl ScriptedChannel {
    pub fn with_output(chunks: &[&[u8]], exit_status: u32) -> Self {
        Self {
            steps: chunks
                .iter()
                .map(|chunk| ReadStep::Chunk(chunk.to_vec()))
                .collect(),
            cursor: 0,
            exit_status,
            exec_failure: None,
            status_failure: None,
            releases: Arc::new(AtomicUsize::new(0)),
            released: false,
        }
    }

    pub fn with_steps(steps: Vec<ReadStep>, exit_status: u32) -> Self {
        Self {
            steps: steps.into(),
            cursor: 0,
            exit_status,
            exec_failure: None,
            status_failure: None,
            releases: Arc::new(AtomicUsize::new(0)),
            released: false,
        }
    }

    pub fn failing_exec(error: EngineError) -> Self {
        let mut channel = Self::with_output(&[], 0);
        channel.exec_failure = Some(error);
        channel
    }

    pub fn failing_status(chunks: &[&[u8]], error: EngineError) -> Self {
        let mut channel = Self::with_output(chunks, 0);
        channel.status_failure = Some(error);
        channel
    }

    /// Share the release counter with the test.
    pub fn track_releases(mut self, counter: &Arc<AtomicUsize>) -> Self {
        self.releases = Arc::clone(counter);
        self
    }
}

#[async_trait]
impl ExecChannel for ScriptedChannel {
    async fn exec(&mut self, _command: &[u8]) -> Result<(), EngineError> {
        match self.exec_failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, EngineError> {
        loop {
            let Some(step) = self.steps.front() else {
                return Ok(0);
            };
            match step {
                ReadStep::Chunk(chunk) => {
                    let chunk_len = chunk.len();
                    if self.cursor >= chunk_len {
                        self.steps.pop_front();
                        self.cursor = 0;
                        continue;
                    }
                    let take = (chunk_len - self.cursor).min(buf.len());
                    buf[..take].copy_from_slice(&chunk[self.cursor..self.cursor + take]);
                    self.cursor += take;
                    if self.cursor >= chunk_len {
                        self.steps.pop_front();
                        self.cursor = 0;
                    }
                    return Ok(take);
                }
                ReadStep::Fail(_) => match self.steps.pop_front() {
                    Some(ReadStep::Fail(error)) => return Err(error),
                    _ => unreachable!(),
                },
            }
        }
    }

    async fn send_eof(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn exit_status(&mut self) -> Result<u32, EngineError> {
        match self.status_failure.take() {
            Some(error) => Err(error),
            None => Ok(self.exit_status),
        }
    }

    async fn close(&mut self) {
        self.released = true;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        if !self.released {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A transport handing out scripted channels in order.
pub struct ScriptedTransport {
    channels: Mutex<VecDeque<ScriptedChannel>>,
    open_failure: Option<EngineError>,
}

impl ScriptedTransport {
    pub fn new(channels: Vec<ScriptedChannel>) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(channels.into()),
            open_failure: None,
        })
    }

    pub fn single(channel: ScriptedChannel) -> Arc<Self> {
        Self::new(vec![channel])
    }

    pub fn failing_open(error: EngineError) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(VecDeque::new()),
            open_failure: Some(error),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open_channel(&self) -> Result<Box<dyn ExecChannel>, EngineError> {
        if let Some(error) = &self.open_failure {
            return Err(error.clone());
        }
        let channel = self
            .channels
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport script exhausted");
        Ok(Box::new(channel))
    }
}
