// ABOUTME: SFTP subsystem client for file transfer.
// ABOUTME: Wraps russh-sftp sessions and remote file handles.

use crate::error::{Error, Result};
use crate::session::SshHandler;
use bytes::Bytes;
use russh::client::Handle;
use russh_sftp::client::SftpSession;
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

pub use russh_sftp::protocol::OpenFlags;

/// SFTP client bound to one session.
///
/// Note that sftp must be enabled in the server's sshd_config, e.g. with a
/// `Subsystem sftp internal-sftp` line.
pub struct Sftp {
    session: SftpSession,
}

impl Sftp {
    pub(crate) async fn new(handle: &Handle<SshHandler>) -> Result<Self> {
        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let session = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Sftp(e.to_string()))?;
        Ok(Self { session })
    }

    /// Download a remote file to a local path.
    pub async fn get(&self, remote: impl Into<String>, local: impl AsRef<Path>) -> Result<()> {
        let mut remote_file = self
            .session
            .open_with_flags(remote, OpenFlags::READ)
            .await
            .map_err(|e| Error::Sftp(e.to_string()))?;
        let mut local_file = tokio::fs::File::create(local).await?;
        tokio::io::copy(&mut remote_file, &mut local_file).await?;
        local_file.flush().await?;
        Ok(())
    }

    /// Upload a local file to a remote path.
    pub async fn put(&self, local: impl AsRef<Path>, remote: impl Into<String>) -> Result<()> {
        let mut local_file = tokio::fs::File::open(local).await?;
        let mut remote_file = self
            .session
            .open_with_flags(
                remote,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| Error::Sftp(e.to_string()))?;
        tokio::io::copy(&mut local_file, &mut remote_file).await?;
        remote_file.flush().await?;
        remote_file.shutdown().await?;
        Ok(())
    }

    /// Open a remote file handle.
    pub async fn open(&self, path: impl Into<String>, flags: OpenFlags) -> Result<SftpFile> {
        let file = self
            .session
            .open_with_flags(path, flags)
            .await
            .map_err(|e| Error::Sftp(e.to_string()))?;
        Ok(SftpFile { file })
    }
}

/// An open file on the remote host.
pub struct SftpFile {
    file: russh_sftp::client::fs::File,
}

impl SftpFile {
    /// Read up to `max` bytes from the current position.
    ///
    /// Returns an empty buffer at end of file.
    pub async fn read(&mut self, max: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; max];
        let read = self.file.read(&mut buf).await?;
        buf.truncate(read);
        Ok(Bytes::from(buf))
    }

    /// Read everything from the current position to end of file.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Write all of `data` at the current position.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data).await?;
        Ok(())
    }

    /// Move the cursor to `pos` bytes from the start of the file.
    pub async fn seek(&mut self, pos: u64) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::Start(pos)).await?)
    }

    /// Current cursor position.
    pub async fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position().await?)
    }

    /// Flush pending writes and close the handle.
    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.shutdown().await?;
        Ok(())
    }
}
