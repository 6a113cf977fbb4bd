// ABOUTME: Library root for skiff - a high-level SSH client over russh.
// ABOUTME: Sessions, exec result streams (eager and lazy) and SFTP transfer.

//! High-level SSH client library.
//!
//! `skiff` wraps the [`russh`] engine behind a small surface: connect and
//! authenticate a [`Session`], execute remote commands and consume their
//! output either eagerly ([`CommandResult`]) or chunk by chunk
//! ([`LazyResult`]), and move files over SFTP ([`Sftp`]). The crate
//! implements no SSH protocol internals; key exchange, ciphers and host key
//! handling belong to the engine.
//!
//! Command results are single-use values. The channel behind a result opens
//! on the first consumption call and is guaranteed to be released exactly
//! once, whether consumption completes, fails or is abandoned.
//!
//! # Example
//!
//! ```no_run
//! use skiff::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> skiff::Result<()> {
//!     let config = SessionConfig::new("server.example.com", "deploy")
//!         .password("secret");
//!     let session = Session::connect(config).await?;
//!
//!     let mut result = session.execute("uname");
//!     print!("{}", result.as_text().await?);
//!     assert_eq!(result.return_code(), Some(0));
//!
//!     let mut log = session.execute_lazy("cat /var/log/syslog");
//!     while let Some(chunk) = log.next_chunk().await? {
//!         // handle one chunk at a time
//!         drop(chunk);
//!     }
//!
//!     session.disconnect().await
//! }
//! ```

pub mod channel;
mod engine;
pub mod error;
pub mod result;
pub mod session;
pub mod sftp;

pub use channel::{EngineError, ExecChannel, Transport};
pub use error::{Error, Result};
pub use result::{CommandResult, LazyResult};
pub use session::{Session, SessionConfig};
pub use sftp::{OpenFlags, Sftp, SftpFile};

/// Connect and authenticate in one call.
pub async fn connect(config: SessionConfig) -> Result<Session> {
    Session::connect(config).await
}
