// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, authentication and command execution entry points.

use crate::engine::RusshTransport;
use crate::error::{Error, Result};
use crate::result::{CommandResult, LazyResult};
use crate::sftp::Sftp;
use russh::Disconnect;
use russh::client::{self, Config, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Configuration for establishing an SSH session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Optional password. When set, password authentication is tried first.
    pub password: Option<String>,
    /// Optional path to private key file.
    /// If None, will try SSH agent then default key locations.
    pub key_path: Option<PathBuf>,
    /// Optional passphrase for encrypted private keys.
    pub passphrase: Option<String>,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            password: None,
            key_path: None,
            passphrase: None,
            trust_on_first_use: false,
            known_hosts_path: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("trust_on_first_use", &self.trust_on_first_use)
            .field("known_hosts_path", &self.known_hosts_path)
            .finish()
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(
        host: String,
        port: u16,
        trust_on_first_use: bool,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            host,
            port,
            trust_on_first_use,
            known_hosts_path,
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) => {
                // Host not in known_hosts
                if self.trust_on_first_use {
                    tracing::warn!(
                        "Trust-On-First-Use: accepting unknown host key for {}:{}",
                        self.host,
                        self.port
                    );
                    let learn_result = match &self.known_hosts_path {
                        Some(path) => {
                            learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                        }
                        None => learn_known_hosts(&self.host, self.port, server_public_key),
                    };
                    if let Err(e) = learn_result {
                        tracing::warn!("Failed to save host key to known_hosts: {}", e);
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(russh::keys::Error::KeyChanged { .. }) => Ok(false),
            Err(_) => {
                // Other errors - treat as unknown host
                if self.trust_on_first_use {
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

/// Authentication method resolved from config.
enum AuthMethod {
    Password(String),
    Agent(AgentClient<UnixStream>),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

/// An established SSH session.
///
/// Result values returned by [`execute`](Self::execute) and
/// [`execute_lazy`](Self::execute_lazy) hold their own shared reference to
/// the connection; each one opens and exclusively owns its private channel,
/// so concurrent executions on one session do not interfere.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<SshHandler>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        // Resolve authentication method
        let auth_method = Self::resolve_auth_method(&config).await?;

        // Configure client
        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.trust_on_first_use,
            config.known_hosts_path.clone(),
        );

        // Connect
        let mut session = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("Connection refused") {
                Error::Connection(format!(
                    "connection refused to {}:{}",
                    config.host, config.port
                ))
            } else {
                Error::Connection(e.to_string())
            }
        })?;

        // Authenticate
        let auth_success = Self::authenticate(&mut session, &config, auth_method).await?;
        if !auth_success {
            return Err(Error::AuthenticationFailed);
        }

        tracing::debug!("Connected to {}:{}", config.host, config.port);

        Ok(Self {
            config,
            handle: Arc::new(session),
        })
    }

    /// Resolve which authentication method to use.
    async fn resolve_auth_method(config: &SessionConfig) -> Result<AuthMethod> {
        // Password wins when configured
        if let Some(password) = &config.password {
            return Ok(AuthMethod::Password(password.clone()));
        }

        // If key path specified, use that
        if let Some(key_path) = &config.key_path {
            let key = load_secret_key(key_path, config.passphrase.as_deref()).map_err(|e| {
                Error::KeyLoadFailed {
                    path: key_path.clone(),
                    reason: e.to_string(),
                }
            })?;
            return Ok(AuthMethod::KeyFile(Arc::new(key)));
        }

        // Try SSH agent
        if let Ok(agent) = AgentClient::connect_env().await {
            return Ok(AuthMethod::Agent(agent));
        }

        // Fall back to default key locations
        let home = std::env::var("HOME").map_err(|_| {
            Error::AgentUnavailable("SSH agent not available and HOME not set".to_string())
        })?;

        let default_keys = [
            format!("{}/.ssh/id_ed25519", home),
            format!("{}/.ssh/id_rsa", home),
            format!("{}/.ssh/id_ecdsa", home),
        ];

        for key_path in &default_keys {
            if let Ok(key) = load_secret_key(key_path, config.passphrase.as_deref()) {
                return Ok(AuthMethod::KeyFile(Arc::new(key)));
            }
        }

        Err(Error::AgentUnavailable(
            "SSH agent not available and no default keys found".to_string(),
        ))
    }

    /// Authenticate the session.
    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SessionConfig,
        auth_method: AuthMethod,
    ) -> Result<bool> {
        match auth_method {
            AuthMethod::Password(password) => {
                let result = session
                    .authenticate_password(&config.username, password)
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            AuthMethod::Agent(mut agent) => {
                let keys = agent.request_identities().await.map_err(|e| {
                    Error::AgentUnavailable(format!("failed to list agent keys: {}", e))
                })?;

                if keys.is_empty() {
                    return Err(Error::AgentUnavailable("no keys in SSH agent".to_string()));
                }

                for key in &keys {
                    match session
                        .authenticate_publickey_with(&config.username, key.clone(), None, &mut agent)
                        .await
                    {
                        Ok(result) if result.success() => return Ok(true),
                        _ => continue,
                    }
                }
                Ok(false)
            }
            AuthMethod::KeyFile(key) => {
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(key, hash_alg),
                    )
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    fn transport(&self) -> Arc<RusshTransport> {
        Arc::new(RusshTransport::new(Arc::clone(&self.handle)))
    }

    /// Execute a command, returning an eagerly consumable result.
    ///
    /// Returns immediately; the channel opens and the command dispatches on
    /// the first consumption call.
    pub fn execute(&self, command: impl AsRef<[u8]>) -> CommandResult {
        CommandResult::new(self.transport(), command)
    }

    /// Execute a command, returning a lazily consumable result.
    ///
    /// Returns immediately; the channel opens and the command dispatches on
    /// the first chunk pull.
    pub fn execute_lazy(&self, command: impl AsRef<[u8]>) -> LazyResult {
        LazyResult::new(self.transport(), command)
    }

    /// Open the SFTP subsystem on this session.
    pub async fn sftp(&self) -> Result<Sftp> {
        Sftp::new(&self.handle).await
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_port_22_and_no_credentials() {
        let config = SessionConfig::new("example.com", "deploy");

        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, 22);
        assert_eq!(config.username, "deploy");
        assert!(config.password.is_none());
        assert!(config.key_path.is_none());
        assert!(config.passphrase.is_none());
        assert!(!config.trust_on_first_use);
        assert!(config.known_hosts_path.is_none());
    }

    #[test]
    fn config_builder_chains() {
        let config = SessionConfig::new("example.com", "deploy")
            .port(2222)
            .password("pw")
            .key_path("/tmp/id_ed25519")
            .passphrase("phrase")
            .trust_on_first_use(true)
            .known_hosts_path("/tmp/known_hosts");

        assert_eq!(config.port, 2222);
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.key_path.as_deref(), Some("/tmp/id_ed25519".as_ref()));
        assert_eq!(config.passphrase.as_deref(), Some("phrase"));
        assert!(config.trust_on_first_use);
        assert_eq!(
            config.known_hosts_path.as_deref(),
            Some("/tmp/known_hosts".as_ref())
        );
    }

    #[test]
    fn config_debug_redacts_secrets() {
        let config = SessionConfig::new("example.com", "deploy")
            .password("topsecret")
            .passphrase("alsosecret");

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("alsosecret"));
        assert!(rendered.contains("<redacted>"));
    }
}
