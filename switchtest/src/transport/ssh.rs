//! SSH transport implementation using russh.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::{Transport, TransportState};
use crate::channel::{patterns, PromptBuffer};
use crate::config::SshSettings;
use crate::error::TransportError;

/// SSH console transport.
///
/// Opens a PTY shell channel after password authentication, mirroring
/// an operator session rather than exec-style command channels — switch
/// CLIs keep mode state (config, interface) across commands, so one
/// long-lived shell is required.
pub struct SshTransport {
    settings: SshSettings,
    state: TransportState,
    session: Option<Handle<SshHandler>>,
    channel: Option<Channel<Msg>>,
    buffer: PromptBuffer,
    prompt: regex::bytes::Regex,
}

impl SshTransport {
    /// Create a new SSH transport in the `Disconnected` state.
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            state: TransportState::Disconnected,
            session: None,
            channel: None,
            buffer: PromptBuffer::default(),
            prompt: patterns::any_command_prompt(),
        }
    }

    async fn establish(&mut self) -> Result<(), TransportError> {
        let timeout = self.settings.timeout_duration();
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let addr = (self.settings.host.as_str(), self.settings.port);
        let mut session = tokio::time::timeout(timeout, client::connect(ssh_config, addr, SshHandler))
            .await
            .map_err(|_| TransportError::ConnectTimeout(timeout))?
            .map_err(TransportError::Ssh)?;

        let authenticated = session
            .authenticate_password(
                &self.settings.username,
                self.settings.password.expose_secret(),
            )
            .await
            .map_err(TransportError::Ssh)?
            .success();
        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: self.settings.username.clone(),
            });
        }

        let channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_pty(true, "xterm", 511, 24, 0, 0, &[])
            .await
            .map_err(TransportError::Ssh)?;
        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        self.session = Some(session);
        self.channel = Some(channel);

        // Consume the login banner and sync to the first prompt.
        self.read_until_prompt(timeout).await?;

        if self.settings.enable_password.is_some() {
            self.enter_enable_mode(timeout).await?;
        }

        Ok(())
    }

    /// Escalate to privileged EXEC mode with the configured enable
    /// password.
    async fn enter_enable_mode(&mut self, timeout: Duration) -> Result<(), TransportError> {
        debug!("entering enable mode on {}", self.settings.host);
        self.write_line("enable").await?;

        let next = patterns::prompt_or_login();
        let output = self.read_until_any(&next, timeout).await?;

        if patterns::login_prompt().is_match(output.as_bytes()) {
            let password = self
                .settings
                .enable_password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            self.write_line(&password).await?;
            self.read_until_prompt(timeout).await?;
        }
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let channel = self.channel.as_mut().ok_or(TransportError::NotConnected)?;
        let payload = format!("{line}\r\n");
        channel
            .data(payload.as_bytes())
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read_until_prompt(&mut self, wait: Duration) -> Result<String, TransportError> {
        let prompt = self.prompt.clone();
        self.read_until_any(&prompt, wait).await
    }

    /// Read channel data until `pattern` matches in the buffer tail or
    /// the deadline expires.
    async fn read_until_any(
        &mut self,
        pattern: &regex::bytes::Regex,
        wait: Duration,
    ) -> Result<String, TransportError> {
        let channel = self.channel.as_mut().ok_or(TransportError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let msg = match tokio::time::timeout_at(deadline, channel.wait()).await {
                Err(_elapsed) => {
                    self.buffer.clear();
                    return Err(TransportError::CommandTimeout(wait));
                }
                Ok(None) => {
                    self.buffer.clear();
                    return Err(TransportError::Closed);
                }
                Ok(Some(msg)) => msg,
            };

            match msg {
                ChannelMsg::Data { ref data } => {
                    self.buffer.extend(data);
                    if self.buffer.tail_contains(pattern) {
                        return Ok(self.buffer.take_string());
                    }
                }
                ChannelMsg::ExtendedData { ref data, .. } => {
                    self.buffer.extend(data);
                }
                ChannelMsg::Eof | ChannelMsg::Close => {
                    self.buffer.clear();
                    return Err(TransportError::Closed);
                }
                _ => {}
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for SshTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Connected {
            return Ok(());
        }
        info!(
            "connecting to {}:{} via ssh",
            self.settings.host, self.settings.port
        );
        self.state = TransportState::Connecting;

        match self.establish().await {
            Ok(()) => {
                self.state = TransportState::Connected;
                info!("ssh session established to {}", self.settings.host);
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Faulted;
                self.session = None;
                self.channel = None;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.eof().await {
                debug!("ssh channel eof during teardown: {e}");
            }
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
            {
                warn!("ssh disconnect failed: {e}");
            }
        }
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn send_command(&mut self, command: &str, wait: Duration) -> Result<String, TransportError> {
        if self.state != TransportState::Connected {
            return Err(TransportError::NotConnected);
        }

        debug!("ssh send: {command}");
        if let Err(e) = self.write_line(command).await {
            self.state = TransportState::Faulted;
            return Err(e);
        }

        match self.read_until_prompt(wait).await {
            Ok(output) => Ok(output),
            Err(e @ TransportError::CommandTimeout(_)) => Err(e),
            Err(e) => {
                // Closed channel or protocol error breaks the session.
                self.state = TransportState::Faulted;
                Err(e)
            }
        }
    }

    fn endpoint(&self) -> String {
        format!("ssh://{}:{}", self.settings.host, self.settings.port)
    }
}

/// russh client handler. Host keys are accepted unconditionally: the
/// framework talks to lab devices that get re-imaged between runs.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
