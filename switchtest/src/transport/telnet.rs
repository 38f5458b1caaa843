//! Telnet transport implementation.
//!
//! Minimal RFC 854 support: option negotiation is answered (refusing
//! everything except suppress-go-ahead), IAC sequences are filtered out
//! of the data stream, and the Cisco-style login dance is handled
//! during connect.

use std::time::Duration;

use log::{debug, info, warn};
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Transport, TransportState};
use crate::channel::{patterns, PromptBuffer};
use crate::config::TelnetSettings;
use crate::error::TransportError;

// Telnet protocol bytes (RFC 854)
const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_SUPPRESS_GO_AHEAD: u8 = 3;

/// Telnet console transport.
pub struct TelnetTransport {
    settings: TelnetSettings,
    state: TransportState,
    stream: Option<TcpStream>,
    buffer: PromptBuffer,
    prompt: regex::bytes::Regex,
    /// Carry-over for an IAC sequence split across reads.
    pending_iac: Vec<u8>,
}

impl TelnetTransport {
    /// Create a new telnet transport in the `Disconnected` state.
    pub fn new(settings: TelnetSettings) -> Self {
        Self {
            settings,
            state: TransportState::Disconnected,
            stream: None,
            buffer: PromptBuffer::default(),
            prompt: patterns::any_command_prompt(),
            pending_iac: Vec::new(),
        }
    }

    async fn establish(&mut self) -> Result<(), TransportError> {
        let timeout = self.settings.timeout_duration();
        let addr = (self.settings.host.as_str(), self.settings.port);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(timeout))?
            .map_err(|e| TransportError::ConnectionFailed {
                host: self.settings.host.clone(),
                port: self.settings.port,
                source: e,
            })?;
        self.stream = Some(stream);

        self.login(timeout).await?;

        // Enable mode is attempted but not required: some lab consoles
        // land directly in privileged EXEC.
        if let Err(e) = self.enter_enable_mode(timeout).await {
            debug!("enable mode not entered: {e}");
        }

        Ok(())
    }

    /// Walk the login sequence: username and password prompts, the
    /// "Press RETURN to get started" banner, and the initial
    /// configuration dialog of a factory-fresh switch.
    async fn login(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let next = patterns::prompt_or_login();
        let mut output = self.read_until(&next, timeout).await?;

        if output.contains("Press RETURN to get started") {
            self.write_raw(b"\r\n").await?;
            output = self.read_until(&next, timeout).await?;
        }
        if output.contains("Initial configuration dialog") {
            self.write_line("no").await?;
            output = self.read_until(&next, timeout).await?;
        }

        if regex_matches(patterns::USERNAME_PROMPT, &output) {
            let username = self.settings.username.clone().ok_or_else(|| {
                TransportError::AuthenticationFailed {
                    user: "<none>".to_string(),
                }
            })?;
            self.write_line(&username).await?;
            output = self.read_until(&next, timeout).await?;
        }

        if regex_matches(patterns::PASSWORD_PROMPT, &output) {
            let password = self
                .settings
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            self.write_line(&password).await?;
            self.read_until(&next, timeout).await?;
        }

        Ok(())
    }

    /// Try to escalate to privileged EXEC mode.
    async fn enter_enable_mode(&mut self, timeout: Duration) -> Result<(), TransportError> {
        self.write_line("enable").await?;
        let next = patterns::prompt_or_login();
        let output = self.read_until(&next, timeout).await?;

        if regex_matches(patterns::PASSWORD_PROMPT, &output) {
            // Answer with the login password, or a bare return when the
            // console has no enable secret set.
            let password = self
                .settings
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            self.write_line(&password).await?;
            self.read_until(&next, timeout).await?;
        }
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let payload = format!("{line}\r\n");
        self.write_raw(payload.as_bytes()).await
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(data).await?;
        Ok(())
    }

    /// Read until `pattern` matches in the buffer tail or `wait`
    /// elapses, filtering and answering telnet negotiation inline.
    async fn read_until(
        &mut self,
        pattern: &regex::bytes::Regex,
        wait: Duration,
    ) -> Result<String, TransportError> {
        let deadline = tokio::time::Instant::now() + wait;
        let mut chunk = [0u8; 1024];

        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            let n = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
                Err(_elapsed) => {
                    self.buffer.clear();
                    return Err(TransportError::CommandTimeout(wait));
                }
                Ok(Ok(0)) => {
                    self.buffer.clear();
                    return Err(TransportError::Closed);
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    self.buffer.clear();
                    return Err(TransportError::Io(e));
                }
            };

            let (clean, replies) = self.filter_telnet(&chunk[..n]);
            if !replies.is_empty() {
                self.write_raw(&replies).await?;
            }
            self.buffer.extend(&clean);
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take_string());
            }
        }
    }

    /// Strip IAC sequences from `data`, producing the clean application
    /// bytes and the negotiation replies owed to the server.
    fn filter_telnet(&mut self, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut input = std::mem::take(&mut self.pending_iac);
        input.extend_from_slice(data);

        let mut clean = Vec::with_capacity(input.len());
        let mut replies = Vec::new();
        let mut i = 0;

        while i < input.len() {
            if input[i] != IAC {
                clean.push(input[i]);
                i += 1;
                continue;
            }

            // Incomplete sequence at the end of the chunk: keep for the
            // next read.
            if i + 1 >= input.len() {
                self.pending_iac = input[i..].to_vec();
                break;
            }

            match input[i + 1] {
                IAC => {
                    // Escaped 0xff data byte.
                    clean.push(IAC);
                    i += 2;
                }
                DO | DONT | WILL | WONT => {
                    if i + 2 >= input.len() {
                        self.pending_iac = input[i..].to_vec();
                        break;
                    }
                    let (command, option) = (input[i + 1], input[i + 2]);
                    match command {
                        DO if option == OPT_SUPPRESS_GO_AHEAD => {
                            replies.extend_from_slice(&[IAC, WILL, option]);
                        }
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        WILL if option == OPT_SUPPRESS_GO_AHEAD => {
                            replies.extend_from_slice(&[IAC, DO, option]);
                        }
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        _ => {}
                    }
                    i += 3;
                }
                SB => {
                    // Skip subnegotiation up to IAC SE.
                    match find_subneg_end(&input[i..]) {
                        Some(len) => i += len,
                        None => {
                            self.pending_iac = input[i..].to_vec();
                            break;
                        }
                    }
                }
                _ => {
                    // Two-byte command we do not act on.
                    i += 2;
                }
            }
        }

        (clean, replies)
    }
}

fn find_subneg_end(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w == [IAC, SE])
        .map(|pos| pos + 2)
}

fn regex_matches(pattern: &str, text: &str) -> bool {
    patterns::compile_prompt_pattern(pattern)
        .map(|re| re.is_match(text.as_bytes()))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl Transport for TelnetTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Connected {
            return Ok(());
        }
        info!(
            "connecting to {}:{} via telnet",
            self.settings.host, self.settings.port
        );
        self.state = TransportState::Connecting;

        match self.establish().await {
            Ok(()) => {
                self.state = TransportState::Connected;
                info!("telnet session established to {}", self.settings.host);
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Faulted;
                self.stream = None;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("telnet shutdown failed: {e}");
            }
        }
        self.pending_iac.clear();
        self.buffer.clear();
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    async fn send_command(&mut self, command: &str, wait: Duration) -> Result<String, TransportError> {
        if self.state != TransportState::Connected {
            return Err(TransportError::NotConnected);
        }

        debug!("telnet send: {command}");
        if let Err(e) = self.write_line(command).await {
            self.state = TransportState::Faulted;
            return Err(e);
        }

        let prompt = self.prompt.clone();
        match self.read_until(&prompt, wait).await {
            Ok(output) => Ok(output),
            Err(e @ TransportError::CommandTimeout(_)) => Err(e),
            Err(e) => {
                self.state = TransportState::Faulted;
                Err(e)
            }
        }
    }

    fn endpoint(&self) -> String {
        format!("telnet://{}:{}", self.settings.host, self.settings.port)
    }
}
