//! Transport layer for switch console sessions.
//!
//! Three physically different media — SSH, Telnet, and serial console —
//! implement one capability set, so every upper layer is written once
//! and stays oblivious to the transport in use. Selection happens at
//! construction time in [`create`].

mod serial;
mod ssh;
mod telnet;

pub use serial::SerialTransport;
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::channel::PromptBuffer;
use crate::config::{ConnectionConfig, ConnectionType};
use crate::error::{ConfigError, TransportError};

/// Connection lifecycle state.
///
/// `Faulted` is not terminal: the owning [`ConnectionManager`]
/// (`crate::connection`) retries a faulted transport back through
/// `Connecting` up to its bounded attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No session open.
    Disconnected,
    /// Session setup (handshake, login) in progress.
    Connecting,
    /// Session established, prompt observed.
    Connected,
    /// An I/O error broke the session.
    Faulted,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

/// Common contract for all console transports.
#[async_trait]
pub trait Transport: Send {
    /// Open the session: socket handshake and login for the network
    /// transports, device open and prompt sync for serial.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Best-effort graceful close. Never fails; teardown problems are
    /// logged and swallowed so they cannot prevent resource release.
    async fn disconnect(&mut self);

    /// Pure state query, no I/O.
    fn is_connected(&self) -> bool {
        self.state() == TransportState::Connected
    }

    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// Write `command` terminated by a line break, then read until the
    /// prompt pattern is observed or `wait` elapses. Returns the
    /// accumulated text; times out with
    /// [`TransportError::CommandTimeout`], never an empty success.
    async fn send_command(&mut self, command: &str, wait: Duration) -> Result<String, TransportError>;

    /// Human-readable endpoint description for logging.
    fn endpoint(&self) -> String;
}

/// Construct the transport selected by `connection_type`.
///
/// Validates the discriminator and the transport-specific required
/// fields; performs no I/O. The returned transport starts in
/// [`TransportState::Disconnected`] — connecting is deferred to the
/// connection manager so the retry policy lives in one place.
pub fn create(config: &ConnectionConfig) -> Result<Box<dyn Transport>, ConfigError> {
    match config.connection_type()? {
        ConnectionType::Ssh => {
            let settings = config
                .ssh
                .as_ref()
                .ok_or(ConfigError::MissingSection { section: "ssh" })?;
            if settings.host.is_empty() {
                return Err(ConfigError::MissingField {
                    section: "ssh",
                    field: "host",
                });
            }
            if settings.username.is_empty() {
                return Err(ConfigError::MissingField {
                    section: "ssh",
                    field: "username",
                });
            }
            Ok(Box::new(SshTransport::new(settings.clone())))
        }
        ConnectionType::Telnet => {
            let settings = config
                .telnet
                .as_ref()
                .ok_or(ConfigError::MissingSection { section: "telnet" })?;
            if settings.host.is_empty() {
                return Err(ConfigError::MissingField {
                    section: "telnet",
                    field: "host",
                });
            }
            Ok(Box::new(TelnetTransport::new(settings.clone())))
        }
        ConnectionType::Serial => {
            let settings = config
                .serial
                .as_ref()
                .ok_or(ConfigError::MissingSection { section: "serial" })?;
            if settings.port.is_empty() {
                return Err(ConfigError::MissingField {
                    section: "serial",
                    field: "port",
                });
            }
            if settings.baudrate == 0 {
                return Err(ConfigError::InvalidField {
                    section: "serial",
                    field: "baudrate",
                    reason: "must be a positive integer".to_string(),
                });
            }
            Ok(Box::new(SerialTransport::new(settings.clone())))
        }
    }
}

/// Read from `reader` into `buffer` until the prompt pattern matches in
/// the buffer tail or `wait` elapses.
///
/// Shared by the stream-shaped transports. The deadline covers the
/// whole read, not each chunk, so a device trickling output without
/// ever printing a prompt still times out.
pub(crate) async fn read_until_prompt<R>(
    reader: &mut R,
    buffer: &mut PromptBuffer,
    prompt: &Regex,
    wait: Duration,
) -> Result<String, TransportError>
where
    R: AsyncRead + Unpin + Send,
{
    let deadline = tokio::time::Instant::now() + wait;
    let mut chunk = [0u8; 1024];

    loop {
        let read = tokio::time::timeout_at(deadline, reader.read(&mut chunk)).await;
        match read {
            Err(_elapsed) => {
                buffer.clear();
                return Err(TransportError::CommandTimeout(wait));
            }
            Ok(Ok(0)) => {
                buffer.clear();
                return Err(TransportError::Closed);
            }
            Ok(Ok(n)) => {
                buffer.extend(&chunk[..n]);
                if buffer.tail_contains(prompt) {
                    return Ok(buffer.take_string());
                }
            }
            Ok(Err(e)) => {
                buffer.clear();
                return Err(TransportError::Io(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::patterns;

    fn telnet_config(host: &str) -> ConnectionConfig {
        ConnectionConfig::from_yaml(&format!(
            "connection_type: telnet\ntelnet:\n  host: {host}\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_factory_returns_disconnected_transport() {
        let transport = create(&telnet_config("192.0.2.1")).unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_factory_rejects_unknown_type() {
        let config = ConnectionConfig::from_yaml("connection_type: rsh\n").unwrap();
        match create(&config) {
            Err(ConfigError::UnknownConnectionType { value }) => assert_eq!(value, "rsh"),
            Err(other) => panic!("expected UnknownConnectionType, got {other:?}"),
            Ok(_) => panic!("expected UnknownConnectionType, got Ok"),
        }
    }

    #[test]
    fn test_factory_rejects_missing_section() {
        let config = ConnectionConfig::from_yaml("connection_type: ssh\n").unwrap();
        assert!(matches!(
            create(&config),
            Err(ConfigError::MissingSection { section: "ssh" })
        ));
    }

    #[test]
    fn test_factory_rejects_empty_host() {
        let config = ConnectionConfig::from_yaml(
            "connection_type: telnet\ntelnet:\n  host: \"\"\n",
        )
        .unwrap();
        assert!(matches!(
            create(&config),
            Err(ConfigError::MissingField {
                section: "telnet",
                field: "host"
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out_when_no_prompt_appears() {
        // A device that never prints a prompt: the write half is kept
        // open so reads pend forever.
        let (mut device, _keep_open) = tokio::io::duplex(64);

        let mut buffer = PromptBuffer::default();
        let prompt = patterns::any_command_prompt();
        let wait = Duration::from_secs(10);

        let started = tokio::time::Instant::now();
        let result = read_until_prompt(&mut device, &mut buffer, &prompt, wait).await;

        assert!(matches!(result, Err(TransportError::CommandTimeout(w)) if w == wait));
        // Fires at the deadline, not after it and not never.
        assert_eq!(started.elapsed(), wait);
    }

    #[tokio::test]
    async fn test_read_stops_at_prompt() {
        let (mut device, mut far_end) = tokio::io::duplex(256);
        tokio::io::AsyncWriteExt::write_all(
            &mut far_end,
            b"VLAN Name    Status\n100  test   active\nswitch# ",
        )
        .await
        .unwrap();

        let mut buffer = PromptBuffer::default();
        let prompt = patterns::any_command_prompt();
        let output =
            read_until_prompt(&mut device, &mut buffer, &prompt, Duration::from_secs(5))
                .await
                .unwrap();

        assert!(output.contains("100  test   active"));
        assert!(output.ends_with("switch# "));
    }
}
