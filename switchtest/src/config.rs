//! Connection configuration document.
//!
//! A single YAML document selects one of the three transports via the
//! `connection_type` discriminator and carries a settings block per
//! transport. Only the block matching the discriminator has to be
//! present; the factory in [`crate::transport`] validates it.
//!
//! ```yaml
//! connection_type: telnet
//! telnet:
//!   host: 192.168.10.1
//!   port: 23
//!   timeout: 10
//! ```

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Discriminator for the active transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Ssh,
    Telnet,
    Serial,
}

impl ConnectionType {
    /// Parse the `connection_type` discriminator. Unknown values are a
    /// configuration error, never a silent default.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "ssh" => Ok(Self::Ssh),
            "telnet" => Ok(Self::Telnet),
            "serial" => Ok(Self::Serial),
            other => Err(ConfigError::UnknownConnectionType {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ssh => write!(f, "ssh"),
            Self::Telnet => write!(f, "telnet"),
            Self::Serial => write!(f, "serial"),
        }
    }
}

/// Top-level connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// One of `ssh`, `telnet`, `serial`.
    pub connection_type: String,

    /// SSH settings, required when `connection_type: ssh`.
    #[serde(default)]
    pub ssh: Option<SshSettings>,

    /// Telnet settings, required when `connection_type: telnet`.
    #[serde(default)]
    pub telnet: Option<TelnetSettings>,

    /// Serial console settings, required when `connection_type: serial`.
    #[serde(default)]
    pub serial: Option<SerialSettings>,
}

impl ConnectionConfig {
    /// Parse the document from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load the document from a YAML file.
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Resolve the discriminator.
    pub fn connection_type(&self) -> Result<ConnectionType, ConfigError> {
        ConnectionType::parse(&self.connection_type)
    }
}

/// SSH transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// Switch hostname or IP address.
    pub host: String,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: SecretString,

    /// SSH port.
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Connect and command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Password for privileged EXEC mode, sent after login when set.
    #[serde(default)]
    pub enable_password: Option<SecretString>,
}

impl SshSettings {
    /// Configured timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Telnet transport settings. Credentials are optional because lab
/// switches frequently run open telnet consoles.
#[derive(Debug, Clone, Deserialize)]
pub struct TelnetSettings {
    /// Switch hostname or IP address.
    pub host: String,

    /// Login username, answered at the `Username:` prompt when present.
    #[serde(default)]
    pub username: Option<String>,

    /// Login password, answered at the `Password:` prompt when present.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Telnet port.
    #[serde(default = "default_telnet_port")]
    pub port: u16,

    /// Connect and command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl TelnetSettings {
    /// Configured timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Serial console settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialSettings {
    /// Device path (`/dev/ttyUSB0`, `COM3`).
    pub port: String,

    /// Baud rate.
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,

    /// Read timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Parity: `N`, `E`, or `O`.
    #[serde(default = "default_parity")]
    pub parity: String,

    /// Stop bits: 1 or 2.
    #[serde(default = "default_stopbits")]
    pub stopbits: u8,

    /// Data bits: 5 through 8.
    #[serde(default = "default_bytesize")]
    pub bytesize: u8,

    /// Software flow control (XON/XOFF).
    #[serde(default)]
    pub xonxoff: bool,

    /// Hardware flow control (RTS/CTS).
    #[serde(default)]
    pub rtscts: bool,
}

impl SerialSettings {
    /// Configured timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_telnet_port() -> u16 {
    23
}

fn default_timeout() -> u64 {
    10
}

fn default_baudrate() -> u32 {
    9600
}

fn default_parity() -> String {
    "N".to_string()
}

fn default_stopbits() -> u8 {
    1
}

fn default_bytesize() -> u8 {
    8
}
