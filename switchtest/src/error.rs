//! Error types for switchtest.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for switchtest operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (connection document, template document)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level errors (connect, auth, command I/O)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command templating and verification errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Configuration errors. These are fatal and abort before any device
/// interaction.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The connection_type discriminator is not one of ssh/telnet/serial.
    #[error("Unsupported connection type: '{value}'")]
    UnknownConnectionType { value: String },

    /// The settings block matching the discriminator is absent.
    #[error("Missing '{section}' configuration section")]
    MissingSection { section: &'static str },

    /// A required transport field is absent or empty.
    #[error("Missing required {section} configuration field: {field}")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    /// A field is present but holds a nonsensical value.
    #[error("Invalid {section} configuration field {field}: {reason}")]
    InvalidField {
        section: &'static str,
        field: &'static str,
        reason: String,
    },

    /// Connection configuration document failed to parse.
    #[error("Invalid connection configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Command template document failed to parse.
    #[error("Invalid command template document: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading a configuration document.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Transport layer errors (connection, authentication, command I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Connection attempt exceeded the configured timeout
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// No prompt observed within the command deadline
    #[error("No prompt observed within {0:?}")]
    CommandTimeout(Duration),

    /// Operation requires an open connection
    #[error("Not connected to device")]
    NotConnected,

    /// The peer closed the session
    #[error("Connection closed by device")]
    Closed,

    /// Bounded reconnect policy exhausted
    #[error("Connection failed after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Command templating errors. Always fatal to the single command,
/// never silently ignored.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Referenced template does not exist in the store
    #[error("Command '{name}' not found in category '{category}'")]
    UnknownCommand { category: String, name: String },

    /// A `{placeholder}` in the command pattern has no matching parameter
    #[error("Missing required parameter: '{name}'")]
    MissingParameter { name: String },

    /// A parse_pattern in the template document is not a valid regex
    #[error("Invalid parse pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type alias using switchtest's Error.
pub type Result<T> = std::result::Result<T, Error>;
