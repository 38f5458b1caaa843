//! Serial console transport implementation using tokio-serial.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::{read_until_prompt, Transport, TransportState};
use crate::channel::{patterns, PromptBuffer};
use crate::config::SerialSettings;
use crate::error::TransportError;

/// Serial console transport.
///
/// Consoles use a bare CR as line terminator; a CRLF would be echoed
/// back as an extra empty prompt after every command.
pub struct SerialTransport {
    settings: SerialSettings,
    state: TransportState,
    port: Option<SerialStream>,
    buffer: PromptBuffer,
    prompt: regex::bytes::Regex,
}

impl SerialTransport {
    /// Create a new serial transport in the `Disconnected` state.
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            state: TransportState::Disconnected,
            port: None,
            buffer: PromptBuffer::default(),
            prompt: patterns::any_command_prompt(),
        }
    }

    fn parity(&self) -> Parity {
        match self.settings.parity.as_str() {
            "E" | "e" => Parity::Even,
            "O" | "o" => Parity::Odd,
            _ => Parity::None,
        }
    }

    fn stop_bits(&self) -> StopBits {
        match self.settings.stopbits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }

    fn data_bits(&self) -> DataBits {
        match self.settings.bytesize {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn flow_control(&self) -> FlowControl {
        if self.settings.rtscts {
            FlowControl::Hardware
        } else if self.settings.xonxoff {
            FlowControl::Software
        } else {
            FlowControl::None
        }
    }

    async fn establish(&mut self) -> Result<(), TransportError> {
        let timeout = self.settings.timeout_duration();

        let builder = tokio_serial::new(&self.settings.port, self.settings.baudrate)
            .parity(self.parity())
            .stop_bits(self.stop_bits())
            .data_bits(self.data_bits())
            .flow_control(self.flow_control());
        let port = builder.open_native_async()?;
        self.port = Some(port);

        // Wake the console and sync to a prompt. A console parked at a
        // login or "Press RETURN" banner gets a couple of returns.
        self.write_raw(b"\r").await?;
        let next = patterns::prompt_or_login();
        let mut output = self.read_until(&next, timeout).await?;

        if output.contains("Press RETURN to get started") {
            self.write_raw(b"\r").await?;
            output = self.read_until(&next, timeout).await?;
        }
        if patterns::login_prompt().is_match(output.as_bytes()) {
            // The serial block carries no credentials; answer with a
            // bare return for consoles without a line password.
            self.write_raw(b"\r").await?;
            self.read_until(&next, timeout).await?;
        }

        Ok(())
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_until(
        &mut self,
        pattern: &regex::bytes::Regex,
        wait: Duration,
    ) -> Result<String, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        read_until_prompt(port, &mut self.buffer, pattern, wait).await
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Connected {
            return Ok(());
        }
        info!(
            "opening serial console {} at {} baud",
            self.settings.port, self.settings.baudrate
        );
        self.state = TransportState::Connecting;

        match self.establish().await {
            Ok(()) => {
                self.state = TransportState::Connected;
                info!("serial console ready on {}", self.settings.port);
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Faulted;
                self.port = None;
                Err(e)
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush().await {
                warn!("serial flush during teardown failed: {e}");
            }
        }
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

        debug!("serial send: {command}");
        let payload = format!("{command}\r");
        if let Err(e) = self.write_raw(payload.as_bytes()).await {
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
        format!("serial://{}@{}", self.settings.port, self.settings.baudrate)
    }
}
