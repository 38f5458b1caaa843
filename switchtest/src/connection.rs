//! Connection ownership, reconnect policy, and scoped cleanup.
//!
//! A [`ConnectionManager`] exclusively owns one transport for the
//! duration of a run. It centralizes the reconnect policy (transports
//! themselves never retry) and guarantees that the console session is
//! released on every exit path via [`with_connection`] — a switch
//! console left open blocks the next test run.

use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Result, TransportError};
use crate::transport::{self, Transport, TransportState};

/// Default wait for command output when the caller does not specify one.
pub const DEFAULT_COMMAND_WAIT: Duration = Duration::from_secs(10);

/// Owns exactly one transport and mediates every command through it.
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    default_wait: Duration,
    /// Reconnect attempts allowed after the first failed connect.
    retry_limit: u32,
}

impl ConnectionManager {
    /// Build a manager for the transport selected by `config`. Does not
    /// connect.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let transport = transport::create(config)?;
        Ok(Self::from_transport(transport))
    }

    /// Wrap an already-constructed transport. Used by tests to inject
    /// doubles; `new` is the production path.
    pub fn from_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            default_wait: DEFAULT_COMMAND_WAIT,
            retry_limit: 1,
        }
    }

    /// Set how many reconnect attempts follow a failed connect
    /// (default 1, i.e. two connect attempts in total).
    pub fn set_retry_limit(&mut self, retry_limit: u32) {
        self.retry_limit = retry_limit;
    }

    /// Set the default command wait.
    pub fn set_default_wait(&mut self, wait: Duration) {
        self.default_wait = wait;
    }

    /// Access the owned transport, connecting it first when
    /// `auto_connect` is set and no session is open.
    pub async fn get_connection(&mut self, auto_connect: bool) -> Result<&mut dyn Transport> {
        if auto_connect && !self.transport.is_connected() {
            self.connect().await?;
        }
        Ok(self.transport.as_mut())
    }

    /// Connect with the bounded retry policy: `1 + retry_limit` total
    /// attempts, then [`TransportError::RetriesExhausted`]. Bounded on
    /// purpose — an unreachable device must fail the run, not stall it.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_connected() {
            return Ok(());
        }

        let attempts = self.retry_limit.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(
                "connect attempt {attempt}/{attempts} to {}",
                self.transport.endpoint()
            );
            match self.transport.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("connect attempt {attempt} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            warn!(
                "giving up on {} after {attempts} attempt(s): {e}",
                self.transport.endpoint()
            );
        }
        Err(TransportError::RetriesExhausted { attempts }.into())
    }

    /// Whether a session is currently open. Pure query, no I/O.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Send a command with the default wait.
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        self.send_command_with_wait(command, self.default_wait).await
    }

    /// Send a command, reconnecting once if the transport has faulted.
    /// A second consecutive failure surfaces the error instead of
    /// retrying indefinitely.
    pub async fn send_command_with_wait(&mut self, command: &str, wait: Duration) -> Result<String> {
        self.connect().await?;

        match self.transport.send_command(command, wait).await {
            Ok(output) => Ok(output),
            Err(TransportError::CommandTimeout(w)) => {
                // Timeouts are the caller's decision to retry; the
                // session itself is still healthy.
                Err(TransportError::CommandTimeout(w).into())
            }
            Err(first) => {
                if self.transport.state() != TransportState::Faulted {
                    return Err(first.into());
                }
                warn!("transport faulted ({first}), reconnecting once");
                self.transport.disconnect().await;
                self.connect().await?;
                self.transport
                    .send_command(command, wait)
                    .await
                    .map_err(Into::into)
            }
        }
    }

    /// Close the session. Idempotent and safe from error paths.
    pub async fn disconnect(&mut self) {
        if self.transport.state() != TransportState::Disconnected {
            info!("disconnecting from {}", self.transport.endpoint());
        }
        self.transport.disconnect().await;
    }
}

/// Run `body` with a connected [`ConnectionManager`], guaranteeing the
/// session is closed on every exit path — normal return, early return,
/// or propagated failure.
///
/// ```rust,no_run
/// use futures::FutureExt;
/// use futures::future::BoxFuture;
/// use switchtest::{connection, ConnectionConfig, ConnectionManager};
///
/// fn body(conn: &mut ConnectionManager) -> BoxFuture<'_, switchtest::error::Result<String>> {
///     async move { conn.send_command("show version").await }.boxed()
/// }
///
/// # async fn example(config: ConnectionConfig) -> switchtest::error::Result<()> {
/// let version = connection::with_connection(&config, body).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_connection<T>(
    config: &ConnectionConfig,
    body: impl for<'a> FnOnce(&'a mut ConnectionManager) -> BoxFuture<'a, Result<T>>,
) -> Result<T> {
    let mut manager = ConnectionManager::new(config)?;
    scoped(&mut manager, body).await
}

/// Connect, run `body`, and always disconnect, including when the
/// connect itself fails, so a half-open session is never leaked.
async fn scoped<T>(
    manager: &mut ConnectionManager,
    body: impl for<'a> FnOnce(&'a mut ConnectionManager) -> BoxFuture<'a, Result<T>>,
) -> Result<T> {
    let result = match manager.connect().await {
        Ok(()) => body(manager).await,
        Err(e) => Err(e),
    };
    manager.disconnect().await;
    result
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use futures::FutureExt;

    /// Scriptable transport double. The `sent` log is shared so tests
    /// can observe traffic after the mock is boxed into a manager.
    pub(crate) struct MockTransport {
        pub state: TransportState,
        /// Remaining connect attempts that must fail.
        pub connect_failures: u32,
        pub connect_attempts: u32,
        /// Shared so tests can count disconnects after boxing.
        pub disconnect_calls: Arc<Mutex<u32>>,
        pub sent: Arc<Mutex<Vec<String>>>,
        /// Canned responses, consumed in order.
        pub responses: Vec<String>,
        /// When set, the next send fails and faults the transport.
        pub fail_next_send: bool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                state: TransportState::Disconnected,
                connect_failures: 0,
                connect_attempts: 0,
                disconnect_calls: Arc::new(Mutex::new(0)),
                sent: Arc::new(Mutex::new(Vec::new())),
                responses: Vec::new(),
                fail_next_send: false,
            }
        }

        pub fn with_responses(responses: &[&str]) -> Self {
            let mut mock = Self::new();
            mock.responses = responses.iter().rev().map(|s| s.to_string()).collect();
            mock
        }

        /// Handle onto the sent-command log.
        pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
            self.sent.clone()
        }

        /// Handle onto the disconnect counter.
        pub fn disconnect_log(&self) -> Arc<Mutex<u32>> {
            self.disconnect_calls.clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&mut self) -> std::result::Result<(), TransportError> {
            self.connect_attempts += 1;
            if self.connect_failures > 0 {
                self.connect_failures -= 1;
                self.state = TransportState::Faulted;
                return Err(TransportError::ConnectTimeout(Duration::from_secs(1)));
            }
            self.state = TransportState::Connected;
            Ok(())
        }

        async fn disconnect(&mut self) {
            *self.disconnect_calls.lock().unwrap() += 1;
            self.state = TransportState::Disconnected;
        }

        fn state(&self) -> TransportState {
            self.state
        }

        async fn send_command(
            &mut self,
            command: &str,
            _wait: Duration,
        ) -> std::result::Result<String, TransportError> {
            if self.state != TransportState::Connected {
                return Err(TransportError::NotConnected);
            }
            if self.fail_next_send {
                self.fail_next_send = false;
                self.state = TransportState::Faulted;
                return Err(TransportError::Closed);
            }
            self.sent.lock().unwrap().push(command.to_string());
            Ok(self
                .responses
                .pop()
                .unwrap_or_else(|| format!("{command}\r\nswitch# ")))
        }

        fn endpoint(&self) -> String {
            "mock://switch".to_string()
        }
    }

    #[tokio::test]
    async fn test_send_command_auto_connects() {
        let mut manager =
            ConnectionManager::from_transport(Box::new(MockTransport::with_responses(&[
                "Cisco IOS Software\r\nswitch# ",
            ])));

        assert!(!manager.is_connected());
        let output = manager.send_command("show version").await.unwrap();
        assert!(output.contains("Cisco IOS Software"));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_bounded_reconnect_gives_up_after_retry_limit() {
        // Connect fails every time; retry limit 1 means exactly two
        // attempts, then a connection error — not an unbounded loop.
        let mut mock = MockTransport::new();
        mock.connect_failures = u32::MAX;
        let mut manager = ConnectionManager::from_transport(Box::new(mock));
        manager.set_retry_limit(1);

        let err = manager.send_command("show version").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::RetriesExhausted { attempts: 2 })
        ));

        let transport = manager.get_connection(false).await.unwrap();
        assert_eq!(transport.state(), TransportState::Faulted);
    }

    #[tokio::test]
    async fn test_connect_attempt_count_is_exact() {
        let mut mock = MockTransport::new();
        mock.connect_failures = u32::MAX;
        let mut manager = ConnectionManager::from_transport(Box::new(mock));
        manager.set_retry_limit(2);

        assert!(manager.connect().await.is_err());

        // Downcast through the trait object is not possible; observe the
        // attempt count by reconnect behavior instead: allow the next
        // connect to succeed after the counted failures.
        let mut mock = MockTransport::new();
        mock.connect_failures = 2;
        let mut manager = ConnectionManager::from_transport(Box::new(mock));
        manager.set_retry_limit(2);
        assert!(manager.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_faulted_send_reconnects_once() {
        let mut mock = MockTransport::with_responses(&["vlan 100 created\r\nswitch# "]);
        mock.fail_next_send = true;
        let mut manager = ConnectionManager::from_transport(Box::new(mock));

        // First send faults the transport; the manager reconnects and
        // resends transparently.
        let output = manager.send_command("vlan 100").await.unwrap();
        assert!(output.contains("vlan 100 created"));
    }

    #[tokio::test]
    async fn test_connect_attempt_bound_survives_max_retry_limit() {
        // The largest possible retry limit must not overflow the
        // attempt arithmetic; a transport that connects on the first
        // try never reaches the bound.
        let mut manager = ConnectionManager::from_transport(Box::new(MockTransport::new()));
        manager.set_retry_limit(u32::MAX);

        assert!(manager.connect().await.is_ok());
        assert!(manager.is_connected());
    }

    fn version_body<'a>(conn: &'a mut ConnectionManager) -> BoxFuture<'a, Result<String>> {
        async move { conn.send_command("show version").await }.boxed()
    }

    fn failing_body<'a>(_conn: &'a mut ConnectionManager) -> BoxFuture<'a, Result<String>> {
        async { Err(TransportError::Closed.into()) }.boxed()
    }

    #[tokio::test]
    async fn test_scope_disconnects_after_success() {
        let mock = MockTransport::with_responses(&["IOS 15.2\r\nswitch# "]);
        let disconnects = mock.disconnect_log();
        let mut manager = ConnectionManager::from_transport(Box::new(mock));

        let output = scoped(&mut manager, version_body).await.unwrap();
        assert!(output.contains("IOS 15.2"));
        assert!(!manager.is_connected());
        assert_eq!(*disconnects.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_disconnects_after_body_error() {
        let mock = MockTransport::new();
        let disconnects = mock.disconnect_log();
        let mut manager = ConnectionManager::from_transport(Box::new(mock));

        let err = scoped(&mut manager, failing_body).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));
        // The session opened for the body is still released.
        assert!(!manager.is_connected());
        assert_eq!(*disconnects.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_disconnects_after_failed_connect() {
        let mut mock = MockTransport::new();
        mock.connect_failures = u32::MAX;
        let disconnects = mock.disconnect_log();
        let mut manager = ConnectionManager::from_transport(Box::new(mock));

        let err = scoped(&mut manager, version_body).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::RetriesExhausted { .. })
        ));
        // A faulted half-open transport is torn down, not leaked.
        assert_eq!(*disconnects.lock().unwrap(), 1);
        let transport = manager.get_connection(false).await.unwrap();
        assert_eq!(transport.state(), TransportState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut manager = ConnectionManager::from_transport(Box::new(MockTransport::new()));
        manager.connect().await.unwrap();

        manager.disconnect().await;
        assert!(!manager.is_connected());
        manager.disconnect().await;
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_timeout_does_not_trigger_reconnect() {
        struct TimeoutTransport {
            state: TransportState,
            sends: u32,
        }

        #[async_trait]
        impl Transport for TimeoutTransport {
            async fn connect(&mut self) -> std::result::Result<(), TransportError> {
                self.state = TransportState::Connected;
                Ok(())
            }
            async fn disconnect(&mut self) {
                self.state = TransportState::Disconnected;
            }
            fn state(&self) -> TransportState {
                self.state
            }
            async fn send_command(
                &mut self,
                _command: &str,
                wait: Duration,
            ) -> std::result::Result<String, TransportError> {
                self.sends += 1;
                Err(TransportError::CommandTimeout(wait))
            }
            fn endpoint(&self) -> String {
                "mock://slow-switch".to_string()
            }
        }

        let mut manager = ConnectionManager::from_transport(Box::new(TimeoutTransport {
            state: TransportState::Disconnected,
            sends: 0,
        }));

        let err = manager.send_command("show tech-support").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::CommandTimeout(_))
        ));
        // The session stays up; retrying is the caller's call.
        assert!(manager.is_connected());
    }
}
