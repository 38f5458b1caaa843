//! Test-suite orchestration with partial-failure continuation.
//!
//! Suites run strictly in registration order against one connection
//! manager / command manager pair. Every failure mode of a suite — a
//! `false` verdict, an error, even a panic — is captured as a
//! [`SuiteOutcome`] value and the loop moves on: one suite must never
//! prevent the rest of the campaign from running.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use log::{error, info};

use crate::command::CommandManager;
use crate::connection::ConnectionManager;
use crate::error::Result;

/// Boxed suite body: borrows the shared connection and command
/// managers, returns its verdict or an error.
pub type SuiteFn = Box<
    dyn for<'a> FnOnce(
            &'a mut ConnectionManager,
            &'a CommandManager,
        ) -> BoxFuture<'a, Result<bool>>
        + Send,
>;

/// A named test suite.
pub struct Suite {
    name: String,
    body: SuiteFn,
}

impl Suite {
    /// Create a suite from a display name and its body. Bodies are
    /// typically plain functions, one per feature module:
    ///
    /// ```rust,no_run
    /// use futures::FutureExt;
    /// use futures::future::BoxFuture;
    /// use switchtest::runner::Suite;
    /// use switchtest::{CommandManager, ConnectionManager};
    ///
    /// fn vlan_suite<'a>(
    ///     conn: &'a mut ConnectionManager,
    ///     _cmds: &'a CommandManager,
    /// ) -> BoxFuture<'a, switchtest::error::Result<bool>> {
    ///     async move {
    ///         let output = conn.send_command("show vlan brief").await?;
    ///         Ok(output.contains("active"))
    ///     }
    ///     .boxed()
    /// }
    ///
    /// let suite = Suite::new("VLAN tests", vlan_suite);
    /// ```
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> FnOnce(
                &'a mut ConnectionManager,
                &'a CommandManager,
            ) -> BoxFuture<'a, Result<bool>>
            + Send
            + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// The suite's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Result of one suite.
#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    /// Display name of the suite.
    pub name: String,

    /// Whether the suite passed.
    pub passed: bool,

    /// Failure or panic message, preserved verbatim for diagnostics.
    pub error: Option<String>,

    /// Wall-clock time the suite took.
    pub duration: Duration,
}

/// Ordered suite outcomes for one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    outcomes: Vec<SuiteOutcome>,
}

impl RunReport {
    /// All recorded outcomes, in execution order.
    pub fn outcomes(&self) -> &[SuiteOutcome] {
        &self.outcomes
    }

    /// Overall verdict: the logical AND of every suite's `passed`.
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// Number of passed suites.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    /// Process exit code for the external entry point: 0 when every
    /// suite passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() { 0 } else { 1 }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "==== run report ====")?;
        for outcome in &self.outcomes {
            let verdict = if outcome.passed { "PASS" } else { "FAIL" };
            write!(
                f,
                "[{verdict}] {} ({:.1}s)",
                outcome.name,
                outcome.duration.as_secs_f64()
            )?;
            if let Some(message) = &outcome.error {
                write!(f, ": {message}")?;
            }
            writeln!(f)?;
        }
        writeln!(
            f,
            "overall: {} ({}/{} passed)",
            if self.all_passed() { "PASS" } else { "FAIL" },
            self.passed_count(),
            self.outcomes.len()
        )
    }
}

/// Runs an ordered list of suites against one connection manager and
/// command manager, isolating failures per suite.
#[derive(Default)]
pub struct TestRunner {
    suites: Vec<Suite>,
}

impl TestRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a suite. Execution order is registration order.
    pub fn register(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    /// Builder-style registration.
    pub fn with_suite(mut self, suite: Suite) -> Self {
        self.register(suite);
        self
    }

    /// Run every registered suite in order and report all outcomes.
    ///
    /// The run always completes: a failing or panicking suite is
    /// recorded and the next suite still executes. Suites are not
    /// retried here — retries belong to individual commands or the
    /// test bodies themselves.
    pub async fn run(
        self,
        conn: &mut ConnectionManager,
        cmds: &CommandManager,
    ) -> RunReport {
        let mut report = RunReport::default();

        for suite in self.suites {
            info!("running suite: {}", suite.name);
            let start = Instant::now();

            let verdict = AssertUnwindSafe((suite.body)(conn, cmds))
                .catch_unwind()
                .await;
            let duration = start.elapsed();

            let (passed, message) = match verdict {
                Ok(Ok(passed)) => (passed, None),
                Ok(Err(e)) => (false, Some(e.to_string())),
                Err(panic) => (false, Some(panic_message(panic))),
            };

            match (&passed, &message) {
                (true, _) => info!("suite '{}' passed in {duration:?}", suite.name),
                (false, Some(m)) => error!("suite '{}' failed: {m}", suite.name),
                (false, None) => error!("suite '{}' failed", suite.name),
            }

            report.outcomes.push(SuiteOutcome {
                name: suite.name,
                passed,
                error: message,
                duration,
            });
        }

        info!(
            "run complete: {}/{} suites passed",
            report.passed_count(),
            report.outcomes.len()
        );
        report
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "suite panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TemplateStore;
    use crate::connection::tests::MockTransport;

    fn fixtures() -> (ConnectionManager, CommandManager) {
        let conn = ConnectionManager::from_transport(Box::new(MockTransport::new()));
        let cmds = CommandManager::new(TemplateStore::from_json("{}").unwrap());
        (conn, cmds)
    }

    fn passing<'a>(
        _conn: &'a mut ConnectionManager,
        _cmds: &'a CommandManager,
    ) -> BoxFuture<'a, Result<bool>> {
        async { Ok(true) }.boxed()
    }

    fn soft_failing<'a>(
        _conn: &'a mut ConnectionManager,
        _cmds: &'a CommandManager,
    ) -> BoxFuture<'a, Result<bool>> {
        async { Ok(false) }.boxed()
    }

    fn erroring<'a>(
        _conn: &'a mut ConnectionManager,
        _cmds: &'a CommandManager,
    ) -> BoxFuture<'a, Result<bool>> {
        async { Err(crate::error::TransportError::NotConnected.into()) }.boxed()
    }

    fn panicking<'a>(
        _conn: &'a mut ConnectionManager,
        _cmds: &'a CommandManager,
    ) -> BoxFuture<'a, Result<bool>> {
        async { panic!("unexpected device reboot") }.boxed()
    }

    #[tokio::test]
    async fn test_failing_suite_does_not_stop_the_run() {
        let (mut conn, cmds) = fixtures();

        let runner = TestRunner::new()
            .with_suite(Suite::new("first", passing))
            .with_suite(Suite::new("second", erroring))
            .with_suite(Suite::new("third", passing));

        let report = runner.run(&mut conn, &cmds).await;

        // Exactly three outcomes: the middle failure never aborted the
        // campaign, and its message is preserved.
        assert_eq!(report.outcomes().len(), 3);
        assert!(report.outcomes()[0].passed);
        assert!(!report.outcomes()[1].passed);
        assert!(report.outcomes()[1]
            .error
            .as_deref()
            .unwrap()
            .contains("Not connected"));
        assert!(report.outcomes()[2].passed);
        assert!(!report.all_passed());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_panicking_suite_is_captured() {
        let (mut conn, cmds) = fixtures();

        let runner = TestRunner::new()
            .with_suite(Suite::new("panics", panicking))
            .with_suite(Suite::new("after", passing));

        let report = runner.run(&mut conn, &cmds).await;

        assert_eq!(report.outcomes().len(), 2);
        assert!(!report.outcomes()[0].passed);
        assert_eq!(
            report.outcomes()[0].error.as_deref(),
            Some("unexpected device reboot")
        );
        assert!(report.outcomes()[1].passed);
    }

    #[tokio::test]
    async fn test_false_verdict_without_error_message() {
        let (mut conn, cmds) = fixtures();

        let runner = TestRunner::new().with_suite(Suite::new("soft fail", soft_failing));

        let report = runner.run(&mut conn, &cmds).await;
        assert!(!report.outcomes()[0].passed);
        assert!(report.outcomes()[0].error.is_none());
    }

    #[tokio::test]
    async fn test_suites_run_in_registration_order() {
        let (mut conn, cmds) = fixtures();

        let runner = TestRunner::new()
            .with_suite(Suite::new("vlan", passing))
            .with_suite(Suite::new("mac learning", passing))
            .with_suite(Suite::new("spanning tree", passing));

        let report = runner.run(&mut conn, &cmds).await;
        let names: Vec<_> = report.outcomes().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["vlan", "mac learning", "spanning tree"]);
        assert!(report.all_passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_suite_can_drive_the_connection() {
        let mock = MockTransport::with_responses(&["VLAN0100 active\r\nswitch# "]);
        let sent = mock.sent_log();
        let mut conn = ConnectionManager::from_transport(Box::new(mock));
        let cmds = CommandManager::new(TemplateStore::from_json("{}").unwrap());

        fn vlan_status<'a>(
            conn: &'a mut ConnectionManager,
            _cmds: &'a CommandManager,
        ) -> BoxFuture<'a, Result<bool>> {
            async move {
                let output = conn.send_command("show vlan brief").await?;
                Ok(output.contains("active"))
            }
            .boxed()
        }

        let runner = TestRunner::new().with_suite(Suite::new("vlan status", vlan_status));

        let report = runner.run(&mut conn, &cmds).await;
        assert!(report.all_passed());
        assert_eq!(sent.lock().unwrap().as_slice(), ["show vlan brief"]);
    }

    #[test]
    fn test_report_rendering() {
        let report = RunReport {
            outcomes: vec![
                SuiteOutcome {
                    name: "vlan".into(),
                    passed: true,
                    error: None,
                    duration: Duration::from_millis(1500),
                },
                SuiteOutcome {
                    name: "stp".into(),
                    passed: false,
                    error: Some("No prompt observed within 10s".into()),
                    duration: Duration::from_millis(300),
                },
            ],
        };

        let rendered = report.to_string();
        assert!(rendered.contains("[PASS] vlan (1.5s)"));
        assert!(rendered.contains("[FAIL] stp (0.3s): No prompt observed within 10s"));
        assert!(rendered.contains("overall: FAIL (1/2 passed)"));
    }
}
