//! # Switchtest
//!
//! Async conformance-test framework for L2/L3 switch CLIs.
//!
//! Switchtest drives text-based switch consoles over SSH, Telnet, or
//! serial to configure and verify Layer-2/Layer-3 features (VLANs,
//! spanning tree, MAC learning, routing) in automated test campaigns.
//!
//! ## Architecture
//!
//! - Interchangeable [`transport`] implementations behind one trait,
//!   selected from configuration by [`transport::create`]
//! - A [`ConnectionManager`] owning exactly one session per run, with a
//!   bounded reconnect policy and scoped cleanup
//!   ([`connection::with_connection`])
//! - A [`CommandManager`] binding parameters into an immutable
//!   [`TemplateStore`] of command definitions, verifying responses and
//!   extracting fields
//! - A [`TestRunner`] executing suites in order, isolating every
//!   failure so one broken suite never aborts the campaign
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use futures::FutureExt;
//! use futures::future::BoxFuture;
//! use switchtest::runner::{Suite, TestRunner};
//! use switchtest::{CommandManager, ConnectionConfig, ConnectionManager, TemplateStore};
//!
//! fn vlan_suite<'a>(
//!     conn: &'a mut ConnectionManager,
//!     cmds: &'a CommandManager,
//! ) -> BoxFuture<'a, switchtest::error::Result<bool>> {
//!     async move {
//!         let params: HashMap<String, String> =
//!             [("vlan_id".to_string(), "100".to_string())].into();
//!         let result = cmds.execute(conn, "vlan_commands", "create_vlan", &params).await?;
//!         Ok(result.matched_expected)
//!     }
//!     .boxed()
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchtest::Error> {
//!     let config = ConnectionConfig::from_yaml_path("config/switch.yaml")?;
//!     let cmds = CommandManager::new(TemplateStore::from_json_path("config/commands.json")?);
//!
//!     let mut conn = ConnectionManager::new(&config)?;
//!     let report = TestRunner::new()
//!         .with_suite(Suite::new("VLAN tests", vlan_suite))
//!         .run(&mut conn, &cmds)
//!         .await;
//!     conn.disconnect().await;
//!
//!     println!("{report}");
//!     std::process::exit(report.exit_code());
//! }
//! ```

pub mod channel;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod runner;
pub mod transport;

// Re-export main types for convenience
pub use command::{CommandManager, CommandTemplate, ExecutionResult, TemplateStore};
pub use config::{ConnectionConfig, ConnectionType};
pub use connection::ConnectionManager;
pub use error::Error;
pub use runner::{RunReport, Suite, SuiteOutcome, TestRunner};
pub use transport::{Transport, TransportState};
