//! Run a small conformance campaign against one switch.
//!
//! Loads the connection config and command templates from disk,
//! registers a handful of suites, runs them in order over a single
//! session, and exits non-zero if anything failed.
//!
//! # Prerequisites
//!
//! - A reachable switch (or lab VM) described by a YAML connection
//!   config, for example:
//!
//! ```yaml
//! connection_type: ssh
//! ssh:
//!   host: 192.168.1.10
//!   username: admin
//!   password: secret
//! ```
//!
//! - A JSON command-template document, for example:
//!
//! ```json
//! {
//!   "vlan_commands": {
//!     "create_vlan": { "command": "vlan {vlan_id}", "expected_response": "" },
//!     "show_vlan_id": {
//!       "command": "show vlan id {vlan_id}",
//!       "expected_response": "{vlan_id}"
//!     }
//!   }
//! }
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_suites -- --config switch.yaml --commands commands.json
//! ```

use std::collections::HashMap;
use std::env;

use futures::FutureExt;
use futures::future::BoxFuture;
use switchtest::runner::{Suite, TestRunner};
use switchtest::{CommandManager, ConnectionConfig, ConnectionManager, TemplateStore};

fn vlan_params(vlan_id: &str) -> HashMap<String, String> {
    [("vlan_id".to_string(), vlan_id.to_string())].into()
}

/// Create VLAN 100 and verify the switch reports it back.
fn vlan_create_suite<'a>(
    conn: &'a mut ConnectionManager,
    cmds: &'a CommandManager,
) -> BoxFuture<'a, switchtest::error::Result<bool>> {
    async move {
        let params = vlan_params("100");
        cmds.execute(conn, "vlan_commands", "create_vlan", &params)
            .await?;
        let shown = cmds
            .execute(conn, "vlan_commands", "show_vlan_id", &params)
            .await?;
        Ok(shown.matched_expected)
    }
    .boxed()
}

/// A raw-command suite: no template, just the connection.
fn version_suite<'a>(
    conn: &'a mut ConnectionManager,
    _cmds: &'a CommandManager,
) -> BoxFuture<'a, switchtest::error::Result<bool>> {
    async move {
        let output = conn.send_command("show version").await?;
        println!("{output}");
        Ok(!output.is_empty())
    }
    .boxed()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ConnectionConfig::from_yaml_path(&args.config)?;
    let cmds = CommandManager::new(TemplateStore::from_json_path(&args.commands)?);

    let mut conn = ConnectionManager::new(&config)?;

    let report = TestRunner::new()
        .with_suite(Suite::new("VLAN create/verify", vlan_create_suite))
        .with_suite(Suite::new("show version", version_suite))
        .run(&mut conn, &cmds)
        .await;

    conn.disconnect().await;

    println!("{report}");
    std::process::exit(report.exit_code());
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: String,
    commands: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = "switch.yaml".to_string();
        let mut commands = "commands.json".to_string();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = args[i].clone();
                    }
                }
                "--commands" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        commands = args[i].clone();
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self { config, commands }
    }

    fn print_help() {
        println!(
            r#"switchtest run_suites example

USAGE:
    cargo run --example run_suites -- [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Connection config YAML [default: switch.yaml]
    -t, --commands <PATH>    Command templates JSON [default: commands.json]
    --help                   Print this help message"#
        );
    }
}
