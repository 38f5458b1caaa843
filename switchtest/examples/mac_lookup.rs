//! Look up the MAC address learned on one switch port.
//!
//! Demonstrates template execution with field extraction: the
//! `show_mac_table` template's parse pattern pulls the MAC, port, and
//! VLAN out of the Cisco-style `show mac address-table` output.
//!
//! Expected template document (commands.json):
//!
//! ```json
//! {
//!   "show_commands": {
//!     "show_mac_table": {
//!       "command": "show mac address-table interface {interface}",
//!       "expected_response": "Mac Address Table",
//!       "parse_pattern": "(?P<vlan>\\d+)\\s+(?P<mac>(?:[0-9a-f]{4}\\.){2}[0-9a-f]{4})\\s+\\S+\\s+(?P<port>\\S+)"
//!     }
//!   }
//! }
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --example mac_lookup -- --config switch.yaml --interface Fa0/1
//! ```

use std::collections::HashMap;
use std::env;

use switchtest::{CommandManager, ConnectionConfig, ConnectionManager, TemplateStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ConnectionConfig::from_yaml_path(&args.config)?;
    let cmds = CommandManager::new(TemplateStore::from_json_path(&args.commands)?);
    let mut conn = ConnectionManager::new(&config)?;

    let params: HashMap<String, String> =
        [("interface".to_string(), args.interface.clone())].into();

    println!("Querying MAC table for {}...", args.interface);
    let result = cmds
        .execute(&mut conn, "show_commands", "show_mac_table", &params)
        .await;

    conn.disconnect().await;

    let result = result?;
    if !result.matched_expected {
        eprintln!("Device did not return a MAC address table:");
        eprintln!("{}", result.raw_output);
        std::process::exit(1);
    }

    match result.field("mac") {
        Some(mac) => {
            println!("MAC:  {mac}");
            println!("Port: {}", result.field("port").unwrap_or("?"));
            println!("VLAN: {}", result.field("vlan").unwrap_or("?"));
        }
        None => println!("No dynamic entry learned on {}", args.interface),
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: String,
    commands: String,
    interface: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = "switch.yaml".to_string();
        let mut commands = "commands.json".to_string();
        let mut interface = "Fa0/1".to_string();

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
                "--interface" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        interface = args[i].clone();
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

        Self {
            config,
            commands,
            interface,
        }
    }

    fn print_help() {
        println!(
            r#"switchtest mac_lookup example

USAGE:
    cargo run --example mac_lookup -- [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Connection config YAML [default: switch.yaml]
    -t, --commands <PATH>    Command templates JSON [default: commands.json]
    -i, --interface <NAME>   Interface to query [default: Fa0/1]
    --help                   Print this help message"#
        );
    }
}
