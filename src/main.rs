// Net Automount - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Net Automount
//!
//! A network-aware auto-mount daemon for SMB, NFS and FTP shares on Linux.
//!
//! This is the main entry point for the daemon and its command-line front end.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

mod application;
mod dbus_client;
mod models;
mod network_utils;
mod services;
mod storage;

use application::{Application, Command};
use models::AppConfig;
use storage::DataStore;

/// Human-readable application name.
pub const APP_NAME: &str = "Net Automount";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
    println!();
    println!("A network-aware auto-mount daemon for SMB/NFS/FTP shares on Linux.");
}

/// Print help information and exit.
fn print_help() {
    println!(
        "Usage: {} [OPTIONS] [COMMAND]",
        env::args().next().unwrap_or_else(|| "net-automount".to_string())
    );
    println!();
    println!("Mounts remote shares automatically when a known network is joined.");
    println!();
    println!("Options:");
    println!("  -h, --help               Show this help message and exit");
    println!("  -v, --version            Show version information and exit");
    println!("  -d, --debug              Enable debug logging");
    println!("  -c, --config-dir <DIR>   Use DIR instead of the default config directory");
    println!();
    println!("Commands:");
    println!("  run                                   Run the auto-mount daemon (default)");
    println!("  list                                  List configured targets and rules");
    println!("  status                                Show mount state and the current network");
    println!("  add <alias> <smb|nfs|ftp> <host> <share> [user]");
    println!("                                        Add a mount target");
    println!("  remove <alias>                        Remove a target and its stored password");
    println!("  set-password <alias>                  Store the password for a target");
    println!("  remember-network <alias>              Auto-mount the target on the current network");
    println!("  test <alias>                          Check that the target's server is reachable");
    println!("  mount <alias>                         Mount a target now");
    println!("  unmount <alias>                       Unmount a target");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG         Set log level (trace, debug, info, warn, error)");
    println!();
    println!("Report bugs to: https://github.com/christosdaggas/net-automount/issues");
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut debug_mode = false;
    let mut config_dir: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        // Options are only recognised before the command.
        if !positional.is_empty() {
            positional.push(arg.clone());
            continue;
        }
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            "-d" | "--debug" => {
                debug_mode = true;
            }
            "-c" | "--config-dir" => match iter.next() {
                Some(dir) => config_dir = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("Option {} requires a directory", arg);
                    return ExitCode::FAILURE;
                }
            },
            _ => {
                if arg.starts_with('-') {
                    eprintln!("Unknown option: {}", arg);
                    eprintln!("Try '--help' for more information.");
                    return ExitCode::FAILURE;
                }
                positional.push(arg.clone());
            }
        }
    }

    let command = match Command::parse(&positional) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Try '--help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging with appropriate level
    let log_level = if debug_mode {
        "debug".to_string()
    } else {
        let dir = config_dir.clone().unwrap_or_else(DataStore::default_config_dir);
        AppConfig::load_from_file(&dir.join("settings.toml"))
            .map(|config| config.log_level)
            .unwrap_or_else(|_| "info".to_string())
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::debug!("Starting {} v{}", APP_NAME, VERSION);

    let result = Application::new(config_dir).and_then(|app| app.run(command));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
