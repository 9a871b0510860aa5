use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use appconf_core::constants::DIST_DIR;
use appconf_core::AppconfSettings;
use appconf_forwarding::{ForwardingConfig, LogForwarding};

use crate::remote::FileService;
use crate::{env_lookup, ForwardingCommand, SetArgs};

/// Local versus applied state as reported by `forwarding status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingStatus {
    /// The local configuration differs from the last one applied from here.
    pub changed: bool,
    /// The local configuration matches what the service reports.
    pub in_sync: bool,
}

/// Runs a `forwarding` subcommand against the project in `dir`.
#[instrument(skip(settings, command))]
pub fn run(dir: &Path, settings: &AppconfSettings, command: &ForwardingCommand) -> Result<()> {
    let mut forwarding = open(dir, settings, command)?;
    match command {
        ForwardingCommand::Get(_) => {
            let local = forwarding.get_local_config()?;
            let remote = forwarding.get_server_config()?;
            print_config("local", &local);
            print_config("remote", &remote);
        }
        ForwardingCommand::Status(_) => {
            let status = status(&forwarding, dir)?;
            println!("local changes: {}", yes_no(status.changed));
            println!("in sync with service: {}", yes_no(status.in_sync));
        }
        ForwardingCommand::Set(args) => {
            let config = set(&mut forwarding, args)?;
            print_config("local", &config);
        }
        ForwardingCommand::Push(args) => {
            if push(&mut forwarding, dir, args.force)? {
                println!("log forwarding configuration applied");
            } else {
                println!("log forwarding configuration is up to date");
            }
        }
    }
    Ok(())
}

fn open(
    dir: &Path,
    settings: &AppconfSettings,
    command: &ForwardingCommand,
) -> Result<LogForwarding<FileService>> {
    let remote = match command {
        ForwardingCommand::Get(args) | ForwardingCommand::Status(args) => args,
        ForwardingCommand::Set(args) => &args.remote,
        ForwardingCommand::Push(args) => &args.remote,
    };
    let state_path = if remote.remote_state.is_absolute() {
        remote.remote_state.clone()
    } else {
        dir.join(&remote.remote_state)
    };
    let service = FileService::new(state_path, settings.forwarding.destinations.clone());
    let dist_dir = settings
        .forwarding
        .dist_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DIST_DIR));
    LogForwarding::load(dir, dist_dir, service)
}

fn status(forwarding: &LogForwarding<FileService>, dir: &Path) -> Result<ForwardingStatus> {
    let lookup = env_lookup(dir)?;
    let changed = forwarding.is_local_config_changed(&lookup)?;
    let local = forwarding.get_local_config_with_secrets(&lookup)?;
    let remote = forwarding.get_server_config()?;
    Ok(ForwardingStatus {
        changed,
        in_sync: local == remote,
    })
}

fn set(forwarding: &mut LogForwarding<FileService>, args: &SetArgs) -> Result<ForwardingConfig> {
    let supported = forwarding.supported_destinations()?;
    if !supported.iter().any(|d| d.value == args.destination) {
        let names: Vec<_> = supported.iter().map(|d| d.value.as_str()).collect();
        bail!(
            "unsupported log forwarding destination '{}'; expected one of: {}",
            args.destination,
            names.join(", ")
        );
    }

    let schema = forwarding.destination_settings(&args.destination)?;
    let mut settings = Map::new();
    for (name, value) in &args.settings {
        if !schema.iter().any(|s| s.name == *name) {
            warn!("'{}' is not a known setting of '{}'", name, args.destination);
        }
        settings.insert(name.clone(), Value::String(value.clone()));
    }

    let config = ForwardingConfig::new(Some(args.destination.clone()), settings);
    let report = forwarding.update_local_config(&config)?;
    info!(
        "local log forwarding updated: structured={}, flat={}",
        report.structured.as_str(),
        report.flat.as_str()
    );
    forwarding.get_local_config()
}

/// Applies the local configuration. Returns false when nothing changed and `force` is unset.
fn push(forwarding: &mut LogForwarding<FileService>, dir: &Path, force: bool) -> Result<bool> {
    let lookup = env_lookup(dir)?;
    if !force && !forwarding.is_local_config_changed(&lookup)? {
        return Ok(false);
    }
    let local = forwarding.get_local_config_with_secrets(&lookup)?;
    forwarding.update_server_config(&local)?;
    Ok(true)
}

fn print_config(label: &str, config: &ForwardingConfig) {
    println!(
        "{label}: {} {}",
        config.destination_or_default(),
        Value::Object(config.settings().clone())
    );
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
