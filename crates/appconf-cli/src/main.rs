use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use appconf_core::constants::SETTINGS_FILE;
use appconf_core::{writer, AppconfSettings};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod forwarding;
mod import;
mod prompt;
mod remote;
mod styles;

use styles as s;

/// The command-line interface for appconf.
#[derive(Debug, Parser)]
#[command(name = "appconf")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(
    help_template = "{bin} {version}\n\n{about-with-newline}{usage-heading} {usage}\n\n{all-args}{after-help}"
)]
#[command(about = "Import workspace configuration and reconcile log forwarding")]
#[command(
    long_about = "appconf imports a downloaded workspace configuration into a project, keeping
secrets in .env and everything else in .aio, and keeps the project's log
forwarding destination in sync with the runtime service.
"
)]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mappconf import console.json\x1b[0m          \x1b[2m# Write .aio and .env\x1b[0m\n  \x1b[36mappconf import console.json --merge\x1b[0m  \x1b[2m# Merge into existing files\x1b[0m\n  \x1b[36mappconf forwarding status\x1b[0m            \x1b[2m# Compare local and remote forwarding\x1b[0m"
)]
pub(crate) struct Cli {
    /// Project directory holding .aio and .env.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,
    /// Path to the appconf settings file, relative to the project directory.
    #[arg(long = "settings", global = true, default_value = SETTINGS_FILE)]
    settings_file: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Import a downloaded workspace configuration (JSON or YAML).
    Import(ImportArgs),
    /// Inspect and reconcile the log forwarding destination.
    #[command(subcommand)]
    Forwarding(ForwardingCommand),
}

#[derive(Debug, Args)]
pub(crate) struct ImportArgs {
    /// Workspace configuration file.
    pub file: PathBuf,
    /// Overwrite existing files.
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
    /// Merge into existing files.
    #[arg(long, default_value_t = false)]
    pub merge: bool,
    /// Ask what to do for each existing file.
    #[arg(long, short, default_value_t = false)]
    pub interactive: bool,
    /// Prefer the legacy service credential over OAuth server-to-server.
    #[arg(long, default_value_t = false)]
    pub use_jwt: bool,
    /// Organization id for credentials that lack one.
    #[arg(long)]
    pub org_id: Option<String>,
    /// Runtime API host written next to the namespace credentials.
    #[arg(long)]
    pub runtime_api_host: Option<String>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ForwardingCommand {
    /// Print the local and the applied configuration.
    Get(RemoteArgs),
    /// Report whether the local configuration differs from the applied one.
    Status(RemoteArgs),
    /// Declare a destination locally.
    Set(SetArgs),
    /// Apply the local configuration to the service.
    Push(PushArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RemoteArgs {
    /// File standing in for the runtime service's applied configuration.
    #[arg(long, default_value = "dist/log-forwarding-remote.json")]
    pub remote_state: PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct SetArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// Destination name, e.g. `splunk_hec`.
    pub destination: String,
    /// Destination setting as `name=value`; repeatable.
    #[arg(long = "setting", short = 's', value_parser = parse_setting)]
    pub settings: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub(crate) struct PushArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    /// Apply even when no local change was detected.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

fn parse_setting(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, setting)) if !name.is_empty() => Ok((name.to_string(), setting.to_string())),
        _ => Err(format!("expected name=value, got '{value}'")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let settings = AppconfSettings::load_or_default(&settings_path(&cli))?;
    execute(&cli, &settings, command)
}

fn settings_path(cli: &Cli) -> PathBuf {
    if cli.settings_file.is_absolute() {
        cli.settings_file.clone()
    } else {
        cli.dir.join(&cli.settings_file)
    }
}

fn execute(cli: &Cli, settings: &AppconfSettings, command: &Command) -> Result<()> {
    match command {
        Command::Import(args) => import::run(&cli.dir, settings, args),
        Command::Forwarding(command) => forwarding::run(&cli.dir, settings, command),
    }
}

/// Looks a key up in the project's `.env` first, then in the process environment.
pub(crate) fn env_lookup(dir: &Path) -> Result<impl Fn(&str) -> Option<String>> {
    let flat = writer::read_flat(dir)?;
    Ok(move |key: &str| flat.get_str(key).or_else(|| std::env::var(key).ok()))
}
