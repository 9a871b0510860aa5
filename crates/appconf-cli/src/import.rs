use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use appconf_core::constants::FLAT_PREFIX;
use appconf_core::{AppconfSettings, WritePolicy, WriteReport};
use appconf_import::{import_and_write, ImportOptions};

use crate::prompt::TerminalPrompter;
use crate::ImportArgs;

/// Runs the `import` command: writes `.aio` and `.env` into `dir`.
#[instrument(skip(settings, args), fields(file = %args.file.display()))]
pub fn run(dir: &Path, settings: &AppconfSettings, args: &ImportArgs) -> Result<()> {
    let report = import_file(dir, settings, args)?;
    println!(".aio: {}", report.structured.as_str());
    println!(".env: {}", report.flat.as_str());
    Ok(())
}

fn import_file(dir: &Path, settings: &AppconfSettings, args: &ImportArgs) -> Result<WriteReport> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file.display()))?;

    let options = import_options(settings, args);
    let policy = WritePolicy {
        overwrite: args.overwrite,
        merge: args.merge,
        interactive: args.interactive,
    };

    let mut prompter = TerminalPrompter;
    let report = import_and_write(&text, dir, &options, policy, &mut prompter)
        .with_context(|| format!("failed to import '{}'", args.file.display()))?;
    info!("imported into {}", dir.display());
    Ok(report)
}

/// Command-line flags win over `appconf.toml`.
fn import_options(settings: &AppconfSettings, args: &ImportArgs) -> ImportOptions {
    ImportOptions {
        org_id: args
            .org_id
            .clone()
            .or_else(|| settings.project.org_id.clone()),
        prefer_legacy: args.use_jwt || settings.import.prefer_legacy,
        runtime_api_host: args
            .runtime_api_host
            .clone()
            .or_else(|| settings.import.runtime_api_host.clone()),
        flat_prefix: settings
            .import
            .flat_prefix
            .clone()
            .unwrap_or_else(|| FLAT_PREFIX.to_string()),
    }
}
