use std::io::IsTerminal;

use anyhow::{bail, Result};
use dialoguer::Select;

use appconf_core::Prompter;

/// Asks conflict questions on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn choose_one(&mut self, message: &str, options: &[&str]) -> Result<usize> {
        if !std::io::stdin().is_terminal() {
            bail!(
                "'{message}' requires an interactive terminal.\n\
                 Use --merge or --overwrite for non-interactive runs."
            );
        }

        let selection = Select::new()
            .with_prompt(message)
            .items(options)
            .default(0)
            .interact()?;
        Ok(selection)
    }
}
