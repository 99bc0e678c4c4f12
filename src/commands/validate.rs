use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use waypoint_config::{Config, DEFAULT_CONFIG_FILE};

/// Check a configuration file for structural problems.
#[derive(Parser, Debug)]
#[clap(about = "Check a waypoint.toml for problems")]
pub struct ValidateCommand {
    /// Path to the configuration file.
    #[clap(short = 'f', long = "file", default_value = DEFAULT_CONFIG_FILE)]
    pub file: PathBuf,
}

impl ValidateCommand {
    pub fn run(self) -> Result<()> {
        let config = Config::load_file(&self.file)?;
        config
            .validate()
            .with_context(|| format!("{} is not valid", self.file.display()))?;
        println!("{} is valid", self.file.display());
        Ok(())
    }
}
