pub mod commands;
pub mod report;

use clap::Parser;

use crate::commands::{inspect::InspectCommand, validate::ValidateCommand};

/// The Waypoint CLI
#[derive(Parser, Debug)]
#[clap(name = "waypoint", version)]
pub enum WaypointApp {
    Validate(ValidateCommand),
    Inspect(InspectCommand),
}

impl WaypointApp {
    /// The main entry point to Waypoint.
    pub fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Validate(cmd) => cmd.run(),
            Self::Inspect(cmd) => cmd.run(),
        }
    }
}
