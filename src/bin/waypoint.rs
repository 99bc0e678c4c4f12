use std::process::ExitCode;

use clap::Parser;
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;
use waypoint_cli::{report::write_error_report, WaypointApp};

fn main() -> ExitCode {
    let stderr = std::io::stderr();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(stderr.is_terminal())
        .init();

    match WaypointApp::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Nothing more can be reported if stderr itself is gone.
            let _ = write_error_report(&mut stderr.lock(), &err);
            ExitCode::FAILURE
        }
    }
}
