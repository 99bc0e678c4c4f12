//! Commands for the Waypoint CLI.

/// Command for showing what each stage of each app would use.
pub mod inspect;
/// Command for checking a configuration file.
pub mod validate;
