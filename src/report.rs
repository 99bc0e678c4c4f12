use std::io::{self, Write};

use waypoint_config::ValidationErrors;

/// Writes an error followed by its causes. Validation problems are listed one
/// per line so each keeps its location.
pub fn write_error_report(out: &mut impl Write, err: &anyhow::Error) -> io::Result<()> {
    writeln!(out, "Error: {err}")?;
    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_none() {
        return Ok(());
    }
    writeln!(out, "\nCaused by:")?;
    for cause in causes {
        match validation_errors(cause) {
            Some(errors) => {
                for error in errors.iter() {
                    writeln!(out, "   * {error}")?;
                }
            }
            None => writeln!(out, "      {cause}")?,
        }
    }
    Ok(())
}

fn validation_errors<'a>(
    cause: &'a (dyn std::error::Error + 'static),
) -> Option<&'a ValidationErrors> {
    let config_err = cause.downcast_ref::<waypoint_config::Error>().or_else(|| {
        match cause.downcast_ref::<waypoint_core::Error>() {
            Some(waypoint_core::Error::Config(err)) => Some(err),
            _ => None,
        }
    });
    match config_err {
        Some(waypoint_config::Error::Validation(errors)) => Some(errors),
        _ => cause.downcast_ref::<ValidationErrors>(),
    }
}
