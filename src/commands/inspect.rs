use std::{io::Write, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use waypoint_core::{
    config::{
        expressions::EnvProvider, App, AsOperation, Config, EvalContext, Labels, Operation,
        DEFAULT_CONFIG_FILE,
    },
    factory::ComponentType,
    group_hooks,
};

/// Show the plugin, labels and hooks of every stage of every app.
#[derive(Parser, Debug)]
#[clap(about = "Show what each app stage is configured to use")]
pub struct InspectCommand {
    /// Path to the configuration file.
    #[clap(short = 'f', long = "file", default_value = DEFAULT_CONFIG_FILE)]
    pub file: PathBuf,

    /// Set a variable (key=value) for expressions in the configuration.
    /// Variables are also read from WAYPOINT_VAR_* environment variables.
    #[clap(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

impl InspectCommand {
    pub fn run(self) -> Result<()> {
        let config = Config::load_file(&self.file)?;
        config
            .validate()
            .with_context(|| format!("{} is not valid", self.file.display()))?;

        let mut ctx = EvalContext::new();
        ctx.add_provider(EnvProvider::default());
        for (key, value) in self.vars {
            ctx.set(key, value)?;
        }

        let stdout = std::io::stdout();
        write_report(&config, &ctx, &mut stdout.lock())
    }
}

fn write_report(config: &Config, ctx: &EvalContext, out: &mut impl Write) -> Result<()> {
    writeln!(out, "project {:?}", config.project().unwrap_or_default())?;
    write_labels(out, "", &config.labels()?)?;
    for app in config.apps()? {
        writeln!(out, "app {:?}", app.name())?;
        write_labels(out, "  ", app.labels())?;
        for component_type in ComponentType::ALL {
            let stanza = stanza_name(component_type);
            match operation(&app, component_type, ctx)
                .with_context(|| format!("failed to inspect app {:?}", app.name()))?
            {
                None => writeln!(out, "  {stanza}: not configured")?,
                Some(op) => write_operation(out, stanza, op)?,
            }
        }
    }
    Ok(())
}

fn write_operation(out: &mut impl Write, stanza: &str, op: Operation) -> Result<()> {
    match &op.use_ {
        Some(use_) => writeln!(out, "  {stanza}: {}", use_.plugin)?,
        None => writeln!(out, "  {stanza}: no plugin")?,
    }
    write_labels(out, "    ", &op.labels)?;
    for (when, hooks) in group_hooks(op.hooks) {
        writeln!(out, "    hooks {when}:")?;
        for hook in hooks {
            let policy = if hook.continue_on_failure() {
                " (continue on failure)"
            } else {
                ""
            };
            writeln!(out, "      {}{policy}", hook.command.join(" "))?;
        }
    }
    Ok(())
}

fn write_labels(out: &mut impl Write, indent: &str, labels: &Labels) -> Result<()> {
    for (key, value) in labels {
        writeln!(out, "{indent}label {key} = {value:?}")?;
    }
    Ok(())
}

fn stanza_name(component_type: ComponentType) -> &'static str {
    match component_type {
        ComponentType::Builder => "build",
        ComponentType::Registry => "registry",
        ComponentType::Platform => "deploy",
        ComponentType::ReleaseManager => "release",
    }
}

fn operation(
    app: &App,
    component_type: ComponentType,
    ctx: &EvalContext,
) -> waypoint_core::config::Result<Option<Operation>> {
    Ok(match component_type {
        ComponentType::Builder => app.build(ctx)?.map(AsOperation::into_operation),
        ComponentType::Registry => app.registry(ctx)?.map(AsOperation::into_operation),
        ComponentType::Platform => app.deploy(ctx)?.map(AsOperation::into_operation),
        ComponentType::ReleaseManager => app.release(ctx)?.map(AsOperation::into_operation),
    })
}

// Parse the variables passed in `key=value` pairs.
fn parse_var(var: &str) -> Result<(String, String)> {
    if let Some((key, value)) = var.split_once('=') {
        Ok((key.to_owned(), value.to_owned()))
    } else {
        bail!("Variable must be of the form `key=value`")
    }
}
