mod cli;
mod commands;
mod error;
mod output;

use std::time::Duration;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, ValueEnum};
use tracing_subscriber::EnvFilter;

use commax_config::{KeyringStore, NoSecretStore, SecretStore};
use commax_core::BridgeConfig;

use crate::cli::{Cli, ColorMode, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let matches = Cli::command().get_matches();
    let mut cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_tracing(cli.global.verbose);
    apply_config_defaults(&mut cli.global, &matches);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Fill `--output` and `--color` from the config's `[defaults]` when
/// neither the command line nor the environment set them.
fn apply_config_defaults(global: &mut GlobalOpts, matches: &ArgMatches) {
    let unset = |id: &str| matches.value_source(id) == Some(ValueSource::DefaultValue);
    let (output_unset, color_unset) = (unset("output"), unset("color"));
    if !output_unset && !color_unset {
        return;
    }

    let cfg = match commands::config_cmd::load(global) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::debug!(error = %e, "config unavailable, keeping built-in output defaults");
            return;
        }
    };

    if output_unset {
        match <OutputFormat as ValueEnum>::from_str(&cfg.defaults.output, true) {
            Ok(format) => global.output = format,
            Err(_) => tracing::warn!(value = %cfg.defaults.output, "ignoring unknown default output format"),
        }
    }
    if color_unset {
        match <ColorMode as ValueEnum>::from_str(&cfg.defaults.color, true) {
            Ok(mode) => global.color = mode,
            Err(_) => tracing::warn!(value = %cfg.defaults.color, "ignoring unknown default color mode"),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands never log in
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "commax", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let config = build_bridge_config(&cli.global)?;
            tracing::debug!(command = ?cmd, resource_no = %config.resource_no, "dispatching command");
            commands::dispatch(cmd, config, &cli.global).await
        }
    }
}

/// Build a `BridgeConfig` from the config file, profile, and CLI overrides.
fn build_bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let cfg = commands::config_cmd::load(global)?;
    let (name, profile) = cfg.profile(global.profile.as_deref())?;

    let store: &dyn SecretStore = if global.no_keyring {
        &NoSecretStore
    } else {
        &KeyringStore
    };
    let mut config = commax_config::profile_to_bridge_config(profile, name, &cfg.defaults, store)?;

    if let Some(secs) = global.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}
