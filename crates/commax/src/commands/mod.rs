//! Command dispatch: CLI args -> bridge calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod watch;

use commax_core::BridgeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    config: BridgeConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::On(args) => control::power(config, args, true, global).await,
        Command::Off(args) => control::power(config, args, false, global).await,
        Command::Temperature(args) => control::temperature(config, args, global).await,
        Command::Preset(args) => control::preset(config, args, global).await,
        Command::Set(args) => control::set_raw(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
