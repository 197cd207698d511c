//! Clap derive structures for the `commax` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// commax -- control COMMAX smart-home devices through the vendor cloud
#[derive(Debug, Parser)]
#[command(
    name = "commax",
    version,
    about = "Control COMMAX IoT devices from the command line",
    long_about = "Logs in to the COMMAX IoT cloud with a configured account profile,\n\
        lists the devices registered to a resource, watches their state and\n\
        sends on/off, temperature, fan preset or raw sub-device commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "COMMAX_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "COMMAX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "COMMAX_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "COMMAX_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Skip the OS keyring when resolving credentials
    #[arg(long, env = "COMMAX_NO_KEYRING", global = true)]
    pub no_keyring: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and inspect registered devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Poll the cloud and print every published snapshot
    Watch(WatchArgs),

    /// Turn a device on
    On(TargetArgs),

    /// Turn a device off
    Off(TargetArgs),

    /// Set a boiler's target temperature
    #[command(alias = "temp")]
    Temperature(TemperatureArgs),

    /// Set a fan's ventilation preset
    Preset(PresetArgs),

    /// Write a raw value to one sub-device
    Set(SetArgs),

    /// Inspect CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices in vendor order
    #[command(alias = "ls")]
    List,

    /// Show one device and its sub-devices
    Get {
        /// Device UUID (`rootUuid`)
        device: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Polling interval in seconds (overrides profile, minimum 5)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Exit after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMMANDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Device UUID (`rootUuid`)
    pub device: String,
}

#[derive(Debug, Args)]
pub struct TemperatureArgs {
    /// Device UUID (`rootUuid`)
    pub device: String,

    /// Target temperature, sent as given
    #[arg(allow_negative_numbers = true)]
    pub celsius: f64,
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    /// Device UUID (`rootUuid`)
    pub device: String,

    pub preset: PresetArg,

    /// Also switch the fan on in the same request
    #[arg(long)]
    pub power_on: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PresetArg {
    Bypass,
    Manual,
    Auto,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device UUID (`rootUuid`)
    pub device: String,

    /// Sub-device UUID (`subUuid`)
    pub sub_device: String,

    /// Raw vendor value, e.g. "1" or "22.5"
    pub value: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the loaded configuration with secrets masked
    Show,

    /// List configured profiles
    Profiles,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
