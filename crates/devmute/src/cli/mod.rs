//! CLI subcommands — catalog listing, guarded disable/enable, mute control.

mod config_cmd;
mod devices;
mod find;
mod guard;
mod mute;
mod simple;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use devmute_lib::audio::{self, MicMute, PlatformMute};
pub(super) use devmute_lib::config::Config;
pub(super) use devmute_lib::control::{DevconControl, Device};
pub(super) use devmute_lib::error::Result;
pub(super) use devmute_lib::manager::{DeviceFailure, DisableReport, EnableReport};
pub(super) use devmute_lib::{DeviceManager, DevmuteError};

/// Options shared by every subcommand.
pub struct GlobalOpts {
    pub json: bool,
    pub config: Option<PathBuf>,
    pub devcon: Option<PathBuf>,
    pub no_mute: bool,
}

pub(super) type Manager = DeviceManager<DevconControl, PlatformMute>;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

pub(super) fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DevmuteError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

/// Load the config from `custom_path`, or the platform default.
///
/// Parse problems are logged and defaults used.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    match custom_path {
        Some(path) => {
            let (config, warnings) = Config::load_from(path);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    }
}

/// Effective config: file settings with command-line overrides applied.
pub(super) fn effective_config(opts: &GlobalOpts) -> Config {
    let mut config = load_config(opts.config.as_deref());
    if let Some(devcon) = &opts.devcon {
        config.devcon_path = devcon.display().to_string();
    }
    if opts.no_mute {
        config.mute_microphone = false;
    }
    config
}

/// Build a manager over the configured devcon binary.
///
/// Unlike the library, the CLI treats a failed enumeration as fatal.
pub(super) fn open_manager(config: &Config) -> Result<Manager> {
    config.check()?;
    let control = DevconControl::new(&config.devcon_path).with_timeout(config.command_timeout());
    let mut manager = DeviceManager::new(control, audio::platform_mute()?, config.policy());
    manager.set_mute_microphone(config.mute_microphone);
    if !manager.is_available() {
        return Err(DevmuteError::EnumerationUnavailable(format!(
            "could not run {}",
            config.devcon_path
        )));
    }
    Ok(manager)
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<Device>,
}

#[derive(Serialize)]
pub(super) struct FindOutput {
    pub query: String,
    pub device: Device,
    pub unique_id: String,
}

#[derive(Serialize)]
pub(super) struct GuardOutput {
    pub disabled: Vec<Device>,
    pub failed: Vec<DeviceFailure>,
    pub enabled: Vec<Device>,
    pub pending: Vec<Device>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub problems: Vec<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every device known to devcon
    Devices {
        /// Only show devices whose name or id contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show which device a query matches and its unique id
    Find {
        /// Part of a device name or instance id
        query: String,
    },

    /// Disable devices, wait for Ctrl+C, then re-enable them
    Guard {
        /// Device names to disable (default: config `devices`, else webcams and microphones)
        names: Vec<String>,
        /// Re-enable after this many seconds instead of waiting for Ctrl+C
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Disable the Image and MEDIA classes outright (untracked)
    DisableSimple,

    /// Enable the Image and MEDIA classes outright (untracked)
    EnableSimple,

    /// Mute the default capture device
    Mute,

    /// Unmute the default capture device
    Unmute,

    /// Show current configuration and file path
    Config,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &GlobalOpts) -> Result<()> {
    match cmd {
        Command::Devices { filter } => devices::cmd_devices(opts, filter.as_deref()),
        Command::Find { query } => find::cmd_find(opts, &query),
        Command::Guard { names, duration } => guard::cmd_guard(opts, names, duration),
        Command::DisableSimple => {
            if opts.json {
                warn_json_unsupported("disable-simple");
            }
            simple::cmd_simple(opts, simple::SimpleAction::Disable)
        }
        Command::EnableSimple => {
            if opts.json {
                warn_json_unsupported("enable-simple");
            }
            simple::cmd_simple(opts, simple::SimpleAction::Enable)
        }
        Command::Mute => {
            if opts.json {
                warn_json_unsupported("mute");
            }
            mute::cmd_set_mute(mute::MuteAction::Mute)
        }
        Command::Unmute => {
            if opts.json {
                warn_json_unsupported("unmute");
            }
            mute::cmd_set_mute(mute::MuteAction::Unmute)
        }
        Command::Config => config_cmd::cmd_config(opts),
    }
}
