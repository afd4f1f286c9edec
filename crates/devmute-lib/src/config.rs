//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::Policy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the devcon-compatible control binary. Default: "devcon.exe" (resolved via PATH).
    #[serde(default = "default_devcon_path")]
    pub devcon_path: String,

    /// Per-invocation timeout for the control binary, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Include webcams (class `Image`, camera name patterns) in the default set.
    #[serde(default = "default_true")]
    pub disable_webcams: bool,

    /// Include microphones (class `MEDIA`, `Microphone` pattern) in the default set.
    #[serde(default = "default_true")]
    pub disable_microphones: bool,

    /// Add class `Net` to the default set.
    #[serde(default)]
    pub disable_network_devices: bool,

    /// Add class `Bluetooth` to the default set.
    #[serde(default)]
    pub disable_bluetooth_devices: bool,

    /// Mute the default capture endpoint while devices are disabled.
    #[serde(default = "default_true")]
    pub mute_microphone: bool,

    /// Explicit device names to disable. Empty = default policy.
    #[serde(default)]
    pub devices: Vec<String>,
}

fn default_devcon_path() -> String {
    "devcon.exe".into()
}
fn default_command_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            devcon_path: default_devcon_path(),
            command_timeout_secs: default_command_timeout_secs(),
            disable_webcams: true,
            disable_microphones: true,
            disable_network_devices: false,
            disable_bluetooth_devices: false,
            mute_microphone: true,
            devices: Vec::new(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `devcon_path` is empty or whitespace-only.
    EmptyDevconPath,
    /// `command_timeout_secs` is zero.
    ZeroTimeout,
    /// A `devices` entry is blank (it would match nothing).
    BlankDeviceName { index: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyDevconPath => write!(f, "devcon_path cannot be empty"),
            ValidationError::ZeroTimeout => {
                write!(f, "command_timeout_secs must be at least 1")
            }
            ValidationError::BlankDeviceName { index } => {
                write!(f, "devices[{index}] is blank")
            }
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("devmute"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// The disable policy described by the four `disable_*` flags.
    pub fn policy(&self) -> Policy {
        Policy {
            disable_webcams: self.disable_webcams,
            disable_microphones: self.disable_microphones,
            disable_network_devices: self.disable_network_devices,
            disable_bluetooth_devices: self.disable_bluetooth_devices,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Explicit device names, or `None` when the default policy applies.
    pub fn device_names(&self) -> Option<&[String]> {
        if self.devices.is_empty() {
            None
        } else {
            Some(&self.devices)
        }
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.devcon_path.trim().is_empty() {
            errors.push(ValidationError::EmptyDevconPath);
        }
        if self.command_timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout);
        }
        for (index, name) in self.devices.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(ValidationError::BlankDeviceName { index });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Like [`validate`](Self::validate), folding all problems into one error.
    pub fn check(&self) -> crate::error::Result<()> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            crate::DevmuteError::Config(msgs.join("; "))
        })
    }
}
