//! Unified error type for the devmute-lib crate.
//!
//! [`DevmuteError`] covers the engine's error kinds (enumeration unavailable,
//! no unique match, control command failed, enable failed) and wraps the
//! module-specific errors (`ControlError`, `AudioError`). `From` impls allow
//! `?` to propagate across module boundaries.

use std::fmt;
use std::time::Duration;

use crate::audio::AudioError;
use crate::control::{ControlCommand, ControlError};

/// Why a query could not be narrowed down to a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
    /// Nothing in the catalog matched the query.
    NotInCatalog,
    /// The identifier was truncated to nothing without a unique match.
    Exhausted,
    /// The control service failed while narrowing (message of the cause).
    Service(String),
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::NotInCatalog => write!(f, "no catalog entry matches"),
            MatchFailure::Exhausted => write!(f, "identifier exhausted without a unique match"),
            MatchFailure::Service(e) => write!(f, "service error: {e}"),
        }
    }
}

/// Unified error type for devmute-lib operations.
#[derive(Debug)]
pub enum DevmuteError {
    /// The enumeration/control binary could not be located or started.
    EnumerationUnavailable(String),
    /// A query could not be resolved to exactly one device.
    NoUniqueMatch { query: String, reason: MatchFailure },
    /// The service answered without the expected success marker.
    ControlCommandFailed {
        command: ControlCommand,
        selector: String,
    },
    /// A service invocation exceeded its timeout.
    ControlTimeout { selector: String, after: Duration },
    /// A tracked device could not be re-enabled and may stay disabled.
    EnableFailed {
        id: String,
        source: Box<DevmuteError>,
    },
    /// Microphone mute/unmute failed.
    AudioMuteFailed(AudioError),
    /// Any other control-service failure (output capture, process wait).
    Control(ControlError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl fmt::Display for DevmuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevmuteError::EnumerationUnavailable(e) => {
                write!(f, "Device enumeration unavailable: {e}")
            }
            DevmuteError::NoUniqueMatch { query, reason } => {
                write!(f, "No unique device match for '{query}': {reason}")
            }
            DevmuteError::ControlCommandFailed { command, selector } => {
                write!(f, "Control command '{command} {selector}' did not succeed")
            }
            DevmuteError::ControlTimeout { selector, after } => {
                write!(f, "Control command for '{selector}' timed out after {after:?}")
            }
            DevmuteError::EnableFailed { id, source } => {
                write!(f, "Unable to re-enable device {id}: {source}")
            }
            DevmuteError::AudioMuteFailed(e) => write!(f, "{e}"),
            DevmuteError::Control(e) => write!(f, "{e}"),
            DevmuteError::Io(e) => write!(f, "I/O error: {e}"),
            DevmuteError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for DevmuteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DevmuteError::EnableFailed { source, .. } => Some(source.as_ref()),
            DevmuteError::AudioMuteFailed(e) => Some(e),
            DevmuteError::Control(e) => Some(e),
            DevmuteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ControlError> for DevmuteError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::Unavailable(msg) => DevmuteError::EnumerationUnavailable(msg),
            ControlError::Timeout { selector, after } => {
                DevmuteError::ControlTimeout { selector, after }
            }
            other => DevmuteError::Control(other),
        }
    }
}

impl From<AudioError> for DevmuteError {
    fn from(e: AudioError) -> Self {
        DevmuteError::AudioMuteFailed(e)
    }
}

impl From<std::io::Error> for DevmuteError {
    fn from(e: std::io::Error) -> Self {
        DevmuteError::Io(e)
    }
}

/// Crate-level Result alias using [`DevmuteError`].
pub type Result<T> = std::result::Result<T, DevmuteError>;
