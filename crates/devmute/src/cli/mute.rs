//! `mute` / `unmute` subcommands — set OS microphone mute state.

use super::{MicMute, Result, audio};

pub(super) enum MuteAction {
    Mute,
    Unmute,
}

/// Set OS mute state only; devices are left alone.
pub(super) fn cmd_set_mute(action: MuteAction) -> Result<()> {
    let target = match action {
        MuteAction::Mute => true,
        MuteAction::Unmute => false,
    };

    audio::platform_mute()?.set_muted(target)?;

    println!("Microphone: {}", if target { "MUTED" } else { "UNMUTED" });
    Ok(())
}
