//! `disable-simple` / `enable-simple` subcommands — toggle whole classes.

use super::{GlobalOpts, Result, effective_config, open_manager};

pub(super) enum SimpleAction {
    Disable,
    Enable,
}

/// No catalog matching, no blacklist and no tracking: every device in the
/// `Image` and `MEDIA` classes is toggled.
pub(super) fn cmd_simple(opts: &GlobalOpts, action: SimpleAction) -> Result<()> {
    let config = effective_config(opts);
    let mut manager = open_manager(&config)?;
    match action {
        SimpleAction::Disable => {
            manager.disable_devices_simple()?;
            println!("Image and MEDIA classes: DISABLED");
        }
        SimpleAction::Enable => {
            manager.enable_devices_simple()?;
            println!("Image and MEDIA classes: ENABLED");
        }
    }
    Ok(())
}
