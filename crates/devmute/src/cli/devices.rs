//! `devices` subcommand — list the device catalog.

use super::{DevicesOutput, GlobalOpts, Result, effective_config, open_manager, plural, print_json};

pub(super) fn cmd_devices(opts: &GlobalOpts, filter: Option<&str>) -> Result<()> {
    let config = effective_config(opts);
    let manager = open_manager(&config)?;
    let catalog = manager.catalog();
    let devices: Vec<_> = match filter {
        Some(q) => catalog.filter(q).into_iter().cloned().collect(),
        None => catalog.devices().iter().cloned().collect(),
    };

    if opts.json {
        return print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("Found {} device{}:", devices.len(), plural(devices.len()));
    println!();

    let width = devices.iter().map(|d| d.id.len()).max().unwrap_or(0);
    for dev in &devices {
        println!("  {:<width$}  {}", dev.id, dev.name);
    }

    Ok(())
}
