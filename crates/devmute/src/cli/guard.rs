//! `guard` subcommand — disable devices until Ctrl+C, then re-enable them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{
    DisableReport, EnableReport, GlobalOpts, GuardOutput, MicMute, RUNNING, Result,
    effective_config, open_manager, plural, print_json,
};
use devmute_lib::DeviceManager;
use devmute_lib::control::DeviceControl;

/// Extra enable passes for devices devcon did not confirm.
const ENABLE_RETRIES: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(super) fn cmd_guard(opts: &GlobalOpts, names: Vec<String>, duration: Option<u64>) -> Result<()> {
    let config = effective_config(opts);
    let mut manager = open_manager(&config)?;

    let names = if names.is_empty() {
        config.devices.clone()
    } else {
        names
    };
    let disable = if names.is_empty() {
        manager.disable_devices::<String>(None)
    } else {
        manager.disable_devices(Some(names.as_slice()))
    };

    if !opts.json {
        print_disable_report(&disable);
    }

    if !disable.disabled.is_empty() {
        if !opts.json {
            match duration {
                Some(secs) => println!("Re-enabling in {secs}s (Ctrl+C to restore now)..."),
                None => println!("Press Ctrl+C to re-enable."),
            }
        }
        let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        wait_for_release(&RUNNING, deadline);
    }

    let enable = restore(&mut manager, ENABLE_RETRIES, RETRY_DELAY)?;

    if opts.json {
        return print_json(&GuardOutput {
            disabled: disable.disabled,
            failed: disable.failed,
            enabled: enable.enabled,
            pending: enable.pending,
        });
    }
    print_enable_report(&enable);
    Ok(())
}

/// Block until `running` is cleared or `deadline` passes.
fn wait_for_release(running: &AtomicBool, deadline: Option<Instant>) {
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Re-enable everything, retrying unconfirmed devices up to `retries` times.
///
/// The returned report accumulates every pass; `pending` holds only what is
/// still disabled at the end.
fn restore<C: DeviceControl, M: MicMute>(
    manager: &mut DeviceManager<C, M>,
    retries: u32,
    delay: Duration,
) -> Result<EnableReport> {
    let mut total = manager.enable_devices()?;
    for attempt in 1..=retries {
        if total.pending.is_empty() {
            break;
        }
        log::info!(
            "retrying {} device{} (attempt {attempt}/{retries})",
            total.pending.len(),
            plural(total.pending.len())
        );
        std::thread::sleep(delay);
        let pass = manager.enable_devices()?;
        total.enabled.extend(pass.enabled);
        total.pending = pass.pending;
    }
    Ok(total)
}

fn print_disable_report(report: &DisableReport) {
    if report.disabled.is_empty() && report.failed.is_empty() {
        println!("No matching devices to disable.");
        return;
    }
    for dev in &report.disabled {
        println!("  disabled  {} ({})", dev.name, dev.id);
    }
    for failure in &report.failed {
        println!("  FAILED    {} ({}): {}", failure.device.name, failure.device.id, failure.reason);
    }
}

fn print_enable_report(report: &EnableReport) {
    for dev in &report.enabled {
        println!("  enabled   {} ({})", dev.name, dev.id);
    }
    if !report.pending.is_empty() {
        eprintln!(
            "{} device{} could not be re-enabled:",
            report.pending.len(),
            plural(report.pending.len())
        );
        for dev in &report.pending {
            eprintln!("  {} ({})", dev.name, dev.id);
        }
    }
}
