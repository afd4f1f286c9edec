//! Disable-set builder: turns a policy or an explicit name list into
//! selected devices.

use crate::catalog::Catalog;
use crate::control::{ControlCommand, DeviceControl, Selector, parse_device_line};
use crate::policy::Policy;
use crate::tracker::StateTracker;

/// Select every device of the policy's classes, then the first catalog match
/// of each policy name pattern. Returns the number of devices added.
///
/// A class whose enumeration fails is logged and skipped.
pub fn add_default_candidates(
    control: &impl DeviceControl,
    catalog: &Catalog,
    policy: &Policy,
    tracker: &mut StateTracker,
) -> usize {
    let mut added = 0;
    for class in policy.candidate_classes() {
        let lines = match control.query(ControlCommand::Find, &Selector::class(class)) {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("could not enumerate class {class}: {e}");
                continue;
            }
        };
        for device in lines.iter().filter_map(|l| parse_device_line(l)) {
            log::debug!("found default device {} ({class})", device.id);
            if tracker.add_device_to_disable(device) {
                added += 1;
            }
        }
    }
    for pattern in policy.candidate_patterns() {
        if let Some(device) = catalog.find_by_query(pattern)
            && tracker.add_device_to_disable(device.clone())
        {
            added += 1;
        }
    }
    added
}

/// Select the first catalog match of each name. Unmatched names are skipped.
pub fn add_explicit_candidates<S: AsRef<str>>(
    catalog: &Catalog,
    names: &[S],
    tracker: &mut StateTracker,
) -> usize {
    let mut added = 0;
    for name in names {
        match catalog.find_by_query(name.as_ref()) {
            Some(device) => {
                if tracker.add_device_to_disable(device.clone()) {
                    added += 1;
                }
            }
            None => log::debug!("no device matches '{}'", name.as_ref()),
        }
    }
    added
}
