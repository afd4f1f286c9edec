//! Disable bookkeeping: devices selected for disabling and devices confirmed
//! disabled.
//!
//! The two sets are independent records. The selected set is rebuilt on
//! every disable run; the confirmed set lives as long as the manager and is
//! the only source of truth for what must be re-enabled.

use crate::catalog::DeviceMap;
use crate::control::Device;
use crate::policy::is_blacklisted;

#[derive(Debug, Default)]
pub struct StateTracker {
    selected: DeviceMap,
    disabled: DeviceMap,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `device` for disabling.
    ///
    /// Blacklisted devices and ids already selected are silently skipped;
    /// returns whether the device was added.
    pub fn add_device_to_disable(&mut self, device: Device) -> bool {
        if is_blacklisted(&device) {
            log::info!("skipping blacklisted device: {} ({})", device.name, device.id);
            return false;
        }
        let id = device.id.clone();
        let added = self.selected.insert(device);
        if added {
            log::debug!("selected for disabling: {id}");
        }
        added
    }

    /// Forget the previous selection.
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Record a device the control service confirmed as disabled.
    pub fn confirm_disabled(&mut self, device: Device) -> bool {
        self.disabled.insert(device)
    }

    /// Drop a device the control service confirmed as enabled again.
    pub fn confirm_enabled(&mut self, id: &str) -> Option<Device> {
        self.disabled.remove(id)
    }

    /// Devices selected by the last disable run (Disable-Set).
    pub fn selected(&self) -> &DeviceMap {
        &self.selected
    }

    /// Devices confirmed disabled and awaiting re-enable (Active-Disabled-Set).
    pub fn disabled(&self) -> &DeviceMap {
        &self.disabled
    }
}
