//! Device manager — sequences catalog, selection, resolution, control and
//! bookkeeping for disable/enable runs.
//!
//! Every operation takes `&mut self` or `&self` on one owned manager, so
//! calls are serialized by the borrow checker and nothing is shared between
//! managers. A manager whose initial enumeration failed is inert: tracked
//! operations log and return empty results.

use serde::Serialize;

use crate::audio::MicMute;
use crate::catalog::Catalog;
use crate::control::{
    ControlCommand, Device, DeviceControl, Selector, reports_disabled, reports_enabled,
};
use crate::error::{DevmuteError, Result};
use crate::policy::{Policy, SIMPLE_CLASSES};
use crate::resolver;
use crate::selection;
use crate::tracker::StateTracker;

/// Where the manager is within an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BuildingCandidates,
    Resolving,
    Disabling,
    Enabling,
}

/// A device that could not be toggled, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceFailure {
    pub device: Device,
    pub reason: String,
}

/// Outcome of [`DeviceManager::disable_devices`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisableReport {
    pub disabled: Vec<Device>,
    pub failed: Vec<DeviceFailure>,
}

/// Outcome of [`DeviceManager::enable_devices`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnableReport {
    pub enabled: Vec<Device>,
    /// Still disabled; retried by the next `enable_devices` call.
    pub pending: Vec<Device>,
}

pub struct DeviceManager<C: DeviceControl, M: MicMute> {
    control: C,
    mute: M,
    catalog: Catalog,
    tracker: StateTracker,
    policy: Policy,
    mute_microphone: bool,
    available: bool,
    phase: Phase,
}

impl<C: DeviceControl, M: MicMute> DeviceManager<C, M> {
    /// Build the catalog through `control`.
    ///
    /// An enumeration failure is logged, not returned: the manager is still
    /// constructed but stays inert (see [`is_available`](Self::is_available)).
    pub fn new(control: C, mute: M, policy: Policy) -> Self {
        let (catalog, available) = match Catalog::build(&control) {
            Ok(catalog) => {
                log::info!("discovered {} devices", catalog.len());
                (catalog, true)
            }
            Err(e) => {
                log::error!("{e}");
                (Catalog::default(), false)
            }
        };
        DeviceManager {
            control,
            mute,
            catalog,
            tracker: StateTracker::new(),
            policy,
            mute_microphone: true,
            available,
            phase: Phase::Idle,
        }
    }

    /// Whether the initial enumeration succeeded.
    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn mute_service(&self) -> &M {
        &self.mute
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut Policy {
        &mut self.policy
    }

    /// Whether disable/enable runs also mute/unmute the default microphone.
    pub fn set_mute_microphone(&mut self, enabled: bool) {
        self.mute_microphone = enabled;
    }

    // ── Listings ──

    pub fn list_device_names(&self) -> Vec<String> {
        self.catalog.list_names()
    }

    pub fn list_device_ids(&self) -> Vec<String> {
        self.catalog.list_ids()
    }

    /// Names selected by the last disable run.
    pub fn list_disabled_device_names(&self) -> Vec<String> {
        self.tracker.selected().names()
    }

    /// Ids selected by the last disable run.
    pub fn list_disabled_device_ids(&self) -> Vec<String> {
        self.tracker.selected().ids()
    }

    /// Names confirmed disabled and not yet re-enabled.
    pub fn list_active_disabled_names(&self) -> Vec<String> {
        self.tracker.disabled().names()
    }

    /// Ids confirmed disabled and not yet re-enabled.
    pub fn list_active_disabled_ids(&self) -> Vec<String> {
        self.tracker.disabled().ids()
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    // ── Single device ──

    /// Resolve `query` to an identifier matching exactly one device.
    pub fn resolve_unique(&self, query: &str) -> Result<String> {
        resolver::resolve_unique(&self.control, &self.catalog, query)
    }

    /// Resolve `query` and disable the device. Returns the resolved id.
    ///
    /// "Ready to be disabled" (reboot pending) counts as success.
    pub fn disable_device_by_string(&mut self, query: &str) -> Result<String> {
        let result = self.disable_one(query);
        self.phase = Phase::Idle;
        result
    }

    fn disable_one(&mut self, query: &str) -> Result<String> {
        self.phase = Phase::Resolving;
        let unique = self.resolve_unique(query)?;
        self.phase = Phase::Disabling;
        let selector = Selector::id(unique.as_str());
        let lines = self.control.query(ControlCommand::Disable, &selector)?;
        if reports_disabled(&lines) {
            Ok(unique)
        } else {
            Err(DevmuteError::ControlCommandFailed {
                command: ControlCommand::Disable,
                selector: unique,
            })
        }
    }

    // ── Tracked runs ──

    /// Disable the devices named in `names`, or the policy defaults when `None`.
    ///
    /// Failures are per device: each is logged once and reported, and the
    /// batch carries on.
    pub fn disable_devices<S: AsRef<str>>(&mut self, names: Option<&[S]>) -> DisableReport {
        let mut report = DisableReport::default();
        if !self.available {
            log::warn!("device enumeration unavailable, nothing to disable");
            return report;
        }
        self.set_muted(true);

        self.phase = Phase::BuildingCandidates;
        self.tracker.clear_selection();
        let added = match names {
            None => selection::add_default_candidates(
                &self.control,
                &self.catalog,
                &self.policy,
                &mut self.tracker,
            ),
            Some(names) => selection::add_explicit_candidates(&self.catalog, names, &mut self.tracker),
        };
        log::debug!("{added} devices selected for disabling");

        let targets: Vec<Device> = self.tracker.selected().iter().cloned().collect();
        for device in targets {
            log::debug!("attempting to disable {}", device.id);
            match self.disable_one(&device.id) {
                Ok(unique) => {
                    log::info!("device disabled: {} ({unique})", device.name);
                    self.tracker.confirm_disabled(device.clone());
                    report.disabled.push(device);
                }
                Err(e) => {
                    log::warn!("unable to disable {}: {e}", device.id);
                    report.failed.push(DeviceFailure {
                        device,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.phase = Phase::Idle;
        report
    }

    /// Re-enable every device confirmed disabled.
    ///
    /// A device whose unique id cannot be resolved aborts the run with
    /// [`DevmuteError::EnableFailed`]. Devices confirmed enabled before the
    /// abort are still removed from the tracked set. A device whose enable
    /// command is not confirmed stays tracked for the next call.
    pub fn enable_devices(&mut self) -> Result<EnableReport> {
        let mut report = EnableReport::default();
        if !self.available {
            log::warn!("device enumeration unavailable, nothing to enable");
            return Ok(report);
        }
        self.set_muted(false);
        let mut fatal = None;

        let targets: Vec<Device> = self.tracker.disabled().iter().cloned().collect();
        for device in targets {
            self.phase = Phase::Resolving;
            let unique = match self.resolve_unique(&device.id) {
                Ok(unique) => unique,
                Err(e) => {
                    log::error!("unable to enable {}: {e}", device.id);
                    fatal = Some(DevmuteError::EnableFailed {
                        id: device.id.clone(),
                        source: Box::new(e),
                    });
                    break;
                }
            };

            self.phase = Phase::Enabling;
            match self.control.query(ControlCommand::Enable, &Selector::id(unique.as_str())) {
                Ok(lines) if reports_enabled(&lines, &device.id) => {
                    log::info!("device re-enabled: {} ({unique})", device.name);
                    report.enabled.push(device);
                }
                Ok(_) => {
                    log::warn!("enable not confirmed for {unique}, will retry");
                    report.pending.push(device);
                }
                Err(e) => {
                    log::warn!("enable failed for {unique}, will retry: {e}");
                    report.pending.push(device);
                }
            }
        }

        for device in &report.enabled {
            self.tracker.confirm_enabled(&device.id);
        }
        self.phase = Phase::Idle;
        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    // ── Untracked shortcuts ──

    /// Disable the `Image` and `MEDIA` classes outright.
    ///
    /// Bypasses the catalog, the blacklist and all tracking.
    pub fn disable_devices_simple(&mut self) -> Result<()> {
        if !self.available {
            log::warn!("device enumeration unavailable, skipping class disable");
            return Ok(());
        }
        self.set_muted(true);
        self.toggle_simple_classes(ControlCommand::Disable)
    }

    /// Enable the `Image` and `MEDIA` classes outright.
    pub fn enable_devices_simple(&mut self) -> Result<()> {
        if !self.available {
            log::warn!("device enumeration unavailable, skipping class enable");
            return Ok(());
        }
        self.set_muted(false);
        self.toggle_simple_classes(ControlCommand::Enable)
    }

    fn toggle_simple_classes(&mut self, command: ControlCommand) -> Result<()> {
        self.phase = if command == ControlCommand::Enable {
            Phase::Enabling
        } else {
            Phase::Disabling
        };
        let result: Result<()> = SIMPLE_CLASSES.iter().try_for_each(|class| {
            let lines = self.control.query(command, &Selector::class(*class))?;
            log::info!("{command} class {class}: {}", lines.last().map_or("", |l| l.as_str()));
            Ok(())
        });
        self.phase = Phase::Idle;
        result
    }

    /// Best-effort mute; failures are logged and never affect device state.
    fn set_muted(&self, muted: bool) {
        if !self.mute_microphone {
            return;
        }
        let outcome = if muted {
            self.mute.mute()
        } else {
            self.mute.unmute()
        };
        if let Err(e) = outcome {
            let verb = if muted { "mute" } else { "unmute" };
            log::warn!("couldn't {verb} microphone: {}", DevmuteError::from(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stub::StubMute;
    use crate::control::mock::MockControl;

    type Manager = DeviceManager<MockControl, StubMute>;

    const DEVICES: &[(&str, &str)] = &[
        ("cam01", "USB Webcam"),
        ("mic02", "Internal Microphone"),
        ("kb03", "USB Keyboard"),
    ];

    fn scripted() -> MockControl {
        let mock = MockControl::with_catalog(DEVICES);
        for (id, _) in DEVICES {
            mock.set_unique(id);
            mock.set_disable_ok(id);
            mock.set_enable_ok(id);
        }
        mock
    }

    fn manager(mock: MockControl) -> Manager {
        DeviceManager::new(mock, StubMute::new(), Policy::default())
    }

    #[test]
    fn new_builds_catalog() {
        let m = manager(scripted());
        assert!(m.is_available());
        assert_eq!(m.list_device_ids(), vec!["cam01", "mic02", "kb03"]);
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn unavailable_service_leaves_manager_inert() {
        let mock = MockControl::new();
        mock.unavailable.set(true);
        let mut m = manager(mock);
        assert!(!m.is_available());
        assert!(m.list_device_names().is_empty());
        let report = m.disable_devices::<&str>(None);
        assert!(report.disabled.is_empty() && report.failed.is_empty());
        assert!(m.enable_devices().unwrap().enabled.is_empty());
        m.disable_devices_simple().unwrap();
        m.enable_devices_simple().unwrap();
        // Only the initial enumeration reached the service.
        assert_eq!(m.control().calls.borrow().len(), 1);
        assert!(m.mute_service().calls.borrow().is_empty());
    }

    #[test]
    fn single_disable_returns_to_idle() {
        let mut m = manager(scripted());
        assert_eq!(m.disable_device_by_string("webcam").unwrap(), "cam01");
        assert_eq!(m.phase(), Phase::Idle);
        assert!(m.disable_device_by_string("printer").is_err());
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn default_run_disables_policy_matches() {
        let mut m = manager(scripted());
        let report = m.disable_devices::<&str>(None);
        let ids: Vec<&str> = report.disabled.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["cam01", "mic02"]);
        assert!(report.failed.is_empty());
        assert_eq!(m.list_disabled_device_ids(), vec!["cam01", "mic02"]);
        assert_eq!(m.list_active_disabled_ids(), vec!["cam01", "mic02"]);
        assert_eq!(*m.mute_service().calls.borrow(), vec![true]);
    }

    #[test]
    fn explicit_blacklisted_name_is_never_disabled() {
        let mut m = manager(scripted());
        let report = m.disable_devices(Some(&["keyboard"][..]));
        assert!(report.disabled.is_empty());
        assert!(m.control().calls_for(ControlCommand::Disable).is_empty());
    }

    #[test]
    fn failed_disable_is_isolated() {
        let mock = MockControl::with_catalog(DEVICES);
        mock.set_unique("cam01");
        mock.set_unique("mic02");
        mock.set_disable_ok("mic02");
        mock.respond(
            ControlCommand::Disable,
            Selector::id("cam01"),
            &["cam01: Disable failed", "No devices disabled."],
        );
        let mut m = manager(mock);
        let report = m.disable_devices(Some(&["webcam", "microphone"][..]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].device.id, "cam01");
        assert_eq!(m.list_active_disabled_ids(), vec!["mic02"]);
    }

    #[test]
    fn unresolvable_device_is_skipped_on_disable() {
        let mock = MockControl::with_catalog(DEVICES);
        // cam01 never reports a unique match.
        mock.set_unique("mic02");
        mock.set_disable_ok("mic02");
        let mut m = manager(mock);
        let report = m.disable_devices::<&str>(None);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains("No unique device match"));
        assert_eq!(m.list_active_disabled_ids(), vec!["mic02"]);
    }

    #[test]
    fn pending_reboot_counts_as_disabled() {
        let mock = MockControl::with_catalog(DEVICES);
        mock.set_unique("cam01");
        mock.respond(
            ControlCommand::Disable,
            Selector::id("cam01"),
            &["cam01: Disabled on reboot", "1 device(s) are ready to be disabled."],
        );
        let mut m = manager(mock);
        assert_eq!(m.disable_device_by_string("webcam").unwrap(), "cam01");
    }

    #[test]
    fn disable_set_is_rebuilt_each_run() {
        let mut m = manager(scripted());
        m.disable_devices(Some(&["webcam"][..]));
        m.disable_devices(Some(&["microphone"][..]));
        assert_eq!(m.list_disabled_device_ids(), vec!["mic02"]);
        assert_eq!(m.list_active_disabled_ids(), vec!["cam01", "mic02"]);
    }

    #[test]
    fn enable_on_empty_set_is_noop_twice() {
        let mut m = manager(scripted());
        for _ in 0..2 {
            let report = m.enable_devices().unwrap();
            assert!(report.enabled.is_empty() && report.pending.is_empty());
        }
        assert!(m.control().calls_for(ControlCommand::Enable).is_empty());
    }

    #[test]
    fn round_trip_keeps_disable_set() {
        let mut m = manager(scripted());
        m.disable_devices(Some(&["webcam"][..]));
        let report = m.enable_devices().unwrap();
        assert_eq!(report.enabled.len(), 1);
        assert!(m.list_active_disabled_ids().is_empty());
        assert_eq!(m.list_disabled_device_ids(), vec!["cam01"]);
        assert_eq!(*m.mute_service().calls.borrow(), vec![true, false]);
    }

    #[test]
    fn unconfirmed_enable_is_retried() {
        let mock = scripted();
        let mut m = manager(mock);
        m.disable_devices(Some(&["webcam"][..]));

        m.control()
            .respond(ControlCommand::Enable, Selector::id("cam01"), &["No devices enabled."]);
        let report = m.enable_devices().unwrap();
        assert_eq!(report.pending.len(), 1);
        assert_eq!(m.list_active_disabled_ids(), vec!["cam01"]);

        m.control().set_enable_ok("cam01");
        let report = m.enable_devices().unwrap();
        assert_eq!(report.enabled.len(), 1);
        assert!(m.list_active_disabled_ids().is_empty());
    }

    #[test]
    fn unresolvable_enable_is_fatal_but_keeps_confirmed_progress() {
        let mut m = manager(scripted());
        m.disable_devices::<&str>(None);
        // mic02 can no longer be narrowed down to a single device.
        m.control().respond(
            ControlCommand::Find,
            Selector::id("mic02"),
            &["2 matching device(s) found."],
        );
        let err = m.enable_devices().unwrap_err();
        assert!(matches!(err, DevmuteError::EnableFailed { ref id, .. } if id == "mic02"));
        // cam01 was re-enabled before the failure.
        assert_eq!(m.list_active_disabled_ids(), vec!["mic02"]);
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn mute_failure_never_blocks_devices() {
        let mut m = DeviceManager::new(scripted(), StubMute::failing(), Policy::default());
        let report = m.disable_devices(Some(&["webcam"][..]));
        assert_eq!(report.disabled.len(), 1);
        assert!(m.enable_devices().is_ok());
    }

    #[test]
    fn mute_can_be_turned_off() {
        let mut m = manager(scripted());
        m.set_mute_microphone(false);
        m.disable_devices(Some(&["webcam"][..]));
        assert!(m.mute_service().calls.borrow().is_empty());
    }

    #[test]
    fn simple_paths_toggle_fixed_classes_only() {
        let mut m = manager(scripted());
        m.disable_devices_simple().unwrap();
        m.enable_devices_simple().unwrap();
        let classes = vec![Selector::class("Image"), Selector::class("MEDIA")];
        assert_eq!(m.control().calls_for(ControlCommand::Disable), classes);
        assert_eq!(m.control().calls_for(ControlCommand::Enable), classes);
        assert!(m.list_active_disabled_ids().is_empty());
    }

    #[test]
    fn simple_path_reports_service_errors() {
        let mock = scripted();
        mock.fail_command.set(Some(ControlCommand::Disable));
        let mut m = manager(mock);
        assert!(m.disable_devices_simple().is_err());
        assert_eq!(m.phase(), Phase::Idle);
    }

    #[test]
    fn policy_flags_change_default_selection() {
        let mut m = manager(scripted());
        m.policy_mut().disable_webcams = false;
        let report = m.disable_devices::<&str>(None);
        let ids: Vec<&str> = report.disabled.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["mic02"]);
    }
}
