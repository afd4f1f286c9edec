//! Device enumeration & control service — trait + devcon backend.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::Serialize;

// ── Error type ──

/// Control service errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the binary or step and *details* the underlying error.
#[derive(Debug)]
pub enum ControlError {
    /// The control binary could not be located or started.
    Unavailable(String),
    /// The invocation did not finish before the deadline; the child was killed.
    Timeout { selector: String, after: Duration },
    /// Spawning succeeded but waiting on or reading from the child failed.
    Io(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Unavailable(e) => write!(f, "Control service unavailable: {e}"),
            ControlError::Timeout { selector, after } => {
                write!(f, "Control service timed out after {after:?} ({selector})")
            }
            ControlError::Io(e) => write!(f, "Control service I/O failed: {e}"),
        }
    }
}

impl std::error::Error for ControlError {}

pub type Result<T> = std::result::Result<T, ControlError>;

// ── Commands & selectors ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Find,
    Disable,
    Enable,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlCommand::Find => "find",
            ControlCommand::Disable => "disable",
            ControlCommand::Enable => "enable",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which devices a command applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Every device known to the service.
    All,
    /// All devices of a setup class (e.g. `Image`, `MEDIA`).
    Class(String),
    /// A full or partial instance identifier.
    Id(String),
}

impl Selector {
    pub fn class(class: impl Into<String>) -> Self {
        Selector::Class(class.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("*"),
            Selector::Class(class) => write!(f, "class {class}"),
            Selector::Id(id) => f.write_str(id),
        }
    }
}

// ── Device & output parsing ──

/// A device as reported by the enumeration service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Hardware instance identifier, opaque to devmute.
    pub id: String,
    /// Human-readable label.
    pub name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Reported by `find` when a selector matches exactly one device.
pub const UNIQUE_MATCH_MARKER: &str = "1 matching device(s) found";
/// Reported by `disable` when the device was disabled immediately.
pub const DISABLED_MARKER: &str = "1 device(s) disabled";
/// Reported by `disable` when the device is disabled on next reboot.
pub const PENDING_DISABLE_MARKER: &str = "1 device(s) are ready to be disabled";
/// Suffix of the `<id>: Enabled` line reported by `enable`.
pub const ENABLED_SUFFIX: &str = ": Enabled";

/// Parse one `id : name` line of `find` output.
///
/// Lines without a `:` separator (banners, match counts) and lines with an
/// empty identifier are not devices and yield `None`.
pub fn parse_device_line(line: &str) -> Option<Device> {
    let (id, name) = line.split_once(':')?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    Some(Device::new(id, name.trim()))
}

/// Whether a `find` response reports exactly one matching device.
pub fn reports_unique_match(lines: &[String]) -> bool {
    lines.iter().any(|l| starts_with_count(l, UNIQUE_MATCH_MARKER))
}

/// Whether a `disable` response reports success (immediate or pending reboot).
pub fn reports_disabled(lines: &[String]) -> bool {
    lines.iter().any(|l| {
        starts_with_count(l, DISABLED_MARKER) || starts_with_count(l, PENDING_DISABLE_MARKER)
    })
}

/// Count markers must start the line so "11 matching ..." is not read as "1 matching ...".
fn starts_with_count(line: &str, marker: &str) -> bool {
    line.trim_start().starts_with(marker)
}

/// Whether an `enable` response confirms the device with identifier `id`.
pub fn reports_enabled(lines: &[String], id: &str) -> bool {
    let marker = format!("{id}{ENABLED_SUFFIX}");
    lines.iter().any(|l| l.contains(&marker))
}

// ── Trait ──

/// Line-oriented device enumeration and control.
pub trait DeviceControl {
    /// Run one command and return the service's output, one entry per line.
    ///
    /// A response without the expected marker is not an error here; callers
    /// inspect the lines to decide success.
    fn query(&self, command: ControlCommand, selector: &Selector) -> Result<Vec<String>>;
}

// ── devcon backend ──

/// Default per-invocation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval when waiting for the control process to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs a devcon-compatible binary, one process per query.
#[derive(Debug, Clone)]
pub struct DevconControl {
    path: PathBuf,
    timeout: Duration,
}

impl DevconControl {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DevconControl {
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// devcon selector syntax: `*` for all, `=Class` for a setup class.
    fn selector_arg(selector: &Selector) -> String {
        match selector {
            Selector::All => "*".into(),
            Selector::Class(class) => format!("={class}"),
            Selector::Id(id) => id.clone(),
        }
    }
}

impl DeviceControl for DevconControl {
    fn query(&self, command: ControlCommand, selector: &Selector) -> Result<Vec<String>> {
        let arg = Self::selector_arg(selector);
        log::debug!("{} {} {arg}", self.path.display(), command);
        run_with_timeout(&self.path, &[command.as_str(), &arg], self.timeout, selector)
    }
}

/// Run a process, collect its stdout lines, and kill it if it exceeds `timeout`.
///
/// The exit status is only logged: devcon reports outcomes in its text
/// output and exits non-zero for benign cases such as "reboot required".
fn run_with_timeout(
    program: &Path,
    args: &[&str],
    timeout: Duration,
    selector: &Selector,
) -> Result<Vec<String>> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            ControlError::Unavailable(format!("{}: {e}", program.display()))
        }
        _ => ControlError::Io(format!("spawn {}: {e}", program.display())),
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ControlError::Io("stdout: not captured".into()))?;
    let deadline = Instant::now() + timeout;
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read_lines(stdout));
    });

    let max_polls = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1) as u64;
    let mut status = None;
    for _ in 0..max_polls {
        match child.try_wait() {
            Ok(Some(s)) => {
                status = Some(s);
                break;
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ControlError::Io(format!("wait: {e}")));
            }
        }
    }

    let Some(status) = status else {
        log::warn!(
            "{} timed out after {timeout:?}, killing ({selector})",
            program.display()
        );
        let _ = child.kill();
        let _ = child.wait(); // reap zombie
        // The reader thread is left to finish on its own once the pipe closes.
        return Err(ControlError::Timeout {
            selector: selector.to_string(),
            after: timeout,
        });
    };

    // A background process started by the child can hold the pipe open.
    let lines = match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(lines) => lines,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!(
                "{} exited but its output stayed open past {timeout:?} ({selector})",
                program.display()
            );
            return Err(ControlError::Timeout {
                selector: selector.to_string(),
                after: timeout,
            });
        }
        Err(RecvTimeoutError::Disconnected) => {
            return Err(ControlError::Io("stdout: reader thread panicked".into()));
        }
    };
    log::debug!("{} exited with {status} ({} lines)", program.display(), lines.len());
    for line in &lines {
        log::debug!("  | {line}");
    }
    Ok(lines)
}

/// Read all lines, tolerating non-UTF-8 output (console code pages).
fn read_lines(source: impl Read) -> Vec<String> {
    let mut reader = BufReader::new(source);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }
    }
    lines
}

// ── Mock control service for testing ──

/// Scriptable in-memory control service for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    type Handler = Box<dyn Fn(ControlCommand, &Selector) -> Option<Vec<String>>>;

    /// Responses are keyed by `(command, selector)`; unscripted queries return
    /// no lines, which every caller treats as "no success marker".
    #[derive(Default)]
    pub struct MockControl {
        responses: RefCell<HashMap<(ControlCommand, Selector), Vec<String>>>,
        /// Consulted before the scripted responses when set.
        handler: Option<Handler>,
        /// Recorded calls, in order.
        pub calls: RefCell<Vec<(ControlCommand, Selector)>>,
        /// If true, every query fails with `Unavailable`.
        pub unavailable: Cell<bool>,
        /// If set, queries with this command fail with `Io`.
        pub fail_command: Cell<Option<ControlCommand>>,
    }

    impl MockControl {
        pub fn new() -> Self {
            Self::default()
        }

        /// Mock whose `find *` lists `devices` in order.
        pub fn with_catalog(devices: &[(&str, &str)]) -> Self {
            let mock = Self::new();
            mock.set_catalog(devices);
            mock
        }

        /// Mock answering every query through `handler` (falling back to scripts).
        pub fn with_handler(
            handler: impl Fn(ControlCommand, &Selector) -> Option<Vec<String>> + 'static,
        ) -> Self {
            MockControl {
                handler: Some(Box::new(handler)),
                ..Self::default()
            }
        }

        pub fn respond(&self, command: ControlCommand, selector: Selector, lines: &[&str]) {
            self.responses.borrow_mut().insert(
                (command, selector),
                lines.iter().map(|l| l.to_string()).collect(),
            );
        }

        pub fn set_catalog(&self, devices: &[(&str, &str)]) {
            let mut lines: Vec<String> = devices
                .iter()
                .map(|(id, name)| format!("{id:<40}: {name}"))
                .collect();
            lines.push(format!("{} matching device(s) found.", devices.len()));
            self.responses
                .borrow_mut()
                .insert((ControlCommand::Find, Selector::All), lines);
        }

        /// `find =class` lists `devices`.
        pub fn set_class(&self, class: &str, devices: &[(&str, &str)]) {
            let mut lines: Vec<String> = devices
                .iter()
                .map(|(id, name)| format!("{id}: {name}"))
                .collect();
            lines.push(format!("{} matching device(s) found.", devices.len()));
            self.responses
                .borrow_mut()
                .insert((ControlCommand::Find, Selector::class(class)), lines);
        }

        /// `find <id>` reports exactly one match.
        pub fn set_unique(&self, id: &str) {
            let lines = [format!("{id}: device"), format!("{UNIQUE_MATCH_MARKER}.")];
            self.responses
                .borrow_mut()
                .insert((ControlCommand::Find, Selector::id(id)), lines.to_vec());
        }

        /// `disable <id>` succeeds.
        pub fn set_disable_ok(&self, id: &str) {
            let lines = [format!("{id}: Disabled"), format!("{DISABLED_MARKER}.")];
            self.responses
                .borrow_mut()
                .insert((ControlCommand::Disable, Selector::id(id)), lines.to_vec());
        }

        /// `enable <id>` succeeds.
        pub fn set_enable_ok(&self, id: &str) {
            let lines = [format!("{id}{ENABLED_SUFFIX}"), "1 device(s) are enabled.".into()];
            self.responses
                .borrow_mut()
                .insert((ControlCommand::Enable, Selector::id(id)), lines.to_vec());
        }

        /// Selectors passed with `command`, in call order.
        pub fn calls_for(&self, command: ControlCommand) -> Vec<Selector> {
            self.calls
                .borrow()
                .iter()
                .filter(|(c, _)| *c == command)
                .map(|(_, s)| s.clone())
                .collect()
        }
    }

    impl DeviceControl for MockControl {
        fn query(&self, command: ControlCommand, selector: &Selector) -> Result<Vec<String>> {
            self.calls.borrow_mut().push((command, selector.clone()));
            if self.unavailable.get() {
                return Err(ControlError::Unavailable("mock: devcon not found".into()));
            }
            if self.fail_command.get() == Some(command) {
                return Err(ControlError::Io("mock: failure injected".into()));
            }
            if let Some(handler) = &self.handler
                && let Some(lines) = handler(command, selector)
            {
                return Ok(lines);
            }
            Ok(self
                .responses
                .borrow()
                .get(&(command, selector.clone()))
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn parse_device_line_trims_both_sides() {
        let dev = parse_device_line("  ID123  :  Some Device  ").unwrap();
        assert_eq!(dev, Device::new("ID123", "Some Device"));
    }

    #[test]
    fn parse_device_line_without_separator_is_none() {
        assert!(parse_device_line("12 matching device(s) found.").is_none());
        assert!(parse_device_line("").is_none());
    }

    #[test]
    fn parse_device_line_empty_id_is_none() {
        assert!(parse_device_line("   : orphan name").is_none());
    }

    #[test]
    fn parse_device_line_keeps_colons_in_name() {
        let dev = parse_device_line("USB\\VID_046D&PID_0825\\1: Logitech: C270").unwrap();
        assert_eq!(dev.id, "USB\\VID_046D&PID_0825\\1");
        assert_eq!(dev.name, "Logitech: C270");
    }

    #[test]
    fn unique_marker_detected() {
        assert!(reports_unique_match(&lines(&[
            "USB\\VID_1\\A : Cam",
            "1 matching device(s) found."
        ])));
        assert!(!reports_unique_match(&lines(&["2 matching device(s) found."])));
        assert!(!reports_unique_match(&lines(&["11 matching device(s) found."])));
        assert!(!reports_unique_match(&lines(&["No matching devices found."])));
    }

    #[test]
    fn disabled_markers_detected() {
        assert!(reports_disabled(&lines(&["1 device(s) disabled."])));
        assert!(reports_disabled(&lines(&[
            "1 device(s) are ready to be disabled. To disable the devices, restart the devices or reboot the system ."
        ])));
        assert!(!reports_disabled(&lines(&["Disable failed", "No devices disabled."])));
    }

    #[test]
    fn enabled_marker_requires_matching_id() {
        let out = lines(&["cam01: Enabled", "1 device(s) are enabled."]);
        assert!(reports_enabled(&out, "cam01"));
        assert!(!reports_enabled(&out, "mic02"));
    }

    #[test]
    fn devcon_selector_syntax() {
        assert_eq!(DevconControl::selector_arg(&Selector::All), "*");
        assert_eq!(DevconControl::selector_arg(&Selector::class("Image")), "=Image");
        assert_eq!(DevconControl::selector_arg(&Selector::id("USB\\VID_1")), "USB\\VID_1");
    }

    #[test]
    fn selector_display() {
        assert_eq!(Selector::All.to_string(), "*");
        assert_eq!(Selector::class("MEDIA").to_string(), "class MEDIA");
        assert_eq!(Selector::id("cam01").to_string(), "cam01");
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let control = DevconControl::new("/nonexistent/devmute/devcon.exe");
        let err = control.query(ControlCommand::Find, &Selector::All).unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)), "got {err}");
    }

    #[test]
    fn read_lines_strips_crlf_and_tolerates_bad_utf8() {
        let raw: &[u8] = b"cam01 : Webcam\r\nmic\xff02 : Mic\r\n";
        let out = read_lines(raw);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "cam01 : Webcam");
        assert!(out[1].ends_with(": Mic"));
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;

        fn fake_devcon(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("devcon");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn captures_output_and_passes_arguments() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_devcon(dir.path(), r#"echo "args: $1 $2""#);
            let control = DevconControl::new(path);
            let out = control
                .query(ControlCommand::Find, &Selector::class("Image"))
                .unwrap();
            assert_eq!(out, vec!["args: find =Image".to_string()]);
        }

        #[test]
        fn nonzero_exit_still_returns_output() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_devcon(
                dir.path(),
                "echo '1 device(s) are ready to be disabled.'\nexit 1",
            );
            let control = DevconControl::new(path);
            let out = control
                .query(ControlCommand::Disable, &Selector::id("cam01"))
                .unwrap();
            assert!(reports_disabled(&out));
        }

        #[test]
        fn hanging_binary_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_devcon(dir.path(), "exec sleep 30");
            let control = DevconControl::new(path).with_timeout(Duration::from_millis(300));
            let err = control
                .query(ControlCommand::Find, &Selector::All)
                .unwrap_err();
            assert!(matches!(err, ControlError::Timeout { .. }), "got {err}");
        }

        #[test]
        fn background_child_holding_stdout_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_devcon(dir.path(), "sleep 5 &\necho '1 device(s) disabled.'\nexit 0");
            let control = DevconControl::new(path).with_timeout(Duration::from_millis(300));
            let start = Instant::now();
            let err = control
                .query(ControlCommand::Disable, &Selector::id("cam01"))
                .unwrap_err();
            assert!(matches!(err, ControlError::Timeout { .. }), "got {err}");
            assert!(start.elapsed() < Duration::from_secs(2));
        }
    }

    mod mock_control {
        use super::super::mock::MockControl;
        use super::super::*;

        #[test]
        fn unscripted_query_returns_no_lines() {
            let mock = MockControl::new();
            let out = mock.query(ControlCommand::Enable, &Selector::id("x")).unwrap();
            assert!(out.is_empty());
        }

        #[test]
        fn records_calls_in_order() {
            let mock = MockControl::new();
            mock.query(ControlCommand::Find, &Selector::All).unwrap();
            mock.query(ControlCommand::Disable, &Selector::id("a")).unwrap();
            assert_eq!(mock.calls.borrow().len(), 2);
            assert_eq!(mock.calls_for(ControlCommand::Disable), vec![Selector::id("a")]);
        }

        #[test]
        fn catalog_lines_parse_back() {
            let mock = MockControl::with_catalog(&[("cam01", "USB Webcam")]);
            let out = mock.query(ControlCommand::Find, &Selector::All).unwrap();
            let devices: Vec<Device> = out.iter().filter_map(|l| parse_device_line(l)).collect();
            assert_eq!(devices, vec![Device::new("cam01", "USB Webcam")]);
        }

        #[test]
        fn injected_failures() {
            let mock = MockControl::new();
            mock.fail_command.set(Some(ControlCommand::Disable));
            assert!(mock.query(ControlCommand::Disable, &Selector::id("a")).is_err());
            assert!(mock.query(ControlCommand::Find, &Selector::All).is_ok());
            mock.unavailable.set(true);
            assert!(matches!(
                mock.query(ControlCommand::Find, &Selector::All),
                Err(ControlError::Unavailable(_))
            ));
        }
    }
}
