//! Device catalog and matcher.
//!
//! The catalog is built once from a `find *` enumeration and is read-only
//! afterwards. Matching is a linear, case-insensitive substring scan in
//! enumeration order: the first device whose name (then id) contains the
//! query wins, so results are deterministic for a given catalog.

use crate::control::{ControlCommand, Device, DeviceControl, Selector, parse_device_line};

/// Insertion-ordered `id → name` map with unique ids.
///
/// Backs the catalog and both tracker sets. Device counts are small
/// (hundreds), so lookups are linear scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMap {
    entries: Vec<Device>,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `device` unless its id is already present.
    ///
    /// Returns `false` (leaving the map untouched) for a duplicate id.
    pub fn insert(&mut self, device: Device) -> bool {
        if self.contains(&device.id) {
            return false;
        }
        self.entries.push(device);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.entries.iter().find(|d| d.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Device> {
        let pos = self.entries.iter().position(|d| d.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.id.clone()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a DeviceMap {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Case-insensitive substring test.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// All devices discovered at startup, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    devices: DeviceMap,
}

impl Catalog {
    /// Enumerate every device through `control`.
    ///
    /// Fails with `EnumerationUnavailable` when the service binary cannot be
    /// started.
    pub fn build(control: &impl DeviceControl) -> crate::error::Result<Self> {
        let lines = control.query(ControlCommand::Find, &Selector::All)?;
        let catalog = Self::from_lines(&lines);
        log::debug!(
            "catalog built: {} devices from {} lines",
            catalog.len(),
            lines.len()
        );
        Ok(catalog)
    }

    /// Parse `id : name` lines; other lines and later duplicate ids are dropped.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut devices = DeviceMap::new();
        for line in lines {
            if let Some(device) = parse_device_line(line.as_ref())
                && !devices.insert(device)
            {
                log::debug!("duplicate catalog entry ignored: {}", line.as_ref().trim());
            }
        }
        Catalog { devices }
    }

    pub fn devices(&self) -> &DeviceMap {
        &self.devices
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device names, in enumeration order.
    pub fn list_names(&self) -> Vec<String> {
        self.devices.names()
    }

    /// Device ids, in enumeration order.
    pub fn list_ids(&self) -> Vec<String> {
        self.devices.ids()
    }

    /// First device whose name, then id, contains `query` (case-insensitive).
    ///
    /// A blank query matches nothing.
    pub fn find_by_query(&self, query: &str) -> Option<&Device> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.devices
            .iter()
            .find(|d| contains_ignore_case(&d.name, query) || contains_ignore_case(&d.id, query))
    }

    /// Every device matching `query`, in enumeration order.
    pub fn filter(&self, query: &str) -> Vec<&Device> {
        let query = query.trim();
        self.devices
            .iter()
            .filter(|d| contains_ignore_case(&d.name, query) || contains_ignore_case(&d.id, query))
            .collect()
    }

    pub fn find_id_by_query(&self, query: &str) -> Option<&str> {
        self.find_by_query(query).map(|d| d.id.as_str())
    }

    pub fn find_name_by_query(&self, query: &str) -> Option<&str> {
        self.find_by_query(query).map(|d| d.name.as_str())
    }
}
