//! Disable policy — default classes, default name patterns, safety blacklist.

use serde::Serialize;

use crate::catalog::contains_ignore_case;
use crate::control::Device;

/// Setup classes enumerated for the default disable set.
pub const DEFAULT_CLASSES: [&str; 4] = ["MEDIA", "Image", "PCMCIA", "WCEVSBS"];

/// Name patterns matched against the catalog for the default disable set.
pub const DEFAULT_NAME_PATTERNS: [&str; 6] = [
    "Webcam",
    "Camera",
    "VideoCamera",
    "Microphone",
    "Android",
    "Iphone",
];

/// Devices whose id or name contains any of these (any case) are never disabled.
pub const BLACKLIST: [&str; 3] = ["keyboard", "mouse", "display"];

/// Classes toggled by the untracked simple shortcuts.
pub const SIMPLE_CLASSES: [&str; 2] = ["Image", "MEDIA"];

const WEBCAM_CLASS: &str = "Image";
const MICROPHONE_CLASS: &str = "MEDIA";
const NETWORK_CLASS: &str = "Net";
const BLUETOOTH_CLASS: &str = "Bluetooth";

const WEBCAM_PATTERNS: [&str; 3] = ["Webcam", "Camera", "VideoCamera"];
const MICROPHONE_PATTERNS: [&str; 1] = ["Microphone"];

/// Which device families the default disable set covers.
///
/// With the default flags the candidate lists are exactly
/// [`DEFAULT_CLASSES`] and [`DEFAULT_NAME_PATTERNS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub disable_webcams: bool,
    pub disable_microphones: bool,
    pub disable_network_devices: bool,
    pub disable_bluetooth_devices: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            disable_webcams: true,
            disable_microphones: true,
            disable_network_devices: false,
            disable_bluetooth_devices: false,
        }
    }
}

impl Policy {
    /// Classes to enumerate, in order.
    pub fn candidate_classes(&self) -> Vec<&'static str> {
        let mut classes: Vec<&'static str> = DEFAULT_CLASSES
            .into_iter()
            .filter(|class| match *class {
                WEBCAM_CLASS => self.disable_webcams,
                MICROPHONE_CLASS => self.disable_microphones,
                _ => true,
            })
            .collect();
        if self.disable_network_devices {
            classes.push(NETWORK_CLASS);
        }
        if self.disable_bluetooth_devices {
            classes.push(BLUETOOTH_CLASS);
        }
        classes
    }

    /// Name patterns to match against the catalog, in order.
    pub fn candidate_patterns(&self) -> Vec<&'static str> {
        DEFAULT_NAME_PATTERNS
            .into_iter()
            .filter(|pattern| {
                if WEBCAM_PATTERNS.contains(pattern) {
                    self.disable_webcams
                } else if MICROPHONE_PATTERNS.contains(pattern) {
                    self.disable_microphones
                } else {
                    true
                }
            })
            .collect()
    }
}

/// Whether `device` must never be disabled.
pub fn is_blacklisted(device: &Device) -> bool {
    BLACKLIST
        .iter()
        .any(|term| contains_ignore_case(&device.id, term) || contains_ignore_case(&device.name, term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_uses_fixed_lists() {
        let p = Policy::default();
        assert_eq!(p.candidate_classes(), DEFAULT_CLASSES.to_vec());
        assert_eq!(p.candidate_patterns(), DEFAULT_NAME_PATTERNS.to_vec());
    }

    #[test]
    fn webcams_off_drops_image_and_camera_patterns() {
        let p = Policy {
            disable_webcams: false,
            ..Policy::default()
        };
        assert_eq!(p.candidate_classes(), vec!["MEDIA", "PCMCIA", "WCEVSBS"]);
        assert_eq!(p.candidate_patterns(), vec!["Microphone", "Android", "Iphone"]);
    }

    #[test]
    fn microphones_off_drops_media_and_microphone() {
        let p = Policy {
            disable_microphones: false,
            ..Policy::default()
        };
        assert_eq!(p.candidate_classes(), vec!["Image", "PCMCIA", "WCEVSBS"]);
        assert!(!p.candidate_patterns().contains(&"Microphone"));
    }

    #[test]
    fn network_and_bluetooth_append_classes() {
        let p = Policy {
            disable_network_devices: true,
            disable_bluetooth_devices: true,
            ..Policy::default()
        };
        let classes = p.candidate_classes();
        assert_eq!(&classes[4..], &["Net", "Bluetooth"]);
    }

    #[test]
    fn blacklist_matches_id_or_name_any_case() {
        assert!(is_blacklisted(&Device::new("kb03", "USB KEYBOARD")));
        assert!(is_blacklisted(&Device::new("HID\\Mouse_01", "Pointer")));
        assert!(is_blacklisted(&Device::new("mon1", "Generic PnP Display")));
        assert!(!is_blacklisted(&Device::new("cam01", "USB Webcam")));
    }
}
