//! Hidden device filtering.
//!
//! Devices are hidden by display name, not by handle, so the choice survives
//! handle churn across sessions. Devices that share a name are hidden and
//! shown together; the OS gives no user-facing identity that would tell them
//! apart.

use super::device::AudioDevice;
use crate::platform::{HiddenSetStore, PreferencesError};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Devices whose name is not in `hidden`, in their original order.
pub fn visible(devices: &[AudioDevice], hidden: &BTreeSet<String>) -> Vec<AudioDevice> {
    devices
        .iter()
        .filter(|d| !hidden.contains(&d.name))
        .cloned()
        .collect()
}

/// Sorted, de-duplicated union of output and input device names.
///
/// A device present in both lists appears once.
pub fn all_known_names(outputs: &[AudioDevice], inputs: &[AudioDevice]) -> Vec<String> {
    outputs
        .iter()
        .chain(inputs)
        .map(|d| d.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The user's hidden device names, kept in step with a durable store.
pub struct HiddenSet {
    names: BTreeSet<String>,
    store: Box<dyn HiddenSetStore>,
}

impl HiddenSet {
    /// Load the hidden names from `store`. An unreadable store starts empty.
    pub fn load(store: Box<dyn HiddenSetStore>) -> Self {
        let names = match store.load_hidden_names() {
            Ok(names) => names.into_iter().collect(),
            Err(e) => {
                warn!("Failed to load hidden devices, starting with none: {}", e);
                BTreeSet::new()
            }
        };

        Self { names, store }
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Hide `name` if it is shown, show it if it is hidden.
    ///
    /// The new set is saved before it replaces the current one, so on a
    /// failed save nothing changes. Returns whether `name` is now hidden.
    pub fn toggle(&mut self, name: &str) -> Result<bool, PreferencesError> {
        let mut next = self.names.clone();
        let now_hidden = if next.remove(name) {
            false
        } else {
            next.insert(name.to_string());
            true
        };

        let list: Vec<String> = next.iter().cloned().collect();
        self.store.save_hidden_names(&list)?;
        self.names = next;

        info!(
            "{} device \"{}\"",
            if now_hidden { "Hid" } else { "Unhid" },
            name
        );
        Ok(now_hidden)
    }

    /// Filter a device list against the current set.
    pub fn visible(&self, devices: &[AudioDevice]) -> Vec<AudioDevice> {
        visible(devices, &self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::DeviceId;
    use crate::platform::MemoryStore;

    fn device(id: u32, name: &str, input: bool, output: bool) -> AudioDevice {
        AudioDevice {
            id: DeviceId(id),
            name: name.to_string(),
            supports_input: input,
            supports_output: output,
            is_default: false,
        }
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_visible_removes_hidden_names() {
        let devices = vec![
            device(1, "Built-in", true, true),
            device(2, "USB DAC", false, true),
        ];

        let shown = visible(&devices, &names(&["USB DAC"]));
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, DeviceId(1));
    }

    #[test]
    fn test_visible_is_idempotent() {
        let devices = vec![
            device(1, "Built-in", true, true),
            device(2, "USB DAC", false, true),
            device(3, "HDMI", false, true),
        ];
        let hidden = names(&["HDMI"]);

        let once = visible(&devices, &hidden);
        let twice = visible(&once, &hidden);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_visible_hides_every_device_with_name() {
        let devices = vec![device(1, "Headset", true, true), device(2, "Headset", true, true)];
        assert!(visible(&devices, &names(&["Headset"])).is_empty());
    }

    #[test]
    fn test_all_known_names_sorted_union() {
        let outputs = vec![
            device(2, "USB DAC", false, true),
            device(1, "Built-in", true, true),
        ];
        let inputs = vec![device(1, "Built-in", true, true), device(3, "Aux Mic", true, false)];

        assert_eq!(
            all_known_names(&outputs, &inputs),
            vec!["Aux Mic", "Built-in", "USB DAC"]
        );
    }

    #[test]
    fn test_toggle_round_trip_restores_visible_set() {
        let devices = vec![
            device(1, "Built-in", true, true),
            device(2, "USB DAC", false, true),
        ];
        let mut hidden = HiddenSet::load(Box::new(MemoryStore::new()));
        let before = hidden.visible(&devices);

        assert!(hidden.toggle("USB DAC").unwrap());
        assert_eq!(hidden.visible(&devices).len(), 1);

        assert!(!hidden.toggle("USB DAC").unwrap());
        assert_eq!(hidden.visible(&devices), before);
    }

    #[test]
    fn test_toggle_persists_immediately() {
        let store = MemoryStore::new();
        let mut hidden = HiddenSet::load(Box::new(store.clone()));

        hidden.toggle("HDMI").unwrap();
        assert_eq!(store.saved(), vec!["HDMI".to_string()]);

        let reloaded = HiddenSet::load(Box::new(store.clone()));
        assert!(reloaded.contains("HDMI"));
    }

    #[test]
    fn test_failed_save_keeps_previous_set() {
        let store = MemoryStore::new();
        let mut hidden = HiddenSet::load(Box::new(store.clone()));
        store.fail_saves(true);

        assert!(hidden.toggle("HDMI").is_err());
        assert!(!hidden.contains("HDMI"));
    }
}
