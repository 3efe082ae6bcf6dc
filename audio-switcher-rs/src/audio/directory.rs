//! Device directory.
//!
//! Answers "which devices exist for a direction and which one is default"
//! with a fresh snapshot on every call, and forwards default-device changes
//! to the OS. Nothing is cached: the OS is the only source of truth.

use super::device::{AudioDevice, AudioError, DeviceId, Direction};
use super::notifications::{ChangeBridge, StartOutcome};
use super::system::AudioSystem;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query and control surface over an [`AudioSystem`].
pub struct DeviceDirectory {
    system: Arc<dyn AudioSystem>,
    bridge: ChangeBridge,
}

impl DeviceDirectory {
    pub fn new(system: Arc<dyn AudioSystem>) -> Self {
        Self {
            system,
            bridge: ChangeBridge::new(),
        }
    }

    /// List the devices usable in `direction`, in OS enumeration order.
    ///
    /// Devices that cannot be read are dropped. A failed enumeration yields
    /// an empty list.
    pub fn list_devices(&self, direction: Direction) -> Vec<AudioDevice> {
        let ids = match self.system.device_ids() {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to enumerate audio devices: {}", e);
                return Vec::new();
            }
        };

        let default_id = match self.system.default_device(direction) {
            Ok(id) => id,
            Err(e) => {
                debug!("No default {} device: {}", direction, e);
                None
            }
        };

        let mut seen = HashSet::with_capacity(ids.len());
        let mut devices = Vec::with_capacity(ids.len());

        for id in ids {
            // First occurrence of a duplicated handle wins.
            if !seen.insert(id) {
                continue;
            }

            if let Some(device) = self.read_device(id, default_id) {
                if device.supports(direction) {
                    devices.push(device);
                }
            }
        }

        devices
    }

    /// Current default device for a direction, if it is still listed.
    pub fn default_device(&self, direction: Direction) -> Option<AudioDevice> {
        self.list_devices(direction)
            .into_iter()
            .find(|d| d.is_default)
    }

    /// Ask the OS to switch the default device for a direction.
    ///
    /// One attempt, no retry. Success only means the request was accepted;
    /// the switch shows up in a later [`list_devices`](Self::list_devices).
    pub fn set_default(&self, direction: Direction, id: DeviceId) -> Result<(), AudioError> {
        match self.system.set_default_device(direction, id) {
            Ok(()) => {
                info!("Requested default {} device {}", direction, id);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to set default {} device {}: {}", direction, id, e);
                Err(e)
            }
        }
    }

    /// Register `on_change` to run whenever the device list or a default
    /// device changes. Only the first call registers anything.
    pub fn subscribe_to_changes<F>(&self, on_change: F) -> StartOutcome
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.bridge.start(self.system.as_ref(), on_change)
    }

    /// Whether change notifications have been registered.
    pub fn is_subscribed(&self) -> bool {
        self.bridge.is_registered()
    }

    fn read_device(&self, id: DeviceId, default_id: Option<DeviceId>) -> Option<AudioDevice> {
        let name = match self.system.device_name(id) {
            Ok(name) => name,
            Err(e) => {
                debug!("Dropping device {}: {}", id, e);
                return None;
            }
        };

        let supports_input = self.stream_presence(id, Direction::Input);
        let supports_output = self.stream_presence(id, Direction::Output);
        if !supports_input && !supports_output {
            return None;
        }

        Some(AudioDevice {
            id,
            name,
            supports_input,
            supports_output,
            is_default: default_id == Some(id),
        })
    }

    fn stream_presence(&self, id: DeviceId, direction: Direction) -> bool {
        self.system.has_streams(id, direction).unwrap_or_else(|e| {
            debug!("No {} streams readable on device {}: {}", direction, id, e);
            false
        })
    }
}
