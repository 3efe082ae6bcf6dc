//! In-memory audio system.
//!
//! Behaves like the OS hardware layer closely enough to drive the directory
//! without real devices: it enumerates, tracks defaults, fires listeners for
//! every change (including changes requested through
//! [`AudioSystem::set_default_device`]) and can be told to fail.

use super::device::{AudioError, ChangeSelector, DeviceId, Direction};
use super::system::{AudioSystem, ChangeListener};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// A device registered with the in-memory system.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub id: DeviceId,

    /// `None` simulates a device whose name can no longer be read
    /// (for example mid-teardown during unplug).
    pub name: Option<String>,

    pub has_input: bool,
    pub has_output: bool,
}

impl SimulatedDevice {
    pub fn new(id: u32, name: &str, has_input: bool, has_output: bool) -> Self {
        Self {
            id: DeviceId(id),
            name: Some(name.to_string()),
            has_input,
            has_output,
        }
    }

    /// A device whose name query fails.
    pub fn unnamed(id: u32, has_input: bool, has_output: bool) -> Self {
        Self {
            id: DeviceId(id),
            name: None,
            has_input,
            has_output,
        }
    }
}

#[derive(Default)]
struct State {
    devices: Vec<SimulatedDevice>,
    default_input: Option<DeviceId>,
    default_output: Option<DeviceId>,
    listeners: Vec<(ChangeSelector, ChangeListener)>,
    refused_selectors: HashSet<ChangeSelector>,
    reject_default_writes: bool,
    fail_enumeration: bool,
    failed_stream_queries: HashSet<DeviceId>,
}

/// Audio system backed by plain data.
#[derive(Default)]
pub struct InMemoryAudioSystem {
    state: Mutex<State>,
}

impl InMemoryAudioSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Poisoned only if a listener panicked; the state itself is intact.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plug in a device. Fires a device-list change.
    pub fn plug(&self, device: SimulatedDevice) {
        self.lock().devices.push(device);
        self.emit(ChangeSelector::DeviceList);
    }

    /// Unplug a device. Any default pointing at it is cleared, which fires
    /// the matching default-changed events after the device-list change.
    pub fn unplug(&self, id: DeviceId) {
        let (cleared_input, cleared_output) = {
            let mut state = self.lock();
            state.devices.retain(|d| d.id != id);
            let cleared_input = state.default_input == Some(id);
            let cleared_output = state.default_output == Some(id);
            if cleared_input {
                state.default_input = None;
            }
            if cleared_output {
                state.default_output = None;
            }
            (cleared_input, cleared_output)
        };

        self.emit(ChangeSelector::DeviceList);
        if cleared_output {
            self.emit(ChangeSelector::DefaultOutput);
        }
        if cleared_input {
            self.emit(ChangeSelector::DefaultInput);
        }
    }

    /// Change the default from outside the program (system settings,
    /// another app). Fires the default-changed event for the direction.
    pub fn set_system_default(&self, direction: Direction, id: Option<DeviceId>) {
        {
            let mut state = self.lock();
            match direction {
                Direction::Input => state.default_input = id,
                Direction::Output => state.default_output = id,
            }
        }
        self.emit(ChangeSelector::default_for(direction));
    }

    /// Make `add_listener` fail for one selector.
    pub fn refuse_listener(&self, selector: ChangeSelector) {
        self.lock().refused_selectors.insert(selector);
    }

    /// Make every `set_default_device` call fail.
    pub fn reject_default_writes(&self, reject: bool) {
        self.lock().reject_default_writes = reject;
    }

    /// Make `device_ids` fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.lock().fail_enumeration = fail;
    }

    /// Make `has_streams` fail for one device, as during teardown.
    pub fn fail_stream_query(&self, id: DeviceId) {
        self.lock().failed_stream_queries.insert(id);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Deliver one event to every listener registered for `selector`.
    pub fn emit(&self, selector: ChangeSelector) {
        let listeners: Vec<ChangeListener> = self
            .lock()
            .listeners
            .iter()
            .filter(|(s, _)| *s == selector)
            .map(|(_, l)| l.clone())
            .collect();

        // Called without the lock so listeners may query the system.
        for listener in listeners {
            listener(selector);
        }
    }

    fn find(&self, id: DeviceId) -> Result<SimulatedDevice, AudioError> {
        self.lock()
            .devices
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(AudioError::DeviceNotFound { device_id: id })
    }
}

impl AudioSystem for InMemoryAudioSystem {
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError> {
        let state = self.lock();
        if state.fail_enumeration {
            return Err(AudioError::OsStatus {
                operation: "read device list",
                status: -1,
            });
        }
        Ok(state.devices.iter().map(|d| d.id).collect())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError> {
        let state = self.lock();
        Ok(match direction {
            Direction::Input => state.default_input,
            Direction::Output => state.default_output,
        })
    }

    fn device_name(&self, id: DeviceId) -> Result<String, AudioError> {
        self.find(id)?.name.ok_or(AudioError::OsStatus {
            operation: "read device name",
            status: -1,
        })
    }

    fn has_streams(&self, id: DeviceId, direction: Direction) -> Result<bool, AudioError> {
        let device = self.find(id)?;
        if self.lock().failed_stream_queries.contains(&id) {
            return Err(AudioError::OsStatus {
                operation: "read stream configuration",
                status: -1,
            });
        }
        Ok(match direction {
            Direction::Input => device.has_input,
            Direction::Output => device.has_output,
        })
    }

    fn set_default_device(&self, direction: Direction, id: DeviceId) -> Result<(), AudioError> {
        let device = self.find(id)?;
        if self.lock().reject_default_writes {
            return Err(AudioError::SetDefaultFailed {
                direction,
                device_id: id,
                reason: "rejected by audio system".to_string(),
            });
        }

        let capable = match direction {
            Direction::Input => device.has_input,
            Direction::Output => device.has_output,
        };
        if !capable {
            return Err(AudioError::SetDefaultFailed {
                direction,
                device_id: id,
                reason: format!("device has no {} streams", direction),
            });
        }

        self.set_system_default(direction, Some(id));
        Ok(())
    }

    fn add_listener(
        &self,
        selector: ChangeSelector,
        listener: ChangeListener,
    ) -> Result<(), AudioError> {
        let mut state = self.lock();
        if state.refused_selectors.contains(&selector) {
            return Err(AudioError::ListenerFailed {
                selector,
                reason: "refused by audio system".to_string(),
            });
        }
        state.listeners.push((selector, listener));
        Ok(())
    }
}
