//! Audio device data models.
//!
//! Defines the core data structures for representing audio devices,
//! their direction, and the errors raised at the OS boundary.

use std::fmt;
use thiserror::Error;

/// Opaque audio object handle assigned by the OS.
///
/// Scoped to the current OS session. Handles are not stable across reboots
/// and may be reused after a device is unplugged and plugged back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DeviceId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Whether audio flows into (microphone) or out of (speaker) a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Both directions, output first (the order sections appear in the menu).
    pub const ALL: [Direction; 2] = [Direction::Output, Direction::Input];

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A snapshot of one audio device as seen for a single direction.
///
/// `is_default` is relative to the direction the device was queried for: the
/// same device can be the default output and not the default input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// OS handle of the device
    pub id: DeviceId,

    /// Display name. Also the identity key for hiding, so two devices with
    /// the same name hide and unhide together.
    pub name: String,

    /// Device exposes at least one input stream
    pub supports_input: bool,

    /// Device exposes at least one output stream
    pub supports_output: bool,

    /// Device is the system default for the queried direction
    pub is_default: bool,
}

impl AudioDevice {
    /// True if the device can carry audio in the given direction.
    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.supports_input,
            Direction::Output => self.supports_output,
        }
    }
}

/// Hardware change classes the directory listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSelector {
    /// Devices were added or removed
    DeviceList,

    /// The default output device changed
    DefaultOutput,

    /// The default input device changed
    DefaultInput,
}

impl ChangeSelector {
    /// Every class the notification bridge subscribes to.
    pub const ALL: [ChangeSelector; 3] = [
        ChangeSelector::DeviceList,
        ChangeSelector::DefaultOutput,
        ChangeSelector::DefaultInput,
    ];

    /// The selector reporting default-device changes for a direction.
    pub fn default_for(direction: Direction) -> Self {
        match direction {
            Direction::Input => ChangeSelector::DefaultInput,
            Direction::Output => ChangeSelector::DefaultOutput,
        }
    }
}

impl fmt::Display for ChangeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeSelector::DeviceList => "device list",
            ChangeSelector::DefaultOutput => "default output",
            ChangeSelector::DefaultInput => "default input",
        };
        f.write_str(name)
    }
}

/// Audio service error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: DeviceId },

    #[error("{operation} failed with OS status {status}")]
    OsStatus { operation: &'static str, status: i32 },

    #[error("Failed to set default {direction} device to {device_id}: {reason}")]
    SetDefaultFailed {
        direction: Direction,
        device_id: DeviceId,
        reason: String,
    },

    #[error("Failed to subscribe to {selector} changes: {reason}")]
    ListenerFailed {
        selector: ChangeSelector,
        reason: String,
    },

    #[error("String conversion error: {0}")]
    StringConversion(String),

    #[error("No audio backend is available on this platform")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(input: bool, output: bool) -> AudioDevice {
        AudioDevice {
            id: DeviceId(7),
            name: "Built-in".to_string(),
            supports_input: input,
            supports_output: output,
            is_default: false,
        }
    }

    #[test]
    fn test_supports_matches_flags() {
        let mic = device(true, false);
        assert!(mic.supports(Direction::Input));
        assert!(!mic.supports(Direction::Output));

        let both = device(true, true);
        assert!(Direction::ALL.iter().all(|d| both.supports(*d)));
    }

    #[test]
    fn test_default_selector_per_direction() {
        assert_eq!(
            ChangeSelector::default_for(Direction::Output),
            ChangeSelector::DefaultOutput
        );
        assert_eq!(
            ChangeSelector::default_for(Direction::Input),
            ChangeSelector::DefaultInput
        );
    }

    #[test]
    fn test_error_messages() {
        let err = AudioError::DeviceNotFound {
            device_id: DeviceId(2),
        };
        assert_eq!(err.to_string(), "Device not found: 2");

        let err = AudioError::OsStatus {
            operation: "read device list",
            status: -50,
        };
        assert_eq!(err.to_string(), "read device list failed with OS status -50");
    }
}
