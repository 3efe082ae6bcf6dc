//! Audio device directory.
//!
//! This module lists input and output devices, switches the system default
//! device, and turns OS hardware-change notifications into a single
//! "directory changed" signal.

#[cfg(target_os = "macos")]
pub mod coreaudio;
pub mod device;
pub mod directory;
pub mod hidden;
pub mod memory;
pub mod notifications;
pub mod system;

pub use device::{AudioDevice, AudioError, ChangeSelector, DeviceId, Direction};
pub use directory::DeviceDirectory;
pub use hidden::{all_known_names, visible, HiddenSet};
pub use memory::{InMemoryAudioSystem, SimulatedDevice};
pub use notifications::{
    create_event_channel, forward_to, ChangeBridge, DirectoryChanged, StartOutcome,
};
pub use system::{system_backend, AudioSystem, ChangeListener};
