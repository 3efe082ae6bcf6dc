//! Audio Switcher - Library
//!
//! A menu bar utility for switching the system's default audio devices.
//!
//! ## Features
//!
//! - List output and input devices with the current default checked
//! - Switch the default output or input device
//! - Automatic refresh on device hot-plug and default device changes
//! - Hide devices from the menu by name (persisted)
//! - Launch at login option
//!
//! Hiding works by device name. Two physical devices that report the same
//! name cannot be hidden independently.

pub mod app;
pub mod audio;
pub mod logging;
pub mod platform;
pub mod ui;

pub use app::AppState;
pub use audio::{
    AudioDevice, AudioError, AudioSystem, DeviceDirectory, DeviceId, Direction, HiddenSet,
    StartOutcome,
};
pub use logging::init_logging;
pub use platform::{HiddenSetStore, JsonPreferences, LoginItem, MemoryStore, PreferencesError};
pub use ui::{MenuCommand, MenuModel};
