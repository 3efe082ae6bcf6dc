//! Platform services around the device directory.
//!
//! This module contains preference persistence, launch-at-login
//! registration and icon generation.

pub mod icons;
pub mod login_item;
pub mod preferences;

pub use login_item::{LoginItem, LoginItemError};
pub use preferences::{
    default_preferences_path, HiddenSetStore, JsonPreferences, MemoryStore, PreferencesError,
};
