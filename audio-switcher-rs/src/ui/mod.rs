//! UI module for the menu bar.
//!
//! This module provides the toolkit-independent menu model and, on macOS,
//! the tray icon and event loop that render it.

pub mod menu;
#[cfg(target_os = "macos")]
pub mod tray;

pub use menu::{CommandId, MenuCommand, MenuEntry, MenuInput, MenuModel};
#[cfg(target_os = "macos")]
pub use tray::{run_event_loop, TrayError, TrayManager, UserEvent};
