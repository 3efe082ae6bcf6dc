//! Application state and lifecycle management.
//!
//! Connects the device directory, the hidden set and the login item to the
//! menu. Every rebuild starts from a fresh query, so the menu always shows
//! what the OS reports rather than what this program last asked for.

use crate::audio::{all_known_names, DeviceDirectory, Direction, HiddenSet};
use crate::platform::LoginItem;
use crate::ui::menu::{MenuCommand, MenuInput, MenuModel};
use tracing::{info, warn};

/// Main application state.
pub struct AppState {
    directory: DeviceDirectory,

    hidden: HiddenSet,

    /// `None` when no login item location could be determined
    login_item: Option<LoginItem>,

    /// Whether the application should exit
    pub should_exit: bool,
}

impl AppState {
    pub fn new(directory: DeviceDirectory, hidden: HiddenSet, login_item: Option<LoginItem>) -> Self {
        Self {
            directory,
            hidden,
            login_item,
            should_exit: false,
        }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub fn hidden(&self) -> &HiddenSet {
        &self.hidden
    }

    pub fn is_launch_at_login_enabled(&self) -> bool {
        self.login_item
            .as_ref()
            .map(LoginItem::is_enabled)
            .unwrap_or(false)
    }

    /// Query both directions and lay out the menu.
    pub fn build_menu(&self) -> MenuModel {
        let outputs = self.directory.list_devices(Direction::Output);
        let inputs = self.directory.list_devices(Direction::Input);

        MenuModel::build(&MenuInput {
            outputs: self.hidden.visible(&outputs),
            inputs: self.hidden.visible(&inputs),
            known_names: all_known_names(&outputs, &inputs),
            hidden: self.hidden.names().clone(),
            launch_at_login: self.is_launch_at_login_enabled(),
        })
    }

    /// Tooltip naming the current default output device.
    pub fn tooltip(&self) -> String {
        match self.directory.default_device(Direction::Output) {
            Some(device) => format!("Output: {}", device.name),
            None => "No output device".to_string(),
        }
    }

    /// Carry out a menu command. Failures are logged; the caller rebuilds
    /// the menu afterwards either way.
    pub fn handle_command(&mut self, command: &MenuCommand) {
        match command {
            MenuCommand::SelectDevice { direction, device } => {
                // Failure is already logged by the directory.
                let _ = self.directory.set_default(*direction, device.id);
            }
            MenuCommand::ToggleHidden(name) => {
                if let Err(e) = self.hidden.toggle(name) {
                    warn!("Failed to save hidden devices: {}", e);
                }
            }
            MenuCommand::ToggleLaunchAtLogin => match &self.login_item {
                Some(item) => {
                    if let Err(e) = item.toggle() {
                        warn!("Failed to toggle launch at login: {}", e);
                    }
                }
                None => warn!("Launch at login is not available"),
            },
            MenuCommand::Quit => {
                info!("Quit requested");
                self.should_exit = true;
            }
        }
    }
}
