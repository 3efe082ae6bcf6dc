//! Menu model.
//!
//! Describes the menu bar menu independently of any widget toolkit. Every
//! actionable entry carries a command id, and the model keeps the mapping
//! from id to [`MenuCommand`] so a click is resolved by lookup rather than by
//! reading data back out of a widget.
//!
//! Ids are derived from what an entry acts on (`out:<device>`,
//! `in:<device>`, `hide:<name>`), never from its position. A click on a menu
//! shown before a rebuild therefore resolves to the same target in the new
//! model, or to nothing when that target is gone.

use crate::audio::{AudioDevice, Direction};
use std::collections::{BTreeSet, HashMap};

/// Identifier attached to an actionable menu entry.
pub type CommandId = String;

// Fixed command IDs
pub const CMD_QUIT: &str = "quit";
pub const CMD_TOGGLE_LAUNCH_AT_LOGIN: &str = "launch-at-login";

pub const OUTPUT_TITLE: &str = "OUTPUT";
pub const INPUT_TITLE: &str = "MIC INPUT";
pub const HIDE_TITLE: &str = "Hide Devices";
pub const LAUNCH_AT_LOGIN_TITLE: &str = "Launch at Login";
pub const QUIT_TITLE: &str = "Quit";

/// What selecting a menu entry does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    /// Make the device the default for the direction of its section
    SelectDevice {
        direction: Direction,
        device: AudioDevice,
    },

    /// Hide or unhide every device with this name
    ToggleHidden(String),

    ToggleLaunchAtLogin,

    Quit,
}

/// One row of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    /// Disabled section title
    Header(String),

    /// Clickable row, optionally with a check mark
    Item {
        id: CommandId,
        label: String,
        checked: bool,
    },

    Separator,

    Submenu {
        label: String,
        entries: Vec<MenuEntry>,
    },
}

/// Everything the menu shows.
#[derive(Debug, Clone, Default)]
pub struct MenuInput {
    /// Output devices after hiding
    pub outputs: Vec<AudioDevice>,

    /// Input devices after hiding
    pub inputs: Vec<AudioDevice>,

    /// Names for the hide submenu, hidden ones included
    pub known_names: Vec<String>,

    pub hidden: BTreeSet<String>,

    pub launch_at_login: bool,
}

/// A built menu plus its command table.
#[derive(Debug, Clone, Default)]
pub struct MenuModel {
    entries: Vec<MenuEntry>,
    commands: HashMap<CommandId, MenuCommand>,
}

impl MenuModel {
    pub fn build(input: &MenuInput) -> Self {
        let mut commands = HashMap::new();
        let mut entries = Vec::new();

        if !input.outputs.is_empty() {
            entries.extend(device_section(
                &mut commands,
                OUTPUT_TITLE,
                Direction::Output,
                &input.outputs,
            ));
        }

        if !input.outputs.is_empty() && !input.inputs.is_empty() {
            entries.push(MenuEntry::Separator);
        }

        if !input.inputs.is_empty() {
            entries.extend(device_section(
                &mut commands,
                INPUT_TITLE,
                Direction::Input,
                &input.inputs,
            ));
        }

        entries.push(MenuEntry::Separator);

        let hide_entries = input
            .known_names
            .iter()
            .map(|name| {
                let id = format!("hide:{}", name);
                commands.insert(id.clone(), MenuCommand::ToggleHidden(name.clone()));
                MenuEntry::Item {
                    id,
                    label: name.clone(),
                    checked: input.hidden.contains(name),
                }
            })
            .collect();
        entries.push(MenuEntry::Submenu {
            label: HIDE_TITLE.to_string(),
            entries: hide_entries,
        });

        entries.push(MenuEntry::Separator);

        commands.insert(
            CMD_TOGGLE_LAUNCH_AT_LOGIN.to_string(),
            MenuCommand::ToggleLaunchAtLogin,
        );
        entries.push(MenuEntry::Item {
            id: CMD_TOGGLE_LAUNCH_AT_LOGIN.to_string(),
            label: LAUNCH_AT_LOGIN_TITLE.to_string(),
            checked: input.launch_at_login,
        });

        commands.insert(CMD_QUIT.to_string(), MenuCommand::Quit);
        entries.push(MenuEntry::Item {
            id: CMD_QUIT.to_string(),
            label: QUIT_TITLE.to_string(),
            checked: false,
        });

        Self { entries, commands }
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    /// Resolve a clicked entry.
    pub fn command(&self, id: &str) -> Option<&MenuCommand> {
        self.commands.get(id)
    }
}

fn device_command_id(direction: Direction, device: &AudioDevice) -> CommandId {
    match direction {
        Direction::Output => format!("out:{}", device.id),
        Direction::Input => format!("in:{}", device.id),
    }
}

fn device_section(
    commands: &mut HashMap<CommandId, MenuCommand>,
    title: &str,
    direction: Direction,
    devices: &[AudioDevice],
) -> Vec<MenuEntry> {
    let mut entries = vec![MenuEntry::Header(title.to_string())];
    for device in devices {
        let id = device_command_id(direction, device);
        commands.insert(
            id.clone(),
            MenuCommand::SelectDevice {
                direction,
                device: device.clone(),
            },
        );
        entries.push(MenuEntry::Item {
            id,
            label: device.name.clone(),
            checked: device.is_default,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceId;

    fn device(id: u32, name: &str, is_default: bool) -> AudioDevice {
        AudioDevice {
            id: DeviceId(id),
            name: name.to_string(),
            supports_input: true,
            supports_output: true,
            is_default,
        }
    }

    fn labels(entries: &[MenuEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e {
                MenuEntry::Header(t) => format!("#{}", t),
                MenuEntry::Item { label, checked, .. } => {
                    format!("{}{}", if *checked { "*" } else { "" }, label)
                }
                MenuEntry::Separator => "---".to_string(),
                MenuEntry::Submenu { label, .. } => format!(">{}", label),
            })
            .collect()
    }

    #[test]
    fn test_full_layout() {
        let model = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "Built-in", true), device(2, "USB DAC", false)],
            inputs: vec![device(1, "Built-in", false)],
            known_names: vec!["Built-in".into(), "HDMI".into(), "USB DAC".into()],
            hidden: ["HDMI".to_string()].into_iter().collect(),
            launch_at_login: true,
        });

        assert_eq!(
            labels(model.entries()),
            vec![
                "#OUTPUT",
                "*Built-in",
                "USB DAC",
                "---",
                "#MIC INPUT",
                "Built-in",
                "---",
                ">Hide Devices",
                "---",
                "*Launch at Login",
                "Quit",
            ]
        );

        let MenuEntry::Submenu { entries, .. } = &model.entries()[7] else {
            panic!("expected hide submenu");
        };
        assert_eq!(labels(entries), vec!["Built-in", "*HDMI", "USB DAC"]);
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let model = MenuModel::build(&MenuInput {
            inputs: vec![device(3, "USB Mic", true)],
            ..Default::default()
        });

        let rows = labels(model.entries());
        assert_eq!(rows[0], "#MIC INPUT");
        assert!(!rows.contains(&"#OUTPUT".to_string()));
        // No separator between sections when one is missing.
        assert_eq!(rows[2], "---");
        assert_eq!(rows[3], ">Hide Devices");
    }

    #[test]
    fn test_command_lookup() {
        let model = MenuModel::build(&MenuInput {
            outputs: vec![device(2, "USB DAC", false)],
            known_names: vec!["USB DAC".into()],
            ..Default::default()
        });

        let MenuEntry::Item { id, .. } = &model.entries()[1] else {
            panic!("expected device row");
        };
        assert_eq!(
            model.command(id),
            Some(&MenuCommand::SelectDevice {
                direction: Direction::Output,
                device: device(2, "USB DAC", false),
            })
        );

        assert_eq!(model.command(CMD_QUIT), Some(&MenuCommand::Quit));
        assert_eq!(
            model.command(CMD_TOGGLE_LAUNCH_AT_LOGIN),
            Some(&MenuCommand::ToggleLaunchAtLogin)
        );
        assert_eq!(model.command("out:9999"), None);
    }

    #[test]
    fn test_ids_are_unique() {
        let model = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "A", false), device(2, "B", false)],
            inputs: vec![device(1, "A", false)],
            known_names: vec!["A".into(), "B".into()],
            ..Default::default()
        });

        // 3 device rows, 2 hide rows, launch at login, quit
        assert_eq!(model.commands.len(), 7);
    }

    #[test]
    fn test_ids_survive_rebuild() {
        let before = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "Built-in", true)],
            inputs: vec![device(1, "Built-in", true)],
            known_names: vec!["Built-in".into()],
            ..Default::default()
        });
        let MenuEntry::Item { id: shown, .. } = &before.entries()[4] else {
            panic!("expected input row");
        };

        // A headset arrives while the old menu is still open.
        let after = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "Built-in", true), device(5, "Headset", false)],
            inputs: vec![device(1, "Built-in", true), device(5, "Headset", false)],
            known_names: vec!["Built-in".into(), "Headset".into()],
            ..Default::default()
        });

        assert_eq!(
            after.command(shown),
            Some(&MenuCommand::SelectDevice {
                direction: Direction::Input,
                device: device(1, "Built-in", true),
            })
        );
    }

    #[test]
    fn test_stale_id_resolves_to_nothing() {
        let before = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "Built-in", true), device(2, "USB DAC", false)],
            known_names: vec!["Built-in".into(), "USB DAC".into()],
            ..Default::default()
        });
        let MenuEntry::Item { id: shown, .. } = &before.entries()[2] else {
            panic!("expected USB DAC row");
        };

        let after = MenuModel::build(&MenuInput {
            outputs: vec![device(1, "Built-in", true)],
            known_names: vec!["Built-in".into()],
            ..Default::default()
        });

        assert_eq!(after.command(shown), None);
        assert_eq!(after.command("hide:USB DAC"), None);
    }
}
