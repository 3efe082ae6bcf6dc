use audio_switcher_rs::audio::{
    all_known_names, create_event_channel, forward_to, ChangeSelector, InMemoryAudioSystem,
    SimulatedDevice,
};
use audio_switcher_rs::{DeviceDirectory, DeviceId, Direction, HiddenSet, MemoryStore};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Built-in (in + out, default output) and a USB DAC (out only).
fn desk_setup() -> (Arc<InMemoryAudioSystem>, DeviceDirectory) {
    let system = Arc::new(InMemoryAudioSystem::new());
    system.plug(SimulatedDevice::new(1, "Built-in", true, true));
    system.plug(SimulatedDevice::new(2, "USB DAC", false, true));
    system.set_system_default(Direction::Output, Some(DeviceId(1)));
    let directory = DeviceDirectory::new(system.clone());
    (system, directory)
}

#[test]
fn output_listing_marks_default_and_hiding_filters() {
    let (_, directory) = desk_setup();

    let outputs = directory.list_devices(Direction::Output);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].id, DeviceId(1));
    assert!(outputs[0].is_default);
    assert_eq!(outputs[1].id, DeviceId(2));
    assert!(!outputs[1].is_default);

    let mut hidden = HiddenSet::load(Box::new(MemoryStore::new()));
    hidden.toggle("USB DAC").unwrap();

    let shown = hidden.visible(&outputs);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].id, DeviceId(1));
}

#[test]
fn at_most_one_default_per_direction() {
    let (system, directory) = desk_setup();
    system.plug(SimulatedDevice::new(3, "USB Mic", true, false));
    system.set_system_default(Direction::Input, Some(DeviceId(3)));

    for direction in Direction::ALL {
        let devices = directory.list_devices(direction);
        assert!(devices.iter().all(|d| d.supports(direction)));
        assert!(devices.iter().filter(|d| d.is_default).count() <= 1);
    }
}

#[test]
fn failed_write_to_removed_device_reflects_ground_truth() {
    let (system, directory) = desk_setup();
    system.unplug(DeviceId(2));

    assert!(directory.set_default(Direction::Output, DeviceId(2)).is_err());

    let outputs = directory.list_devices(Direction::Output);
    assert!(outputs.iter().all(|d| d.id != DeviceId(2)));
    assert_eq!(
        directory.default_device(Direction::Output).map(|d| d.id),
        Some(DeviceId(1))
    );
}

#[test]
fn rejected_write_leaves_default_unchanged() {
    let (system, directory) = desk_setup();
    system.reject_default_writes(true);

    assert!(directory.set_default(Direction::Output, DeviceId(2)).is_err());
    assert_eq!(
        directory.default_device(Direction::Output).map(|d| d.id),
        Some(DeviceId(1))
    );
}

#[test]
fn double_subscribe_fires_once_per_event() {
    let (system, directory) = desk_setup();
    let (sender, receiver) = create_event_channel();

    directory.subscribe_to_changes(forward_to(sender.clone()));
    directory.subscribe_to_changes(forward_to(sender));
    assert!(directory.is_subscribed());

    system.emit(ChangeSelector::DeviceList);

    assert_eq!(receiver.try_iter().count(), 1);
}

#[test]
fn own_default_change_is_observed_through_notification() {
    let (_, directory) = desk_setup();
    let (sender, receiver) = create_event_channel();
    directory.subscribe_to_changes(forward_to(sender));

    directory.set_default(Direction::Output, DeviceId(2)).unwrap();

    assert_eq!(receiver.try_iter().count(), 1);
    let default = directory.default_device(Direction::Output).unwrap();
    assert_eq!(default.name, "USB DAC");
}

#[test]
fn known_names_include_hidden_and_dual_direction_devices_once() {
    let (_, directory) = desk_setup();
    let mut hidden = HiddenSet::load(Box::new(MemoryStore::new()));
    hidden.toggle("Built-in").unwrap();

    let outputs = directory.list_devices(Direction::Output);
    let inputs = directory.list_devices(Direction::Input);

    assert!(hidden.visible(&inputs).is_empty());
    assert_eq!(all_known_names(&outputs, &inputs), vec!["Built-in", "USB DAC"]);
}

#[test]
fn hide_toggle_round_trip() {
    let (_, directory) = desk_setup();
    let outputs = directory.list_devices(Direction::Output);
    let baseline = audio_switcher_rs::audio::visible(&outputs, &BTreeSet::new());

    let mut hidden = HiddenSet::load(Box::new(MemoryStore::new()));
    hidden.toggle("Built-in").unwrap();
    hidden.toggle("Built-in").unwrap();

    assert_eq!(hidden.visible(&outputs), baseline);
}
