//! Boundary between the device directory and the OS audio subsystem.
//!
//! Every call is fallible and reports failure as an [`AudioError`] value.
//! Backends never panic across this boundary.

use super::device::{AudioError, ChangeSelector, DeviceId, Direction};
use std::sync::Arc;

/// Callback run by a backend when a watched property changes.
///
/// Backends may invoke it from any thread, so it must only hand the event
/// over to whatever serializes delivery for the consumer.
pub type ChangeListener = Arc<dyn Fn(ChangeSelector) + Send + Sync>;

/// Raw queries and commands against the OS audio hardware layer.
pub trait AudioSystem: Send + Sync {
    /// Every device handle the OS knows about, in enumeration order,
    /// regardless of direction.
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError>;

    /// Current default device for a direction, `None` if there is none.
    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError>;

    /// Display name of a device.
    fn device_name(&self, id: DeviceId) -> Result<String, AudioError>;

    /// Whether the device exposes any stream in the given direction's scope.
    fn has_streams(&self, id: DeviceId, direction: Direction) -> Result<bool, AudioError>;

    /// Ask the OS to make `id` the default device for a direction.
    fn set_default_device(&self, direction: Direction, id: DeviceId) -> Result<(), AudioError>;

    /// Register a standing listener for one change class.
    ///
    /// There is no matching removal: registrations live for the rest of the
    /// process.
    fn add_listener(
        &self,
        selector: ChangeSelector,
        listener: ChangeListener,
    ) -> Result<(), AudioError>;
}

/// Create the audio system backend for the current platform.
#[cfg(target_os = "macos")]
pub fn system_backend() -> Result<Arc<dyn AudioSystem>, AudioError> {
    Ok(Arc::new(super::coreaudio::CoreAudioSystem::new()))
}

/// Create the audio system backend for the current platform.
#[cfg(not(target_os = "macos"))]
pub fn system_backend() -> Result<Arc<dyn AudioSystem>, AudioError> {
    Err(AudioError::Unsupported)
}
