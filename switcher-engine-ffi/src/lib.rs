//! FFI bindings for the Audio Switcher device directory.
//!
//! This crate provides C ABI functions for a native shell (menu bar app
//! written in another language) that renders the menu itself. Payloads are
//! JSON strings. All functions use panic::catch_unwind to prevent Rust
//! panics from unwinding across the FFI boundary.

use audio_switcher_rs::audio::{
    all_known_names, create_event_channel, forward_to, system_backend, StartOutcome,
};
use audio_switcher_rs::{
    init_logging, AudioDevice, AudioError, AudioSystem, DeviceDirectory, DeviceId, Direction,
    HiddenSet, HiddenSetStore, JsonPreferences, PreferencesError,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    DeviceNotFound = -3,
    AudioSystemError = -4,
    JsonError = -5,
    PreferencesError = -6,
    SubscribeIncomplete = -7,
    Unsupported = -8,
    Panic = -99,
}

impl From<&AudioError> for ErrorCode {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound { .. } => ErrorCode::DeviceNotFound,
            AudioError::ListenerFailed { .. } => ErrorCode::SubscribeIncomplete,
            AudioError::Unsupported => ErrorCode::Unsupported,
            _ => ErrorCode::AudioSystemError,
        }
    }
}

/// Failure of one FFI call: the code to return and the message to keep.
#[derive(Debug)]
struct CallError {
    code: ErrorCode,
    message: String,
}

impl CallError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AudioError> for CallError {
    fn from(err: AudioError) -> Self {
        Self::new(ErrorCode::from(&err), err.to_string())
    }
}

impl From<PreferencesError> for CallError {
    fn from(err: PreferencesError) -> Self {
        Self::new(ErrorCode::PreferencesError, err.to_string())
    }
}

impl From<serde_json::Error> for CallError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::JsonError, err.to_string())
    }
}

/// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// Configuration for engine creation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub log_level: Option<String>,

    /// Preferences file; the per-user default location when absent
    #[serde(default)]
    pub preferences_path: Option<String>,
}

/// An audio device as seen for one direction.
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioDeviceDto {
    pub id: u32,
    pub name: String,
    pub supports_input: bool,
    pub supports_output: bool,
    pub is_default: bool,
}

impl From<AudioDevice> for AudioDeviceDto {
    fn from(device: AudioDevice) -> Self {
        Self {
            id: device.id.0,
            name: device.name,
            supports_input: device.supports_input,
            supports_output: device.supports_output,
            is_default: device.is_default,
        }
    }
}

/// Response containing a list of devices.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<AudioDeviceDto>,
}

/// Response containing device names.
#[derive(Debug, Serialize, Deserialize)]
pub struct NameListResponse {
    pub names: Vec<String>,
}

/// Response containing operation result.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
}

// ============================================================================
// Engine Handle Type
// ============================================================================

/// Opaque handle to the switcher engine. Actually points to a SwitcherEngine struct.
pub type SwitcherEngineHandle = *mut c_void;

/// Change callback. Invoked with the `user_data` given at subscription.
pub type ChangeCallback = extern "C" fn(user_data: *mut c_void);

/// Callback plus the shell's context pointer.
#[derive(Clone, Copy)]
struct CallbackTarget {
    callback: ChangeCallback,
    user_data: *mut c_void,
}

// The shell guarantees `user_data` may be used from the dispatcher thread
// until the owning engine is destroyed.
unsafe impl Send for CallbackTarget {}

impl CallbackTarget {
    fn invoke(&self) {
        (self.callback)(self.user_data);
    }
}

/// Change delivery shared by every engine on one audio backend.
///
/// OS listeners are process-wide, so they are registered once per hub and
/// feed a single dispatcher thread. The dispatcher calls whichever engine
/// subscribed last; a destroyed engine's callback is never called again.
struct ChangeHub {
    directory: DeviceDirectory,

    // Owning engine id and its callback. Held while the callback runs.
    target: Arc<Mutex<Option<(u64, CallbackTarget)>>>,

    // Registration failures, `None` until the dispatcher is running.
    started: Mutex<Option<Vec<AudioError>>>,
}

/// Hub for the real audio backend, created by the first engine.
static SYSTEM_HUB: Mutex<Option<Arc<ChangeHub>>> = Mutex::new(None);

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

impl ChangeHub {
    fn new(system: Arc<dyn AudioSystem>) -> Arc<Self> {
        Arc::new(Self {
            directory: DeviceDirectory::new(system),
            target: Arc::new(Mutex::new(None)),
            started: Mutex::new(None),
        })
    }

    fn system() -> Result<Arc<Self>, CallError> {
        let mut hub = SYSTEM_HUB
            .lock()
            .map_err(|_| CallError::new(ErrorCode::Panic, "backend lock poisoned"))?;
        if let Some(hub) = hub.as_ref() {
            return Ok(hub.clone());
        }

        let created = Self::new(system_backend()?);
        *hub = Some(created.clone());
        Ok(created)
    }

    /// Route changes to `target` on behalf of engine `owner`.
    fn attach(&self, owner: u64, target: CallbackTarget) -> Result<(), CallError> {
        self.ensure_dispatching()?;

        let mut current = self
            .target
            .lock()
            .map_err(|_| CallError::new(ErrorCode::Panic, "callback lock poisoned"))?;
        *current = Some((owner, target));
        drop(current);

        match self.registration_failures().into_iter().next() {
            Some(first) => Err(first.into()),
            None => Ok(()),
        }
    }

    /// Stop calling `owner`'s callback. Waits for a callback in flight.
    fn detach(&self, owner: u64) {
        if let Ok(mut current) = self.target.lock() {
            if matches!(*current, Some((id, _)) if id == owner) {
                *current = None;
            }
        }
    }

    fn registration_failures(&self) -> Vec<AudioError> {
        self.started
            .lock()
            .ok()
            .and_then(|started| started.clone())
            .unwrap_or_default()
    }

    fn ensure_dispatching(&self) -> Result<(), CallError> {
        let mut started = self
            .started
            .lock()
            .map_err(|_| CallError::new(ErrorCode::Panic, "dispatcher lock poisoned"))?;
        if started.is_some() {
            return Ok(());
        }

        // Dispatcher first: listeners must never feed a channel nobody drains.
        let (sender, receiver) = create_event_channel();
        let target = self.target.clone();
        std::thread::Builder::new()
            .name("switcher-change-dispatch".to_string())
            .spawn(move || {
                for _ in receiver {
                    let Ok(current) = target.lock() else {
                        break;
                    };
                    if let Some((_, callback)) = current.as_ref() {
                        if panic::catch_unwind(AssertUnwindSafe(|| callback.invoke())).is_err() {
                            warn!("Change callback panicked");
                        }
                    }
                }
                debug!("Change dispatcher stopped");
            })
            .map_err(|e| CallError::new(ErrorCode::AudioSystemError, e.to_string()))?;

        let failed = match self.directory.subscribe_to_changes(forward_to(sender)) {
            StartOutcome::Registered { failed } => failed,
            StartOutcome::AlreadyRegistered => Vec::new(),
        };
        *started = Some(failed);
        Ok(())
    }
}

/// Internal engine state.
struct SwitcherEngine {
    id: u64,
    hub: Arc<ChangeHub>,

    // Calls may arrive from any shell thread.
    hidden: Mutex<HiddenSet>,

    subscribed: AtomicBool,
}

impl SwitcherEngine {
    fn new(hub: Arc<ChangeHub>, store: Box<dyn HiddenSetStore>) -> Self {
        Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            hub,
            hidden: Mutex::new(HiddenSet::load(store)),
            subscribed: AtomicBool::new(false),
        }
    }

    fn from_config(config: &EngineConfig) -> Result<Self, CallError> {
        let hub = ChangeHub::system()?;
        let preferences = match &config.preferences_path {
            Some(path) => JsonPreferences::new(path),
            None => JsonPreferences::open_default()?,
        };
        Ok(Self::new(hub, Box::new(preferences)))
    }

    fn directory(&self) -> &DeviceDirectory {
        &self.hub.directory
    }

    /// First call routes changes to `target`; later calls do nothing.
    fn subscribe(&self, target: CallbackTarget) -> Result<(), CallError> {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let result = self.hub.attach(self.id, target);
        if let Err(e) = &result {
            if e.code != ErrorCode::SubscribeIncomplete {
                self.subscribed.store(false, Ordering::Release);
            }
        }
        result
    }

    fn with_hidden<T>(&self, f: impl FnOnce(&mut HiddenSet) -> T) -> Result<T, CallError> {
        let mut hidden = self
            .hidden
            .lock()
            .map_err(|_| CallError::new(ErrorCode::Panic, "hidden set lock poisoned"))?;
        Ok(f(&mut hidden))
    }
}

impl Drop for SwitcherEngine {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with switcher_engine_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        // String contained a null byte, return an empty string
        Err(_) => CString::default().into_raw(),
    }
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Borrow the engine behind a handle.
unsafe fn engine_ref<'a>(handle: SwitcherEngineHandle) -> Result<&'a SwitcherEngine, CallError> {
    if handle.is_null() {
        return Err(CallError::new(ErrorCode::InvalidHandle, "Null engine handle"));
    }
    Ok(&*(handle as *const SwitcherEngine))
}

fn parse_direction(direction: u32) -> Result<Direction, CallError> {
    match direction {
        0 => Ok(Direction::Output),
        1 => Ok(Direction::Input),
        _ => Err(CallError::new(ErrorCode::InvalidArgument, "Invalid direction")),
    }
}

/// Run a call returning JSON. Null on failure with the last error set.
fn json_call<F>(what: &str, f: F) -> *mut c_char
where
    F: FnOnce() -> Result<String, CallError>,
{
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(json)) => alloc_c_string(&json),
        Ok(Err(e)) => {
            set_last_error(e.code, e.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {}", what));
            ptr::null_mut()
        }
    }
}

/// Run a call returning a status code.
fn status_call<F>(what: &str, f: F) -> i32
where
    F: FnOnce() -> Result<(), CallError>,
{
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorCode::Success as i32,
        Ok(Err(e)) => {
            let code = e.code;
            set_last_error(code, e.message);
            code as i32
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {}", what));
            ErrorCode::Panic as i32
        }
    }
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Create a new switcher engine instance.
///
/// # Arguments
/// * `config_json` - JSON configuration string (can be null for defaults)
///
/// # Returns
/// Handle to the engine, or null on failure. Check switcher_engine_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with switcher_engine_destroy().
#[no_mangle]
pub extern "C" fn switcher_engine_create(config_json: *const c_char) -> SwitcherEngineHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let config = match unsafe { parse_c_str(config_json) } {
            Some(json) => serde_json::from_str(json)?,
            None => EngineConfig::default(),
        };

        init_logging(config.log_level.as_deref().unwrap_or("info"));

        let engine = Box::new(SwitcherEngine::from_config(&config)?);
        Ok::<_, CallError>(Box::into_raw(engine) as SwitcherEngineHandle)
    });

    match result {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            set_last_error(e.code, e.message);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during engine creation");
            ptr::null_mut()
        }
    }
}

/// Destroy a switcher engine instance.
///
/// Once this returns, the engine's change callback is no longer called.
///
/// # Safety
/// The handle must have been created by switcher_engine_create() and must not be used after this call.
#[no_mangle]
pub extern "C" fn switcher_engine_destroy(handle: SwitcherEngineHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        drop(Box::from_raw(handle as *mut SwitcherEngine));
    });
}

// ============================================================================
// FFI Functions - Device Operations
// ============================================================================

/// List devices for a direction.
///
/// # Arguments
/// * `handle` - Engine handle
/// * `direction` - 0 = Output, 1 = Input
/// * `visible_only` - non-zero to leave out hidden devices
///
/// # Returns
/// JSON string containing the device list. Caller must free with switcher_engine_free_string().
/// Returns null on failure.
#[no_mangle]
pub extern "C" fn switcher_engine_list_devices(
    handle: SwitcherEngineHandle,
    direction: u32,
    visible_only: i32,
) -> *mut c_char {
    json_call("device listing", || {
        let engine = unsafe { engine_ref(handle)? };
        let direction = parse_direction(direction)?;

        let mut devices = engine.directory().list_devices(direction);
        if visible_only != 0 {
            devices = engine.with_hidden(|hidden| hidden.visible(&devices))?;
        }

        let response = DeviceListResponse {
            devices: devices.into_iter().map(Into::into).collect(),
        };
        Ok(serde_json::to_string(&response)?)
    })
}

/// Make a device the default for a direction.
///
/// Success means the OS accepted the request; re-list to see the result.
///
/// # Arguments
/// * `handle` - Engine handle
/// * `direction` - 0 = Output, 1 = Input
/// * `device_id` - Device handle from a device listing
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn switcher_engine_set_default_device(
    handle: SwitcherEngineHandle,
    direction: u32,
    device_id: u32,
) -> i32 {
    status_call("set default device", || {
        let engine = unsafe { engine_ref(handle)? };
        let direction = parse_direction(direction)?;
        engine.directory().set_default(direction, DeviceId(device_id))?;
        Ok(())
    })
}

/// Subscribe to device directory changes.
///
/// Only the first call per engine takes effect; later calls are a no-op and
/// their callback is never invoked. OS listeners are registered once per
/// process and every engine shares one dispatcher thread, which calls the
/// most recently subscribed live engine once per OS event, without payload.
///
/// # Returns
/// 0 on success. SubscribeIncomplete (-7) when the OS refused some change
/// classes; the callback still fires for the others.
///
/// # Safety
/// `user_data` must stay valid until switcher_engine_destroy() returns.
/// The callback must not destroy its own engine.
#[no_mangle]
pub extern "C" fn switcher_engine_subscribe(
    handle: SwitcherEngineHandle,
    callback: Option<ChangeCallback>,
    user_data: *mut c_void,
) -> i32 {
    status_call("subscribe", || {
        let engine = unsafe { engine_ref(handle)? };
        let callback = callback
            .ok_or_else(|| CallError::new(ErrorCode::InvalidArgument, "Null callback"))?;

        engine.subscribe(CallbackTarget {
            callback,
            user_data,
        })
    })
}

// ============================================================================
// FFI Functions - Hidden Devices
// ============================================================================

/// Hide a device name if shown, show it if hidden. Saved immediately.
///
/// # Returns
/// JSON OperationResult with `is_hidden`. Caller must free with switcher_engine_free_string().
/// Returns null on failure; the hidden set is unchanged then.
#[no_mangle]
pub extern "C" fn switcher_engine_toggle_hidden(
    handle: SwitcherEngineHandle,
    name: *const c_char,
) -> *mut c_char {
    json_call("toggle hidden", || {
        let engine = unsafe { engine_ref(handle)? };
        let name = unsafe { parse_c_str(name) }
            .ok_or_else(|| CallError::new(ErrorCode::InvalidArgument, "Invalid device name"))?;

        let is_hidden = engine.with_hidden(|hidden| hidden.toggle(name))??;

        let response = OperationResult {
            success: true,
            error: None,
            is_hidden: Some(is_hidden),
        };
        Ok(serde_json::to_string(&response)?)
    })
}

/// Currently hidden names, sorted.
///
/// # Returns
/// JSON string `{"names": [...]}`. Caller must free with switcher_engine_free_string().
#[no_mangle]
pub extern "C" fn switcher_engine_hidden_names(handle: SwitcherEngineHandle) -> *mut c_char {
    json_call("hidden names", || {
        let engine = unsafe { engine_ref(handle)? };
        let names = engine.with_hidden(|hidden| hidden.names().iter().cloned().collect())?;
        Ok(serde_json::to_string(&NameListResponse { names })?)
    })
}

/// Names of all current devices in either direction, hidden ones included,
/// sorted and without duplicates. Used for a "manage hidden devices" list.
///
/// # Returns
/// JSON string `{"names": [...]}`. Caller must free with switcher_engine_free_string().
#[no_mangle]
pub extern "C" fn switcher_engine_known_names(handle: SwitcherEngineHandle) -> *mut c_char {
    json_call("known names", || {
        let engine = unsafe { engine_ref(handle)? };
        let outputs = engine.directory().list_devices(Direction::Output);
        let inputs = engine.directory().list_devices(Direction::Input);
        let names = all_known_names(&outputs, &inputs);
        Ok(serde_json::to_string(&NameListResponse { names })?)
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the switcher_engine_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn switcher_engine_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        drop(CString::from_raw(ptr));
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn switcher_engine_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with switcher_engine_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn switcher_engine_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with switcher_engine_free_string().
#[no_mangle]
pub extern "C" fn switcher_engine_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================
