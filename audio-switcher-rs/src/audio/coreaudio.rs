#![cfg(target_os = "macos")]

//! CoreAudio HAL backend.
//!
//! Reads and writes properties of the system audio object and of individual
//! device objects through `AudioObject*PropertyData`, and registers property
//! listeners for change notifications.

use super::device::{AudioError, ChangeSelector, DeviceId, Direction};
use super::system::{AudioSystem, ChangeListener};
use coreaudio_sys::{
    kAudioDevicePropertyStreams, kAudioHardwareNoError, kAudioHardwarePropertyDefaultInputDevice,
    kAudioHardwarePropertyDefaultOutputDevice, kAudioHardwarePropertyDevices,
    kAudioObjectPropertyElementMain, kAudioObjectPropertyName, kAudioObjectPropertyScopeGlobal,
    kAudioObjectPropertyScopeInput, kAudioObjectPropertyScopeOutput, kAudioObjectSystemObject,
    kAudioObjectUnknown, AudioDeviceID, AudioObjectAddPropertyListener,
    AudioObjectGetPropertyData, AudioObjectGetPropertyDataSize, AudioObjectID,
    AudioObjectPropertyAddress, AudioObjectSetPropertyData, CFRelease, CFStringGetCString,
    CFStringGetLength, CFStringGetMaximumSizeForEncoding, CFStringRef, OSStatus, UInt32,
};
use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::error;

const NO_ERROR: OSStatus = kAudioHardwareNoError as OSStatus;
const CF_STRING_ENCODING_UTF8: u32 = 0x0800_0100;

fn global_address(selector: u32) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: kAudioObjectPropertyScopeGlobal,
        mElement: kAudioObjectPropertyElementMain,
    }
}

fn default_device_address(direction: Direction) -> AudioObjectPropertyAddress {
    global_address(match direction {
        Direction::Input => kAudioHardwarePropertyDefaultInputDevice,
        Direction::Output => kAudioHardwarePropertyDefaultOutputDevice,
    })
}

fn selector_address(selector: ChangeSelector) -> AudioObjectPropertyAddress {
    match selector {
        ChangeSelector::DeviceList => global_address(kAudioHardwarePropertyDevices),
        ChangeSelector::DefaultOutput => default_device_address(Direction::Output),
        ChangeSelector::DefaultInput => default_device_address(Direction::Input),
    }
}

/// Copy a CFString out as UTF-8. The buffer is sized for the string's
/// worst-case encoded length, so long names are never truncated.
fn cfstring_to_string(cf: CFStringRef) -> Result<String, String> {
    let capacity = unsafe {
        CFStringGetMaximumSizeForEncoding(CFStringGetLength(cf), CF_STRING_ENCODING_UTF8)
    };
    if capacity < 0 {
        return Err("string too long".to_string());
    }

    let mut buf = vec![0 as c_char; capacity as usize + 1];
    let ok = unsafe {
        CFStringGetCString(
            cf,
            buf.as_mut_ptr(),
            buf.len() as _,
            CF_STRING_ENCODING_UTF8,
        )
    };
    if ok == 0 {
        return Err("not representable as UTF-8".to_string());
    }

    let text = unsafe { CStr::from_ptr(buf.as_ptr()) };
    text.to_str().map(str::to_owned).map_err(|e| e.to_string())
}

fn check(operation: &'static str, status: OSStatus) -> Result<(), AudioError> {
    if status == NO_ERROR {
        Ok(())
    } else {
        Err(AudioError::OsStatus { operation, status })
    }
}

/// State handed to CoreAudio as listener client data. Leaked on successful
/// registration; listeners are never removed.
struct ListenerContext {
    selector: ChangeSelector,
    listener: ChangeListener,
}

unsafe extern "C" fn property_listener(
    _id: AudioObjectID,
    _count: UInt32,
    _addresses: *const AudioObjectPropertyAddress,
    client_data: *mut c_void,
) -> OSStatus {
    let context = &*(client_data as *const ListenerContext);
    if panic::catch_unwind(AssertUnwindSafe(|| (context.listener)(context.selector))).is_err() {
        error!("Change listener for {} panicked", context.selector);
    }
    NO_ERROR
}

/// The system-wide CoreAudio hardware object.
#[derive(Debug, Default)]
pub struct CoreAudioSystem;

impl CoreAudioSystem {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSystem for CoreAudioSystem {
    fn device_ids(&self) -> Result<Vec<DeviceId>, AudioError> {
        let address = global_address(kAudioHardwarePropertyDevices);

        let mut size: UInt32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
            )
        };
        check("read device list size", status)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let count = size as usize / mem::size_of::<AudioDeviceID>();
        let mut ids: Vec<AudioDeviceID> = vec![0; count];
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                ids.as_mut_ptr() as *mut c_void,
            )
        };
        check("read device list", status)?;

        // The list may have shrunk between the two calls.
        ids.truncate(size as usize / mem::size_of::<AudioDeviceID>());
        Ok(ids.into_iter().map(DeviceId).collect())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<DeviceId>, AudioError> {
        let address = default_device_address(direction);

        let mut id: AudioDeviceID = kAudioObjectUnknown;
        let mut size = mem::size_of::<AudioDeviceID>() as UInt32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut id as *mut AudioDeviceID as *mut c_void,
            )
        };
        check("read default device", status)?;

        if id == kAudioObjectUnknown {
            Ok(None)
        } else {
            Ok(Some(DeviceId(id)))
        }
    }

    fn device_name(&self, id: DeviceId) -> Result<String, AudioError> {
        let address = global_address(kAudioObjectPropertyName);

        let mut cf_name: CFStringRef = ptr::null();
        let mut size = mem::size_of::<CFStringRef>() as UInt32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                id.0,
                &address,
                0,
                ptr::null(),
                &mut size,
                &mut cf_name as *mut CFStringRef as *mut c_void,
            )
        };
        check("read device name", status)?;
        if cf_name.is_null() {
            return Err(AudioError::StringConversion(format!(
                "device {} has no name",
                id
            )));
        }

        let name = cfstring_to_string(cf_name);
        unsafe { CFRelease(cf_name as *const c_void) };
        name.map_err(|e| AudioError::StringConversion(format!("name of device {}: {}", id, e)))
    }

    fn has_streams(&self, id: DeviceId, direction: Direction) -> Result<bool, AudioError> {
        let address = AudioObjectPropertyAddress {
            mSelector: kAudioDevicePropertyStreams,
            mScope: match direction {
                Direction::Input => kAudioObjectPropertyScopeInput,
                Direction::Output => kAudioObjectPropertyScopeOutput,
            },
            mElement: kAudioObjectPropertyElementMain,
        };

        let mut size: UInt32 = 0;
        let status =
            unsafe { AudioObjectGetPropertyDataSize(id.0, &address, 0, ptr::null(), &mut size) };
        check("read stream list size", status)?;
        Ok(size > 0)
    }

    fn set_default_device(&self, direction: Direction, id: DeviceId) -> Result<(), AudioError> {
        let address = default_device_address(direction);
        let device: AudioDeviceID = id.0;

        let status = unsafe {
            AudioObjectSetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                mem::size_of::<AudioDeviceID>() as UInt32,
                &device as *const AudioDeviceID as *const c_void,
            )
        };

        if status == NO_ERROR {
            Ok(())
        } else {
            Err(AudioError::SetDefaultFailed {
                direction,
                device_id: id,
                reason: format!("OS status {}", status),
            })
        }
    }

    fn add_listener(
        &self,
        selector: ChangeSelector,
        listener: ChangeListener,
    ) -> Result<(), AudioError> {
        let address = selector_address(selector);
        let context = Box::into_raw(Box::new(ListenerContext { selector, listener }));

        let status = unsafe {
            AudioObjectAddPropertyListener(
                kAudioObjectSystemObject,
                &address,
                Some(property_listener),
                context as *mut c_void,
            )
        };

        if status != NO_ERROR {
            // Not registered, so CoreAudio holds no reference to the context.
            unsafe { drop(Box::from_raw(context)) };
            return Err(AudioError::ListenerFailed {
                selector,
                reason: format!("OS status {}", status),
            });
        }

        Ok(())
    }
}
