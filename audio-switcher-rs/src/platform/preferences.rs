//! User preferences persisted to a JSON file.
//!
//! The file is treated as a key-value store: the hidden device list lives
//! under one key and any other keys are carried through untouched.

use serde_json::{Map, Value};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable overriding the preferences directory.
pub const CONFIG_DIR_ENV: &str = "AUDIO_SWITCHER_CONFIG_DIR";

const APP_DIR: &str = "audio-switcher";
const FILE_NAME: &str = "preferences.json";

/// Preferences service error types.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("No configuration directory available")]
    NoConfigDirectory,

    #[error("Failed to read preferences from {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write preferences to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid preferences file {path}: {source}")]
    InvalidValue {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable home of the hidden device names.
pub trait HiddenSetStore: Send {
    fn load_hidden_names(&self) -> Result<Vec<String>, PreferencesError>;

    fn save_hidden_names(&self, names: &[String]) -> Result<(), PreferencesError>;
}

/// Location of the preferences file: `$AUDIO_SWITCHER_CONFIG_DIR` if set,
/// otherwise `<user config dir>/audio-switcher`.
pub fn default_preferences_path() -> Result<PathBuf, PreferencesError> {
    let dir = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir()
            .ok_or(PreferencesError::NoConfigDirectory)?
            .join(APP_DIR),
    };
    Ok(dir.join(FILE_NAME))
}

const HIDDEN_DEVICES_KEY: &str = "HiddenDevices";

/// JSON file backed preferences.
#[derive(Debug, Clone)]
pub struct JsonPreferences {
    path: PathBuf,
}

impl JsonPreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Preferences at [`default_preferences_path`].
    pub fn open_default() -> Result<Self, PreferencesError> {
        Ok(Self::new(default_preferences_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn invalid(&self, source: serde_json::Error) -> PreferencesError {
        PreferencesError::InvalidValue {
            path: self.path.clone(),
            source,
        }
    }

    /// Whole file as a JSON object. A missing file is an empty object.
    fn read(&self) -> Result<Map<String, Value>, PreferencesError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No preferences at {}", self.path.display());
                return Ok(Map::new());
            }
            Err(source) => {
                return Err(PreferencesError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&data).map_err(|source| self.invalid(source))
    }

    fn write(&self, file: &Map<String, Value>) -> Result<(), PreferencesError> {
        let write_failed = |source: io::Error| PreferencesError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let data = serde_json::to_string_pretty(file).map_err(|e| write_failed(e.into()))?;

        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(write_failed)?;
        std::fs::rename(&tmp, &self.path).map_err(write_failed)?;
        Ok(())
    }
}

impl HiddenSetStore for JsonPreferences {
    fn load_hidden_names(&self) -> Result<Vec<String>, PreferencesError> {
        match self.read()?.remove(HIDDEN_DEVICES_KEY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|source| self.invalid(source)),
        }
    }

    fn save_hidden_names(&self, names: &[String]) -> Result<(), PreferencesError> {
        let mut file = match self.read() {
            Ok(file) => file,
            Err(PreferencesError::InvalidValue { source, .. }) => {
                warn!(
                    "Replacing unparseable preferences at {}: {}",
                    self.path.display(),
                    source
                );
                Map::new()
            }
            Err(e) => return Err(e),
        };

        let names = names.iter().cloned().map(Value::String).collect();
        file.insert(HIDDEN_DEVICES_KEY.to_string(), Value::Array(names));
        self.write(&file)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    names: Vec<String>,
    fail_saves: bool,
}

/// In-process store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names(names: &[&str]) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.names = names.iter().map(|s| s.to_string()).collect();
        }
        store
    }

    /// Last saved names.
    pub fn saved(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.names.clone())
            .unwrap_or_default()
    }

    /// Make subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_saves = fail;
        }
    }
}

impl HiddenSetStore for MemoryStore {
    fn load_hidden_names(&self) -> Result<Vec<String>, PreferencesError> {
        Ok(self.saved())
    }

    fn save_hidden_names(&self, names: &[String]) -> Result<(), PreferencesError> {
        let mut state = self.state.lock().map_err(|_| PreferencesError::WriteFailed {
            path: PathBuf::from("<memory>"),
            source: io::Error::new(io::ErrorKind::Other, "store lock poisoned"),
        })?;

        if state.fail_saves {
            return Err(PreferencesError::WriteFailed {
                path: PathBuf::from("<memory>"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "saves disabled"),
            });
        }

        state.names = names.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = JsonPreferences::new(dir.path().join("preferences.json"));
        assert!(prefs.load_hidden_names().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = JsonPreferences::new(dir.path().join("nested").join("preferences.json"));

        prefs
            .save_hidden_names(&["HDMI".to_string(), "USB DAC".to_string()])
            .unwrap();

        assert_eq!(
            prefs.load_hidden_names().unwrap(),
            vec!["HDMI".to_string(), "USB DAC".to_string()]
        );
    }

    #[test]
    fn test_other_keys_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"HiddenDevices": [], "Theme": "dark"}"#).unwrap();

        let prefs = JsonPreferences::new(&path);
        prefs.save_hidden_names(&["HDMI".to_string()]).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Theme"], "dark");
        assert_eq!(raw["HiddenDevices"][0], "HDMI");
    }

    #[test]
    fn test_corrupt_file_is_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "not json").unwrap();

        let prefs = JsonPreferences::new(&path);
        assert!(matches!(
            prefs.load_hidden_names(),
            Err(PreferencesError::InvalidValue { .. })
        ));

        // Saving recovers the file.
        prefs.save_hidden_names(&["HDMI".to_string()]).unwrap();
        assert_eq!(prefs.load_hidden_names().unwrap(), vec!["HDMI".to_string()]);
    }

    #[test]
    fn test_mistyped_hidden_list_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(
            &path,
            r#"{"HiddenDevices": {"HDMI": true}, "Theme": "dark", "Volume": 3}"#,
        )
        .unwrap();

        let prefs = JsonPreferences::new(&path);
        assert!(matches!(
            prefs.load_hidden_names(),
            Err(PreferencesError::InvalidValue { .. })
        ));

        prefs.save_hidden_names(&["HDMI".to_string()]).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Theme"], "dark");
        assert_eq!(raw["Volume"], 3);
        assert_eq!(prefs.load_hidden_names().unwrap(), vec!["HDMI".to_string()]);
    }

    #[test]
    fn test_null_hidden_list_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"HiddenDevices": null, "Theme": "dark"}"#).unwrap();

        let prefs = JsonPreferences::new(&path);
        assert!(prefs.load_hidden_names().unwrap().is_empty());

        prefs.save_hidden_names(&["HDMI".to_string()]).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Theme"], "dark");
    }

    #[test]
    fn test_unreadable_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text.
        let path = dir.path().join("preferences.json");
        std::fs::create_dir(&path).unwrap();

        let prefs = JsonPreferences::new(&path);
        assert!(matches!(
            prefs.save_hidden_names(&["HDMI".to_string()]),
            Err(PreferencesError::ReadFailed { .. })
        ));
        assert!(path.is_dir());
    }

    #[test]
    fn test_memory_store_shares_state() {
        let store = MemoryStore::with_names(&["HDMI"]);
        let clone = store.clone();
        clone.save_hidden_names(&["Aux".to_string()]).unwrap();
        assert_eq!(store.load_hidden_names().unwrap(), vec!["Aux".to_string()]);
    }
}
