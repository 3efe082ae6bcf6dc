//! Launch at login.
//!
//! Registers the current executable as a per-user LaunchAgent. The agent is
//! considered enabled exactly when its property list exists.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Login item error types.
#[derive(Debug, Error)]
pub enum LoginItemError {
    #[error("No home directory available")]
    NoHomeDirectory,

    #[error("Failed to locate the running executable: {0}")]
    ExecutablePath(#[source] io::Error),

    #[error("Failed to write launch agent {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove launch agent {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A LaunchAgent that starts `program` when the user logs in.
#[derive(Debug, Clone)]
pub struct LoginItem {
    label: String,
    agents_dir: PathBuf,
    program: PathBuf,
}

impl LoginItem {
    pub const DEFAULT_LABEL: &'static str = "io.github.audio-switcher";

    pub fn new(
        label: impl Into<String>,
        agents_dir: impl Into<PathBuf>,
        program: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            agents_dir: agents_dir.into(),
            program: program.into(),
        }
    }

    /// Agent for the running executable in `~/Library/LaunchAgents`.
    pub fn for_current_user() -> Result<Self, LoginItemError> {
        let home = dirs::home_dir().ok_or(LoginItemError::NoHomeDirectory)?;
        let program = std::env::current_exe().map_err(LoginItemError::ExecutablePath)?;
        Ok(Self::new(
            Self::DEFAULT_LABEL,
            home.join("Library").join("LaunchAgents"),
            program,
        ))
    }

    pub fn plist_path(&self) -> PathBuf {
        self.agents_dir.join(format!("{}.plist", self.label))
    }

    pub fn is_enabled(&self) -> bool {
        self.plist_path().is_file()
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), LoginItemError> {
        let path = self.plist_path();

        if enabled {
            let write_failed = |source: io::Error| LoginItemError::WriteFailed {
                path: path.clone(),
                source,
            };
            std::fs::create_dir_all(&self.agents_dir).map_err(write_failed)?;
            std::fs::write(&path, render_plist(&self.label, &self.program))
                .map_err(write_failed)?;
            info!("Enabled launch at login ({})", path.display());
        } else {
            match std::fs::remove_file(&path) {
                Ok(()) => info!("Disabled launch at login"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(LoginItemError::RemoveFailed { path, source }),
            }
        }

        Ok(())
    }

    /// Flip the current state. Returns whether launch at login is now on.
    pub fn toggle(&self) -> Result<bool, LoginItemError> {
        let enable = !self.is_enabled();
        self.set_enabled(enable)?;
        Ok(enable)
    }
}

fn render_plist(label: &str, program: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>ProcessType</key>
    <string>Interactive</string>
</dict>
</plist>
"#,
        escape_xml(label),
        escape_xml(&program.to_string_lossy())
    )
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
