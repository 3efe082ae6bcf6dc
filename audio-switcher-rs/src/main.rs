use anyhow::{Context, Result};
use audio_switcher_rs::platform::{JsonPreferences, LoginItem};
use audio_switcher_rs::{audio, init_logging, AppState, DeviceDirectory, HiddenSet};
use tracing::{info, warn};

fn main() -> Result<()> {
    init_logging("info");

    let system = audio::system_backend().context("Audio backend unavailable")?;
    let directory = DeviceDirectory::new(system);

    let preferences =
        JsonPreferences::open_default().context("Could not locate the preferences file")?;
    info!("Preferences at {}", preferences.path().display());
    let hidden = HiddenSet::load(Box::new(preferences));

    let login_item = match LoginItem::for_current_user() {
        Ok(item) => Some(item),
        Err(e) => {
            warn!("Launch at login unavailable: {}", e);
            None
        }
    };

    let app = AppState::new(directory, hidden, login_item);
    run(app)
}

#[cfg(target_os = "macos")]
fn run(app: AppState) -> Result<()> {
    audio_switcher_rs::ui::run_event_loop(app).context("Menu bar event loop failed")?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run(_app: AppState) -> Result<()> {
    anyhow::bail!("The menu bar shell is only available on macOS")
}
