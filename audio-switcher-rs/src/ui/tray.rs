#![cfg(target_os = "macos")]

//! System tray icon management.
//!
//! Renders a [`MenuModel`] into the menu bar and runs the main-thread event
//! loop. CoreAudio delivers change notifications on its own threads; they are
//! posted to the loop through an event-loop proxy so every refresh, and every
//! menu click, is handled one at a time on the main thread.

use super::menu::{MenuCommand, MenuEntry, MenuModel};
use crate::app::AppState;
use crate::platform::icons;
use std::sync::{Arc, Mutex};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
use thiserror::Error;
use tracing::{debug, error, warn};
use tray_icon::menu::{
    CheckMenuItem, IsMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu,
};
use tray_icon::{TrayIcon, TrayIconBuilder};

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to load icon resource: {0}")]
    IconLoadFailed(String),

    #[error("Tray icon not initialized")]
    NotInitialized,

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

/// Events posted to the main-thread loop.
#[derive(Debug)]
pub enum UserEvent {
    /// The audio device directory changed
    DirectoryChanged,

    /// A menu entry was clicked
    Menu(MenuEvent),
}

/// System tray manager.
#[derive(Default)]
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    model: MenuModel,
}

impl TrayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and show the tray icon. Must run after the event loop started.
    pub fn create(&mut self, model: MenuModel, tooltip: &str) -> Result<(), TrayError> {
        let icon = icons::create_speaker_icon().map_err(TrayError::IconLoadFailed)?;
        let menu = render(&model)?;

        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_icon_as_template(true)
            .with_tooltip(tooltip)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        self.tray_icon = Some(tray_icon);
        self.model = model;
        Ok(())
    }

    /// Replace the menu and tooltip.
    pub fn update(&mut self, model: MenuModel, tooltip: &str) -> Result<(), TrayError> {
        let menu = render(&model)?;
        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_menu(Some(Box::new(menu)));
        tray.set_tooltip(Some(tooltip))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        self.model = model;
        Ok(())
    }

    /// Map a clicked menu entry back to its command in the current model.
    ///
    /// The click may come from a menu rendered before the last refresh; its
    /// target is then looked up afresh and `None` means it has gone away.
    pub fn resolve(&self, event: &MenuEvent) -> Option<MenuCommand> {
        self.model.command(event.id.0.as_str()).cloned()
    }

    /// Destroy the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
    }
}

trait AppendItem {
    fn append_item(&self, item: &dyn IsMenuItem) -> Result<(), tray_icon::menu::Error>;
}

impl AppendItem for Menu {
    fn append_item(&self, item: &dyn IsMenuItem) -> Result<(), tray_icon::menu::Error> {
        self.append(item)
    }
}

impl AppendItem for Submenu {
    fn append_item(&self, item: &dyn IsMenuItem) -> Result<(), tray_icon::menu::Error> {
        self.append(item)
    }
}

fn render(model: &MenuModel) -> Result<Menu, TrayError> {
    let menu = Menu::new();
    append_entries(&menu, model.entries())?;
    Ok(menu)
}

fn append_entries(target: &dyn AppendItem, entries: &[MenuEntry]) -> Result<(), TrayError> {
    let menu_failed = |e: tray_icon::menu::Error| TrayError::MenuFailed(e.to_string());

    for entry in entries {
        match entry {
            MenuEntry::Header(title) => {
                target
                    .append_item(&MenuItem::new(title, false, None))
                    .map_err(menu_failed)?;
            }
            MenuEntry::Item { id, label, checked } => {
                let item =
                    CheckMenuItem::with_id(MenuId::new(id), label, true, *checked, None);
                target.append_item(&item).map_err(menu_failed)?;
            }
            MenuEntry::Separator => {
                target
                    .append_item(&PredefinedMenuItem::separator())
                    .map_err(menu_failed)?;
            }
            MenuEntry::Submenu { label, entries } => {
                let submenu = Submenu::new(label, true);
                append_entries(&submenu, entries)?;
                target.append_item(&submenu).map_err(menu_failed)?;
            }
        }
    }

    Ok(())
}

fn refresh(app: &AppState, tray: &mut TrayManager) {
    if let Err(e) = tray.update(app.build_menu(), &app.tooltip()) {
        warn!("Failed to refresh menu: {}", e);
    }
}

/// Run the menu bar application until Quit is chosen.
pub fn run_event_loop(mut app: AppState) -> Result<(), TrayError> {
    let mut event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    // Menu bar only, no Dock icon.
    event_loop.set_activation_policy(ActivationPolicy::Accessory);

    let proxy = Arc::new(Mutex::new(event_loop.create_proxy()));

    let menu_proxy = proxy.clone();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if let Ok(proxy) = menu_proxy.lock() {
            let _ = proxy.send_event(UserEvent::Menu(event));
        }
    }));

    let mut tray = TrayManager::new();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(StartCause::Init) => {
                if let Err(e) = tray.create(app.build_menu(), &app.tooltip()) {
                    error!("Failed to create tray icon: {}", e);
                    *control_flow = ControlFlow::Exit;
                    return;
                }

                let change_proxy = proxy.clone();
                let outcome = app.directory().subscribe_to_changes(move || {
                    if let Ok(proxy) = change_proxy.lock() {
                        let _ = proxy.send_event(UserEvent::DirectoryChanged);
                    }
                });
                debug!("Change subscription: {:?}", outcome);
            }
            Event::UserEvent(UserEvent::DirectoryChanged) => {
                refresh(&app, &mut tray);
            }
            Event::UserEvent(UserEvent::Menu(event)) => {
                match tray.resolve(&event) {
                    Some(command) => app.handle_command(&command),
                    None => debug!("Ignoring unknown menu entry {:?}", event.id),
                }

                if app.should_exit {
                    tray.destroy();
                    *control_flow = ControlFlow::Exit;
                } else {
                    refresh(&app, &mut tray);
                }
            }
            _ => {}
        }
    })
}
