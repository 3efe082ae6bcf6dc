//! Change notification bridge.
//!
//! Subscribes once to the three hardware change classes (device list,
//! default output, default input) and maps all of them onto a single
//! payload-free "directory changed" callback. Events are neither coalesced
//! nor reordered: a burst from one unplug produces one callback per event,
//! and the consumer is expected to re-query both directions each time.

use super::device::{AudioError, ChangeSelector};
use super::system::{AudioSystem, ChangeListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Marker event sent through a change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryChanged;

/// Result of [`ChangeBridge::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// An earlier call already registered; nothing was done.
    AlreadyRegistered,

    /// Listeners were registered. `failed` holds the classes the OS refused;
    /// those changes will not trigger a refresh.
    Registered { failed: Vec<AudioError> },
}

impl StartOutcome {
    /// True unless this call registered and at least one class was refused.
    pub fn is_complete(&self) -> bool {
        match self {
            StartOutcome::AlreadyRegistered => true,
            StartOutcome::Registered { failed } => failed.is_empty(),
        }
    }
}

/// Two-state registration guard: `Unregistered` until the first `start`,
/// then `Registered` for the rest of the process.
#[derive(Debug, Default)]
pub struct ChangeBridge {
    registered: AtomicBool,
}

impl ChangeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Subscribe `on_change` to every [`ChangeSelector`].
    ///
    /// The registered flag is checked and set atomically, so concurrent or
    /// repeated calls register exactly one listener set. A refused
    /// subscription is logged and reported, never fatal; the bridge stays
    /// registered either way.
    pub fn start<F>(&self, system: &dyn AudioSystem, on_change: F) -> StartOutcome
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self
            .registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Change listeners already registered");
            return StartOutcome::AlreadyRegistered;
        }

        let on_change = Arc::new(on_change);
        let mut failed = Vec::new();

        for selector in ChangeSelector::ALL {
            let callback = on_change.clone();
            let listener: ChangeListener = Arc::new(move |changed| {
                debug!("Audio hardware change: {}", changed);
                callback();
            });

            if let Err(e) = system.add_listener(selector, listener) {
                warn!("Failed to add listener for {}: {}", selector, e);
                failed.push(e);
            }
        }

        if failed.is_empty() {
            info!("Listening for audio device changes");
        } else {
            warn!(
                "{} of {} change listeners unavailable; menu refreshes only on interaction",
                failed.len(),
                ChangeSelector::ALL.len()
            );
        }

        StartOutcome::Registered { failed }
    }
}

/// Creates a single-consumer channel for change events.
///
/// Pass the sender to [`forward_to`] and drain the receiver on the thread
/// that owns the UI; that thread then sees every change in delivery order.
pub fn create_event_channel() -> (Sender<DirectoryChanged>, Receiver<DirectoryChanged>) {
    channel()
}

/// Build an `on_change` callback that posts into a change channel.
pub fn forward_to(sender: Sender<DirectoryChanged>) -> impl Fn() + Send + Sync + 'static {
    move || {
        // The receiver is gone only during shutdown.
        let _ = sender.send(DirectoryChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::{DeviceId, Direction};
    use crate::audio::memory::{InMemoryAudioSystem, SimulatedDevice};
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = hits.clone();
        (hits, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_start_registers_all_classes() {
        let system = InMemoryAudioSystem::new();
        let bridge = ChangeBridge::new();
        let (_, on_change) = counter();

        let outcome = bridge.start(&system, on_change);

        assert_eq!(outcome, StartOutcome::Registered { failed: Vec::new() });
        assert!(bridge.is_registered());
        assert_eq!(system.listener_count(), 3);
    }

    #[test]
    fn test_second_start_is_noop() {
        let system = InMemoryAudioSystem::new();
        let bridge = ChangeBridge::new();
        let (hits, on_change) = counter();
        let (second_hits, second_change) = counter();

        bridge.start(&system, on_change);
        let outcome = bridge.start(&system, second_change);
        assert_eq!(outcome, StartOutcome::AlreadyRegistered);

        system.emit(ChangeSelector::DeviceList);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 0);
        assert_eq!(system.listener_count(), 3);
    }

    #[test]
    fn test_every_class_maps_to_callback() {
        let system = InMemoryAudioSystem::new();
        let bridge = ChangeBridge::new();
        let (hits, on_change) = counter();
        bridge.start(&system, on_change);

        for selector in ChangeSelector::ALL {
            system.emit(selector);
        }

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_bursts_are_not_coalesced() {
        let system = InMemoryAudioSystem::new();
        system.plug(SimulatedDevice::new(1, "HDMI", false, true));
        system.set_system_default(Direction::Output, Some(DeviceId(1)));

        let bridge = ChangeBridge::new();
        let (hits, on_change) = counter();
        bridge.start(&system, on_change);

        // Device list change followed by default output change.
        system.unplug(DeviceId(1));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refused_class_is_reported() {
        let system = InMemoryAudioSystem::new();
        system.refuse_listener(ChangeSelector::DefaultInput);
        let bridge = ChangeBridge::new();
        let (hits, on_change) = counter();

        let outcome = bridge.start(&system, on_change);

        assert!(!outcome.is_complete());
        assert!(bridge.is_registered());
        assert_eq!(system.listener_count(), 2);

        system.emit(ChangeSelector::DefaultOutput);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_start_registers_once() {
        let system = Arc::new(InMemoryAudioSystem::new());
        let bridge = Arc::new(ChangeBridge::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let system = system.clone();
                let bridge = bridge.clone();
                std::thread::spawn(move || bridge.start(system.as_ref(), || {}))
            })
            .collect();

        let registered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, StartOutcome::Registered { .. }))
            .count();

        assert_eq!(registered, 1);
        assert_eq!(system.listener_count(), 3);
    }

    #[test]
    fn test_channel_delivers_in_order() {
        let system = InMemoryAudioSystem::new();
        let bridge = ChangeBridge::new();
        let (sender, receiver) = create_event_channel();
        bridge.start(&system, forward_to(sender));

        system.emit(ChangeSelector::DefaultInput);
        system.emit(ChangeSelector::DeviceList);

        assert_eq!(receiver.try_iter().count(), 2);
    }
}
