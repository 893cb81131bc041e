//! Quartz event tap using macOS CGEventTap
//!
//! Intercepts flags-changed and key press/release events at the session
//! level and lets the handler rewrite their flags before applications see
//! them. Runs on a dedicated thread with its own CFRunLoop.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use tracing::{error, info, warn};

use super::{EventTap, TapError};
use crate::normalizer::{EventHandler, EventKind, InputEvent, Normalizer};

/// Event tap backed by the Quartz event services
pub struct QuartzEventTap {
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    thread: Option<JoinHandle<()>>,
}

impl QuartzEventTap {
    /// Create a tap that checks for shutdown every `poll_interval`
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            poll_interval,
            thread: None,
        }
    }
}

impl EventTap for QuartzEventTap {
    /// Spawns the tap thread and waits for it to report whether the
    /// CGEventTap could be created.
    fn start<H>(&mut self, handler: H) -> Result<(), TapError>
    where
        H: EventHandler + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(TapError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        let spawned = thread::Builder::new()
            .name("event-tap".to_string())
            .spawn(move || {
                info!("event tap thread started");
                run_event_loop(handler, &running, poll_interval, ready_tx);
                running.store(false, Ordering::SeqCst);
                info!("event tap thread stopped");
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(TapError::ThreadSpawn(e.to_string()));
            }
        };

        let result = ready_rx.recv().unwrap_or(Err(TapError::ListenerExited));
        if result.is_ok() {
            self.thread = Some(thread);
        } else if thread.join().is_err() {
            error!("event tap thread panicked");
        }
        result
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // The run loop returns within one poll interval
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("event tap thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for QuartzEventTap {
    fn drop(&mut self) {
        self.stop();
    }
}

fn event_kind(event_type: CGEventType) -> EventKind {
    match event_type {
        CGEventType::FlagsChanged => EventKind::FlagsChanged,
        CGEventType::KeyDown => EventKind::KeyDown,
        CGEventType::KeyUp => EventKind::KeyUp,
        _ => EventKind::Other,
    }
}

fn event_types() -> Vec<CGEventType> {
    Normalizer::EVENT_KINDS
        .iter()
        .filter_map(|kind| match kind {
            EventKind::FlagsChanged => Some(CGEventType::FlagsChanged),
            EventKind::KeyDown => Some(CGEventType::KeyDown),
            EventKind::KeyUp => Some(CGEventType::KeyUp),
            EventKind::Other => None,
        })
        .collect()
}

/// Create the tap and run its CFRunLoop until `running` is cleared
///
/// The registration outcome is sent on `ready` exactly once.
fn run_event_loop<H: EventHandler>(
    handler: H,
    running: &AtomicBool,
    poll_interval: Duration,
    ready: mpsc::Sender<Result<(), TapError>>,
) {
    let handler = RefCell::new(handler);
    // Set by the callback when macOS turns the tap off
    let disabled = Cell::new(false);

    // CGEventTap callback - must be fast and non-blocking
    let callback = |_proxy: CGEventTapProxy,
                    event_type: CGEventType,
                    event: &CGEvent|
     -> Option<CGEvent> {
        if matches!(
            event_type,
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
        ) {
            disabled.set(true);
            return Some(event.clone());
        }

        let reported = event.get_flags().bits();
        let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
        let out = handler
            .borrow_mut()
            .handle(InputEvent::new(event_kind(event_type), key_code, reported));

        if out.flags != reported {
            // Device-dependent bits have no named flag, so keep them as raw bits
            let flags = unsafe { CGEventFlags::from_bits_unchecked(out.flags) };
            event.set_flags(flags);
        }
        Some(event.clone())
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        event_types(),
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready.send(Err(TapError::Registration));
            return;
        }
    };

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            error!("failed to create run loop source for event tap");
            let _ = ready.send(Err(TapError::Registration));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }
    tap.enable();

    info!("event tap created and enabled");
    if ready.send(Ok(())).is_err() {
        warn!("event tap owner went away before startup completed");
        return;
    }

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, poll_interval, true);
        }

        if disabled.replace(false) {
            warn!("event tap disabled by macOS, re-enabling");
            tap.enable();
        }
    }

    // Tap and source are released when they go out of scope
}
