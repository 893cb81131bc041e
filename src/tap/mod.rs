//! Low-level input interception
//!
//! An `EventTap` registers for flags-changed and key press/release events
//! and feeds them, one at a time, through an `EventHandler` on a dedicated
//! thread. On macOS this is a Quartz CGEventTap; other platforms have no
//! equivalent and refuse to start.

#[cfg(target_os = "macos")]
mod quartz;
#[cfg(not(target_os = "macos"))]
mod unsupported;

#[cfg(target_os = "macos")]
pub use quartz::QuartzEventTap as PlatformTap;
#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedTap as PlatformTap;

use crate::normalizer::EventHandler;

/// OS facility that delivers input events to a handler
pub trait EventTap {
    /// Register for events and start delivering them to `handler`
    ///
    /// Returns once registration has either succeeded or failed. The
    /// handler is moved onto the delivery thread and never shared.
    fn start<H>(&mut self, handler: H) -> Result<(), TapError>
    where
        H: EventHandler + Send + 'static;

    /// Stop delivering events
    fn stop(&mut self);

    /// Check if the tap is currently delivering events
    fn is_running(&self) -> bool;
}

/// Errors that can occur while setting up the event tap
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("event tap is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    Registration,

    #[error("failed to spawn event tap thread: {0}")]
    ThreadSpawn(String),

    #[error("event tap thread exited before registration completed")]
    ListenerExited,

    #[error("event taps are only supported on macOS")]
    Unsupported,
}
