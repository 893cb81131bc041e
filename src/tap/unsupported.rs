//! Fallback for platforms without a Quartz event tap

use std::time::Duration;

use tracing::error;

use super::{EventTap, TapError};
use crate::normalizer::EventHandler;

/// Event tap that can never be registered
#[derive(Debug, Default)]
pub struct UnsupportedTap;

impl UnsupportedTap {
    pub fn new(_poll_interval: Duration) -> Self {
        Self
    }
}

impl EventTap for UnsupportedTap {
    fn start<H>(&mut self, _handler: H) -> Result<(), TapError>
    where
        H: EventHandler + Send + 'static,
    {
        error!("no low-level input interception facility on this platform");
        Err(TapError::Unsupported)
    }

    fn stop(&mut self) {}

    fn is_running(&self) -> bool {
        false
    }
}
