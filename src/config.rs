//! Runtime configuration
//!
//! The utility takes no arguments or environment settings, so the
//! configuration is fixed at build time.

use std::time::Duration;

use anyhow::{ensure, Result};

use crate::modifiers::flags;

/// Utility configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Modifier bits shared across keyboards
    pub tracked_modifiers: u64,

    /// How long the tap's run loop runs before checking for shutdown
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracked_modifiers: flags::ALL_MODIFIERS,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Load the built-in configuration
    pub fn load() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.tracked_modifiers != 0,
            "at least one modifier must be tracked"
        );
        ensure!(
            self.tracked_modifiers & !flags::ALL_MODIFIERS == 0,
            "tracked modifiers {:#x} include non-modifier bits",
            self.tracked_modifiers
        );
        ensure!(!self.poll_interval.is_zero(), "poll interval must be non-zero");
        Ok(())
    }
}
