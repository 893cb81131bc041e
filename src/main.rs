//! cross-keyboard-modifiers: share modifier keys across keyboards on macOS
//!
//! macOS tracks modifier state per keyboard, so holding Control on one
//! keyboard and pressing C on another does not produce Ctrl+C. This
//! utility installs a CGEventTap that remembers the modifiers reported by
//! every flags-changed event and stamps them onto each key press and
//! release, whichever keyboard it came from.
//!
//! Creating the tap requires root or the Accessibility permission
//! (System Settings > Privacy & Security > Accessibility). If it cannot
//! be created the process prints the error and exits with status 1.

mod app;
mod config;
mod lifecycle;
mod modifiers;
mod normalizer;
mod tap;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::lifecycle::ShutdownSignal;
use crate::normalizer::Normalizer;
use crate::tap::PlatformTap;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "cross-keyboard-modifiers starting"
    );

    let config = Config::load()?;
    info!(
        tracked_modifiers = config.tracked_modifiers,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "configuration loaded"
    );

    let normalizer = Normalizer::with_tracked(config.tracked_modifiers);
    let mut tap = PlatformTap::new(config.poll_interval);
    let shutdown = ShutdownSignal::new();

    app::run(&mut tap, normalizer, shutdown.wait())
        .await
        .context("failed to create event tap")?;

    info!("cross-keyboard-modifiers stopped");

    Ok(())
}
