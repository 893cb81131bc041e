//! Startup and shutdown of the normalizer
//!
//! Registers the normalizer with an event tap and keeps it installed
//! until shutdown is requested. Registration failure is fatal: nothing
//! is handled and the error is returned to the caller.

use std::future::Future;

use tracing::{error, info};

use crate::normalizer::Normalizer;
use crate::tap::{EventTap, TapError};

/// Install `normalizer` on `tap` and run until `shutdown` completes
pub async fn run<T, F>(tap: &mut T, normalizer: Normalizer, shutdown: F) -> Result<(), TapError>
where
    T: EventTap,
    F: Future<Output = ()>,
{
    if let Err(e) = tap.start(normalizer) {
        error!(?e, "failed to start event tap");
        return Err(e);
    }
    info!("modifier keys are now shared across keyboards");

    shutdown.await;
    info!(tap_running = tap.is_running(), "shutdown requested");

    tap.stop();
    Ok(())
}
