//! Waiting for the target process to appear.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::shutdown::ShutdownSignal;

/// Call `attempt` every `interval` until it stops reporting a missing process.
///
/// Any other error is returned as is. Returns `Ok(None)` on shutdown.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub fn wait_for_process<T, F>(
    name: &str,
    interval: Duration,
    shutdown: &ShutdownSignal,
    mut attempt: F,
) -> Result<Option<T>>
where
    F: FnMut() -> cvgo_core::Result<T>,
{
    let mut announced = false;

    loop {
        if shutdown.is_triggered() {
            return Ok(None);
        }

        match attempt() {
            Ok(value) => return Ok(Some(value)),
            Err(cvgo_core::Error::ProcessNotFound(_)) => {
                if !announced {
                    info!("Waiting for {}... (Ctrl+C to abort)", name);
                    announced = true;
                }
                debug!("{} not running, retrying in {}ms", name, interval.as_millis());
            }
            Err(e) => return Err(e.into()),
        }

        if shutdown.wait(interval) {
            return Ok(None);
        }
    }
}

/// Open the configured game process, waiting for it to start
#[cfg(target_os = "windows")]
pub fn wait_for_game(
    config: &cvgo_core::ProcessConfig,
    shutdown: &ShutdownSignal,
) -> Result<Option<cvgo_core::WindowsProcess>> {
    wait_for_process(
        &config.name,
        Duration::from_millis(config.poll_interval_ms),
        shutdown,
        || cvgo_core::WindowsProcess::find_and_open(&config.name),
    )
}
