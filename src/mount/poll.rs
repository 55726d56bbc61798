//! Poll-until-condition primitive.
//!
//! Both long waits of the control flow, position-reached and track
//! completion, are the same loop: probe a predicate, sleep a fixed
//! interval, give up after a bounded number of attempts. Cancellation is
//! cooperative: every probe and every sleep is an await point, so dropping
//! the future aborts the wait cleanly.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::{Error, Result};

/// Poll `probe` every `interval` until it returns `true`.
///
/// The first probe happens immediately, so a condition that already holds
/// completes after exactly one poll and zero sleeps. Returns the number of
/// polls taken, or [`Error::Timeout`] once `max_attempts` probes have all
/// come back `false`. Probe errors propagate as-is.
pub async fn poll_until<F>(
    mut probe: F,
    interval: Duration,
    max_attempts: u32,
    what: &str,
) -> Result<u32>
where
    F: FnMut() -> BoxFuture<'static, Result<bool>>,
{
    if max_attempts == 0 {
        return Err(Error::Timeout(format!("{what}: no poll attempts allowed")));
    }
    for attempt in 1..=max_attempts {
        if probe().await? {
            return Ok(attempt);
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(Error::Timeout(format!(
        "{what}: condition not met after {max_attempts} polls"
    )))
}
