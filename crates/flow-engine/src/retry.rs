//! Fixed-backoff retry for the one call the spec calls out as needing it:
//! cloud operator creation (spec.md §4.1 step 8).

use std::future::Future;
use std::time::Duration;

use flow_core::EngineResult;

const MAX_ATTEMPTS: u32 = 6;
const DELAY: Duration = Duration::from_secs(10);

/// Retry `op` up to [`MAX_ATTEMPTS`] times with a fixed delay between
/// attempts, returning the last error if every attempt fails.
pub async fn retry_fixed_backoff<F, Fut>(mut op: F) -> EngineResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<()>>,
{
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(attempt, max_attempts = MAX_ATTEMPTS, error = %err, "operator creation attempt failed");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(DELAY).await;
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
