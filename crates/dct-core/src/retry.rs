//! Fixed-interval retry under a wall-clock budget

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline used when `start + budget` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Why [`poll_until`] gave up
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub elapsed: Duration,
    /// Error of the last attempt that completed, if any did
    pub last_error: Option<E>,
}

/// Run `op` every `interval` until it succeeds or `budget` has elapsed.
///
/// At least one attempt is made. An attempt still running when the budget
/// runs out is cancelled, so the call never outlives the budget. A budget
/// too large to add to the current instant is capped at 30 years.
pub async fn poll_until<T, E, F, Fut>(
    budget: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let deadline = start
        .checked_add(budget)
        .unwrap_or_else(|| start + FAR_FUTURE);
    let mut attempts = 0;
    let mut last_error = None;

    loop {
        attempts += 1;
        match tokio::time::timeout_at(deadline, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_error = Some(e),
            Err(_) => break,
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let wake = now.checked_add(interval).map_or(deadline, |t| t.min(deadline));
        tokio::time::sleep_until(wake).await;
        if Instant::now() >= deadline {
            break;
        }
    }

    Err(RetryExhausted {
        attempts,
        elapsed: start.elapsed(),
        last_error,
    })
}
