//! Simulated latency for engine responses.
//!
//! The delay counts from the moment the upstream computation produced its
//! value, and applies equally to success and error outcomes. A zero delay
//! passes the computation through with no timer at all. Dropping the
//! returned future before the delay elapses cancels the pending timer, so no
//! deferred delivery can occur.

use std::future::Future;
use std::time::Duration;

/// Wrap a response-producing computation so its outcome is delivered only
/// after `delay` has elapsed from the moment it was produced.
pub async fn with_delay<T>(delay: Duration, fut: impl Future<Output = T>) -> T {
    let value = fut.await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    value
}
