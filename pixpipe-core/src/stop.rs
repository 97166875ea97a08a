//! Cooperative shutdown for long-running loops.
//!
//! Services hold an `Arc<AtomicBool>` that is `true` while they run.
//! Any task can clear it; loops race their I/O against
//! [`wait_for_stop`] inside `tokio::select!`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the flag is polled.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves once `running` becomes false.
pub async fn wait_for_stop(running: &AtomicBool) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
