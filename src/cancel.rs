//! Ctrl+C handling for the posting loop.
//!
//! Cancellation is cooperative: the flag is checked between generation
//! attempts and between pacing slices, never in the middle of a request.

use std::sync::atomic::{AtomicBool, Ordering};

static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Check if cancellation has been requested.
pub fn is_cancelled() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

/// Request cancellation without a signal.
pub fn request() {
    CANCELLED.store(true, Ordering::SeqCst);
}

/// Clear the flag before starting a new session.
pub fn reset() {
    CANCELLED.store(false, Ordering::SeqCst);
}

/// Install the Ctrl+C handler. Safe to call more than once.
pub fn register_handler() {
    if let Err(e) = ctrlc::set_handler(request) {
        log::debug!("Ctrl+C handler not installed: {}", e);
    }
}
