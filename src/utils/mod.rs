//! Shared helpers: logging setup, wall-clock access, cancellation.

use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized.");
    Ok(())
}

/// Current wall-clock time in epoch milliseconds, the unit used by cache
/// entries and activity events throughout.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Cooperative cancellation flag shared between a caller and its in-flight
/// network operations.
///
/// Cancelling suppresses retry and error reporting for the calls holding this
/// token; it does not tear down in-flight work shared with other callers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_propagates_to_clones() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }
}
