//! Error handling for the long-polling update listener

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use teloxide::error_handlers::ErrorHandler;
use teloxide::{ApiError, RequestError};
use tracing::{error, warn};

/// Logs listener errors; backs off when another instance polls the same bot
pub struct PollingErrorHandler {
    conflict_backoff: Duration,
}

impl PollingErrorHandler {
    /// Handler that sleeps `conflict_backoff` after a polling conflict
    #[must_use]
    pub fn new(conflict_backoff: Duration) -> Arc<Self> {
        Arc::new(Self { conflict_backoff })
    }
}

/// True when Telegram reports a concurrent `getUpdates` consumer
#[must_use]
pub const fn is_polling_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}

impl ErrorHandler<RequestError> for PollingErrorHandler {
    fn handle_error(self: Arc<Self>, error: RequestError) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if is_polling_conflict(&error) {
                warn!(
                    backoff_secs = self.conflict_backoff.as_secs(),
                    "Another bot instance is polling; backing off"
                );
                tokio::time::sleep(self.conflict_backoff).await;
            } else {
                error!(error = %error, "Update listener error");
            }
        })
    }
}
