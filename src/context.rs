//! Request-scoped context passed explicitly to every I/O call
//!
//! Carries the correlation id used in log spans and the cancellation signal
//! observed by the transport's retry loop and the store.

use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: String,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// New context with a random correlation id
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4().to_string())
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the cancellation signal (e.g. with a child of a shutdown token)
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Same correlation id, fresh cancellation signal.
    ///
    /// Used for compensating sends, which must run even if the caller gave up.
    pub fn detached(&self) -> Self {
        Self::with_correlation_id(self.correlation_id.clone())
    }

    pub fn span(&self, operation: &'static str) -> Span {
        tracing::info_span!("request", operation, correlation_id = %self.correlation_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_keeps_id_but_not_cancellation() {
        let ctx = RequestContext::with_correlation_id("abc-123");
        ctx.cancellation().cancel();

        let detached = ctx.detached();
        assert!(ctx.is_cancelled());
        assert!(!detached.is_cancelled());
        assert_eq!(detached.correlation_id(), "abc-123");
    }

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(
            RequestContext::new().correlation_id(),
            RequestContext::new().correlation_id()
        );
    }
}
