use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::DomainError;

/// Cooperative cancellation signal for long-running operations
/// (`full_refresh`, `update`, search) per §5 "Cancellation". Workers check
/// the token between files/batches; nothing is preempted mid-item.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(DomainError::CancelRequested)` if cancellation has
    /// been requested, otherwise `Ok(())`.
    pub fn check(&self) -> Result<(), DomainError> {
        if self.is_cancelled() {
            Err(DomainError::CancelRequested)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(clone.check().is_err());
    }
}
