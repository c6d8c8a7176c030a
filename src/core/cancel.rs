use tokio_util::sync;

use crate::error::{Error, Result};

/// Cooperative cancellation shared between a requester and a running level
/// computation. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: sync::CancellationToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// `Err(Error::Cancelled)` once `cancel` has been called
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
