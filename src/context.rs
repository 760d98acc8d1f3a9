// SPDX-License-Identifier: Apache-2.0

//! Cancellation and deadline propagation.
//!
//! Every operation that issues SQL takes a [`Context`]. The token is honored
//! at statement boundaries: a migration stops before the next statement, a
//! transaction fails its next statement and rolls back. Compilation never
//! consults the context.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Carries a cancellation token and an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that expires at `deadline`.
    ///
    /// If the parent already has an earlier deadline, the earlier one wins.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child context cancelled together with its parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Requests cancellation of this context and all children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time left until the deadline, if one is set.
    ///
    /// Returns a zero duration when the deadline has already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns an error if the context is cancelled or past its deadline.
    ///
    /// Called at every statement boundary.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_context_passes() {
        assert!(Context::background().check().is_ok());
    }

    #[test]
    fn cancelled_context_fails() {
        let ctx = Context::background();
        ctx.cancel();
        assert!(matches!(ctx.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn child_inherits_cancellation() {
        let parent = Context::background();
        let child = parent.child();
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn expired_deadline_fails() {
        let ctx = Context::background().with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn earlier_parent_deadline_wins() {
        let near = Instant::now() - Duration::from_secs(1);
        let far = Instant::now() + Duration::from_secs(3600);
        let ctx = Context::background()
            .with_deadline(near)
            .with_deadline(far);
        assert!(matches!(ctx.check(), Err(Error::DeadlineExceeded)));
    }
}
