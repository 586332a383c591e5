//! Cancellation scopes built on [`CancellationToken`].
//!
//! A scope is just a token. Deadlines are child tokens cancelled by a timer,
//! so cancelling a parent always reaches every scope derived from it.
use std::future::Future;
use std::ops::Deref;
use std::time::Duration;

use thiserror::Error;
use tokio::time;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a bounded future did not produce its output.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("cancelled")]
    Cancelled,
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),
}

/// A child scope that is cancelled once its deadline passes.
///
/// Dropping it cancels the scope, which also ends the timer task.
#[derive(Debug)]
pub struct Deadline {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Deadline {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Deref for Deadline {
    type Target = CancellationToken;

    fn deref(&self) -> &CancellationToken {
        &self.token
    }
}

/// Derive a child of `parent` that is also cancelled once `after` elapses.
///
/// Must be called from within a tokio runtime.
pub fn with_deadline(parent: &CancellationToken, after: Duration) -> Deadline {
    let child = parent.child_token();
    let timer = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = time::sleep(after) => timer.cancel(),
        }
    });
    Deadline {
        _guard: child.clone().drop_guard(),
        token: child,
    }
}

/// Run `fut` until it completes, `limit` elapses, or `cancel` fires.
///
/// Cancellation wins ties so a cancelled scope never starts new I/O.
pub async fn bounded<F>(
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = time::timeout(limit, fut) => res.map_err(|_| Interrupted::TimedOut(limit)),
    }
}

/// Cancel `token` when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });
}
