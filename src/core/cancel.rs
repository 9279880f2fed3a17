//! Cancellation helper for outbound calls.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Runs `fut` unless `token` fires first.
///
/// An already-cancelled token wins without polling `fut`.
pub async fn run_cancellable<F>(token: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    if token.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}
