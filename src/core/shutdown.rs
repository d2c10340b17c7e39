//! # OS signal handling.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes when the
//! process receives a termination signal. The binary turns it into a
//! cancellation of the supervisor's token.
//!
//! ## Signals
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal, often used for core dumps or hard stop)

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal registration fails.
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Cancels `token` on the first termination signal.
///
/// Must be called from within a tokio runtime. Registration failures cancel
/// nothing; the token can still be cancelled by other means.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await.is_ok() {
            token.cancel();
        }
    });
}
