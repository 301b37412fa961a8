//! Installs a signal handler which terminates the platform on CTRL+C or SIGHUP.
//!
//! Once the platform is terminated, the [Server](crate::server::Server) stops accepting new
//! requests, completes the pending ones and the event loop returns, so that the node exits.
use std::sync::Arc;

use tokio::signal::unix::SignalKind;

use crate::platform::Platform;
use crate::spawn;

/// Installs a signal handler for the given platform which awaits either a **CTRL+C** or **SIGHUP**.
///
/// Note that this is automatically called by the [Builder](crate::builder::Builder) unless it is
/// disabled.
pub fn install(platform: Arc<Platform>) {
    spawn!(async move {
        let mut sig_hup = match tokio::signal::unix::signal(SignalKind::hangup()) {
            Ok(signal) => signal,
            Err(error) => {
                log::error!("Cannot listen for SIGHUP: {}", error);
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Received CTRL-C. Shutting down...");
                    platform.terminate();
                }
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Received CTRL-C. Shutting down...");
                platform.terminate();
            },
            _ = sig_hup.recv() => {
                log::info!("Received SIGHUP. Shutting down...");
                platform.terminate();
            }
        }
    });
}
