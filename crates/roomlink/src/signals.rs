//! Termination signals for the client.
//!
//! The first signal asks the frame loop to leave the room and disconnect. A second
//! one, once cleanup has started, ends the process without waiting on the server.

use std::fmt;
use tokio::signal;
use tracing::{error, info, warn};

/// Signal that ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSignal::Interrupt => write!(f, "SIGINT"),
            StopSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Resolves on the next SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn next_stop_signal() -> Result<StopSignal, Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let received = tokio::select! {
            _ = sigint.recv() => StopSignal::Interrupt,
            _ = sigterm.recv() => StopSignal::Terminate,
        };
        Ok(received)
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok(StopSignal::Interrupt)
    }
}

/// Shutdown future handed to the frame loop.
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    let received = next_stop_signal().await?;
    info!("📡 {} received - leaving room and disconnecting", received);
    Ok(())
}

/// Exits immediately if another signal arrives while the client is still leaving
/// its room.
pub fn exit_on_second_signal() {
    tokio::spawn(async move {
        match next_stop_signal().await {
            Ok(received) => {
                warn!("⚡ {} received again, exiting without leaving the room", received);
                std::process::exit(1);
            }
            Err(e) => error!("❌ Could not watch for a second shutdown signal: {}", e),
        }
    });
}
