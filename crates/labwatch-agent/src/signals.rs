//! Signal handling for the agent and its monitor processes.
//!
//! The supervising agent shuts down on SIGTERM or Ctrl+C. Monitors
//! additionally listen for SIGUSR2, which interrupts an idle tail wait
//! so fresh console output is shipped immediately.

use nix::sys::signal::{signal, SigHandler, Signal};
use tokio::signal::unix::{Signal as SignalStream, SignalKind};
use tracing::{error, info};

use crate::error::AgentResult;

/// Restore default SIGTERM handling in a monitor process.
///
/// A monitor inherits the agent's signal disposition across the
/// re-exec; SIGTERM must be back at its default for a process-group
/// kill to stop the monitor.
pub fn reset_term_signal() {
    unsafe {
        let _ = signal(Signal::SIGTERM, SigHandler::SigDfl);
    }
}

/// Stream of SIGUSR2 deliveries, used to wake an idle tailer.
pub fn wake_signal() -> AgentResult<SignalStream> {
    Ok(tokio::signal::unix::signal(SignalKind::user_defined2())?)
}

/// Resolves when the process is asked to shut down.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}
