//! Cooperative stop request shared between the signal listener and the poll
//! loop.

use log::*;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if the sender is
    /// dropped without requesting it.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug)]
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

/// Wait for SIGINT (or SIGTERM on unix), then request shutdown.
pub async fn listen_for_signals(sender: ShutdownSender) {
    match wait_for_signal().await {
        Ok(()) => {
            println!("\nStopping monitoring...");
            info!(target: "App", "Stop requested");
        }
        Err(err) => {
            // default signal handling still applies, but nothing gets exported
            error!(target: "App", "Cannot listen for signals: {}", err);
            std::future::pending::<()>().await;
        }
    }
    sender.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
