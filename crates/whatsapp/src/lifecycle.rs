//! Signal-driven shutdown.
//!
//! Signal handlers only post a shutdown request (cancel a token). A separate
//! routine, [`LifecycleCoordinator::wait_and_teardown`], performs the bounded
//! teardown once; the binary exits after it returns.

use std::{sync::Arc, time::Duration};

use {
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::client::{ShutdownOutcome, WhatsAppClient};

pub struct LifecycleCoordinator {
    client: Option<Arc<WhatsAppClient>>,
    token: CancellationToken,
    grace: Duration,
}

impl LifecycleCoordinator {
    /// `grace` bounds the whole teardown, independent of the client's own timeout.
    pub fn new(client: Arc<WhatsAppClient>, grace: Duration) -> Self {
        Self {
            client: Some(client),
            token: CancellationToken::new(),
            grace,
        }
    }

    /// Coordinator for a process running with the relay disabled.
    pub fn without_client(grace: Duration) -> Self {
        Self {
            client: None,
            token: CancellationToken::new(),
            grace,
        }
    }

    /// Token cancelled on the first shutdown request. Hand it to servers for graceful stop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn request_shutdown(&self) {
        request(&self.token, "api");
    }

    /// Listen for SIGINT and SIGTERM for the rest of the process lifetime.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                let Some(signal) = wait_for_signal().await else {
                    break;
                };
                request(&token, signal);
            }
        })
    }

    /// Wait for a shutdown request, then tear the session down within `grace`.
    pub async fn wait_and_teardown(&self) -> ShutdownOutcome {
        self.token.cancelled().await;
        let Some(client) = &self.client else {
            return ShutdownOutcome::Completed;
        };
        info!("shutdown requested, closing whatsapp session");
        match tokio::time::timeout(self.grace, client.shutdown()).await {
            Ok(outcome) => {
                info!(?outcome, "whatsapp teardown finished");
                outcome
            },
            Err(_) => {
                warn!(grace = ?self.grace, "whatsapp teardown exceeded grace period, exiting anyway");
                ShutdownOutcome::TimedOut
            },
        }
    }
}

fn request(token: &CancellationToken, source: &str) {
    if token.is_cancelled() {
        warn!(source, "shutdown already in progress, ignoring");
        return;
    }
    info!(source, "shutdown requested");
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() -> Option<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT");
        },
    };
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.ok().map(|()| "SIGINT"),
        _ = term.recv() => Some("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<&'static str> {
    tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT")
}
