//! The session client: one authenticated WhatsApp session per process.

use std::{
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    prayerwall_config::{Mode, WhatsAppConfig},
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    pairing,
    state::{SessionEvent, SessionState, SessionStateMachine},
    transport::{TransportEvent, WaTransport},
};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Render pairing tokens as terminal QR codes.
    pub render_qr: bool,
    /// Upper bound on `WaTransport::disconnect` during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            render_qr: true,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &WhatsAppConfig, mode: Mode) -> Self {
        Self {
            render_qr: config.render_qr(mode),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// How a `shutdown()` call ended. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    Failed,
    TimedOut,
    /// Another call already owns the teardown.
    AlreadyShuttingDown,
}

pub struct WhatsAppClient {
    transport: Arc<dyn WaTransport>,
    machine: SessionStateMachine,
    initialized: AtomicBool,
    shutting_down: AtomicBool,
    options: ClientOptions,
    pump: Mutex<Option<JoinHandle<()>>>,
    connect: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppClient {
    pub fn new(transport: Arc<dyn WaTransport>, options: ClientOptions) -> Arc<Self> {
        Arc::new(Self {
            transport,
            machine: SessionStateMachine::new(),
            initialized: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            options,
            pump: Mutex::new(None),
            connect: Mutex::new(None),
        })
    }

    /// Start the handshake in the background and return immediately.
    ///
    /// Failures are logged and leave the client non-ready. Only the first call
    /// does anything. Must be called from within a tokio runtime.
    pub fn initialize(self: &Arc<Self>) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("whatsapp client already initialized");
            return;
        }
        if let Err(e) = self.machine.transition(SessionEvent::Initialize) {
            debug!(error = %e, "skipping whatsapp initialization");
            return;
        }
        info!("initializing whatsapp client");

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(Arc::downgrade(self), rx));
        *self.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(pump);

        let client = Arc::clone(self);
        let connect = tokio::spawn(async move {
            if client.shutting_down.load(Ordering::SeqCst) {
                debug!("shutdown requested before whatsapp connect started");
                return;
            }
            if let Err(e) = client.transport.connect(tx).await {
                error!(kind = e.kind(), error = %e, "failed to initialize whatsapp client");
                client.apply(SessionEvent::AuthFailure);
            }
        });
        *self.connect.lock().unwrap_or_else(PoisonError::into_inner) = Some(connect);
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.machine.subscribe()
    }

    /// Send `text` to `target`. Returns `false` on any failure; never errors.
    ///
    /// When the session is not ready this returns without touching the network.
    pub async fn send(&self, target: &str, text: &str) -> bool {
        if target.trim().is_empty() || text.is_empty() {
            warn!("refusing to send whatsapp message with empty target or text");
            return false;
        }
        let state = self.state();
        if !state.is_ready() {
            warn!(%state, "whatsapp client not ready, message not sent");
            return false;
        }
        match self.transport.send_text(target, text).await {
            Ok(()) => {
                debug!(chat = %target, len = text.len(), "whatsapp message sent");
                true
            },
            Err(e) => {
                error!(
                    chat = %target,
                    kind = e.kind(),
                    error = %e,
                    source = ?std::error::Error::source(&e),
                    "failed to send whatsapp message"
                );
                false
            },
        }
    }

    /// Release the session. Idempotent: only the first call tears down.
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("whatsapp shutdown already in progress");
            return ShutdownOutcome::AlreadyShuttingDown;
        }
        self.apply(SessionEvent::ShutdownRequested);
        info!("shutting down whatsapp client");

        // A connect still in flight must not open a session after teardown.
        let connect = self
            .connect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(connect) = connect {
            connect.abort();
            let _ = connect.await;
        }

        let outcome =
            match tokio::time::timeout(self.options.shutdown_timeout, self.transport.disconnect())
                .await
            {
                Ok(Ok(())) => {
                    info!("whatsapp session closed");
                    ShutdownOutcome::Completed
                },
                Ok(Err(e)) => {
                    error!(kind = e.kind(), error = %e, "error closing whatsapp session");
                    ShutdownOutcome::Failed
                },
                Err(_) => {
                    warn!(
                        timeout = ?self.options.shutdown_timeout,
                        "whatsapp session teardown timed out"
                    );
                    ShutdownOutcome::TimedOut
                },
            };

        if let Some(pump) = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
        self.apply(SessionEvent::Terminated);
        outcome
    }

    fn handle_event(&self, event: TransportEvent) {
        let Some(state) = self.apply(event.session_event()) else {
            return;
        };
        match event {
            TransportEvent::Qr(token) => pairing::announce(&token, self.options.render_qr),
            TransportEvent::Authenticated => info!("whatsapp client authenticated"),
            TransportEvent::AuthFailure(reason) => {
                error!(%reason, %state, "whatsapp authentication failure")
            },
            TransportEvent::Ready => info!("whatsapp client is ready"),
            TransportEvent::Disconnected(reason) => warn!(
                %reason,
                "whatsapp client disconnected, sends will fail until the session is ready again"
            ),
        }
    }

    fn apply(&self, event: SessionEvent) -> Option<SessionState> {
        match self.machine.transition(event) {
            Ok(state) => {
                debug!(?event, %state, "whatsapp session transition");
                Some(state)
            },
            Err(e) => {
                debug!(error = %e, "ignoring whatsapp session event");
                None
            },
        }
    }
}

async fn pump_events(client: Weak<WhatsAppClient>, mut rx: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(client) = client.upgrade() else {
            break;
        };
        client.handle_event(event);
    }
    debug!("whatsapp event stream closed");
}
