//! SDK boundary: everything the session client needs from the network side.

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::{Result, state::SessionEvent};

/// Asynchronous notifications from the network side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A pairing token (QR payload) an operator has to scan.
    Qr(String),
    Authenticated,
    AuthFailure(String),
    Ready,
    Disconnected(String),
}

impl TransportEvent {
    pub fn session_event(&self) -> SessionEvent {
        match self {
            Self::Qr(_) => SessionEvent::PairingChallenge,
            Self::Authenticated => SessionEvent::Authenticated,
            Self::AuthFailure(_) => SessionEvent::AuthFailure,
            Self::Ready => SessionEvent::Ready,
            Self::Disconnected(_) => SessionEvent::Disconnected,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A connection to the messaging network.
///
/// `connect` starts the handshake and returns once it is under way; progress
/// is reported through `events`. Credentials are persisted by the
/// implementation, not by the caller.
#[async_trait]
pub trait WaTransport: Send + Sync {
    async fn connect(&self, events: EventSender) -> Result<()>;

    /// Send a text message to a chat. Bounded by the transport's own request timeout.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    /// Release the session and any underlying process or socket.
    async fn disconnect(&self) -> Result<()>;
}
