//! WhatsApp relay: one long-lived session, best-effort sends, safe teardown.
//!
//! - [`client::WhatsAppClient`] owns the session and its state machine.
//! - [`transport::WaTransport`] is the SDK boundary; [`native::NativeTransport`]
//!   implements it with `whatsapp-rust`, persisting the session in [`sled_store`].
//! - [`registry::ServiceRegistry`] keeps exactly one client per process.
//! - [`lifecycle::LifecycleCoordinator`] turns SIGINT/SIGTERM into a bounded teardown.
//! - [`outbound::WhatsAppOutbound`] is what the rest of the app sends through.

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod native;
pub mod outbound;
pub mod pairing;
pub mod registry;
pub mod sled_store;
pub mod state;
pub mod transport;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod mock;

pub use {
    client::{ShutdownOutcome, WhatsAppClient},
    error::{Error, Result},
    lifecycle::LifecycleCoordinator,
    native::{NativeConfig, NativeTransport},
    outbound::WhatsAppOutbound,
    registry::{ServiceRegistry, WHATSAPP_CLIENT_SLOT},
    state::{SessionEvent, SessionState},
    transport::{TransportEvent, WaTransport},
};
