//! Channel-facing traits.
//!
//! The rest of the application relays messages through [`ChannelOutbound`]
//! and never touches session state directly. A channel backend (WhatsApp)
//! implements these traits.

pub mod plugin;

pub use plugin::{ChannelHealthSnapshot, ChannelOutbound, ChannelStatus, NoopOutbound};
