use std::sync::Arc;

use {
    prayerwall_channels::{ChannelOutbound, ChannelStatus, NoopOutbound},
    prayerwall_store::PrayerStore,
};

/// Shared state handed to every handler.
pub struct AppState {
    pub store: PrayerStore,
    /// Where submissions are relayed. Best-effort.
    pub outbound: Arc<dyn ChannelOutbound>,
    pub status: Arc<dyn ChannelStatus>,
    /// Chat that receives relayed submissions. `None` disables relaying.
    pub target: Option<String>,
    pub version: String,
}

impl AppState {
    pub fn new<C>(store: PrayerStore, channel: Arc<C>, target: Option<String>) -> Arc<Self>
    where
        C: ChannelOutbound + ChannelStatus + 'static,
    {
        Arc::new(Self {
            store,
            outbound: Arc::clone(&channel) as Arc<dyn ChannelOutbound>,
            status: channel,
            target,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// State with relaying switched off.
    pub fn without_channel(store: PrayerStore) -> Arc<Self> {
        Self::new(store, Arc::new(NoopOutbound), None)
    }
}
