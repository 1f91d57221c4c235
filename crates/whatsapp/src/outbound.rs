use std::sync::Arc;

use {
    async_trait::async_trait,
    prayerwall_channels::{ChannelHealthSnapshot, ChannelOutbound, ChannelStatus},
};

use crate::client::WhatsAppClient;

/// WhatsApp-backed [`ChannelOutbound`]. Thin: all policy lives in the client.
#[derive(Clone)]
pub struct WhatsAppOutbound {
    client: Arc<WhatsAppClient>,
}

impl WhatsAppOutbound {
    pub fn new(client: Arc<WhatsAppClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChannelOutbound for WhatsAppOutbound {
    async fn send_message(&self, target: &str, text: &str) -> bool {
        self.client.send(target, text).await
    }
}

impl ChannelStatus for WhatsAppOutbound {
    fn snapshot(&self) -> ChannelHealthSnapshot {
        let state = self.client.state();
        ChannelHealthSnapshot {
            channel: "whatsapp".into(),
            state: state.as_str().into(),
            ready: state.is_ready(),
        }
    }
}
