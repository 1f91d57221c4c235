use {async_trait::async_trait, serde::Serialize, tracing::debug};

/// Send messages to a channel.
///
/// Delivery is best-effort: one attempt per call, no queueing, no retry.
/// `false` means "delivery not guaranteed" and is the complete error channel;
/// callers that need stronger guarantees build their own retry on top.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn send_message(&self, target: &str, text: &str) -> bool;
}

/// Report channel health.
pub trait ChannelStatus: Send + Sync {
    fn snapshot(&self) -> ChannelHealthSnapshot;
}

/// Channel health snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelHealthSnapshot {
    pub channel: String,
    /// Backend-specific state name (e.g. "ready", "awaiting_pairing").
    pub state: String,
    pub ready: bool,
}

/// Outbound used when no channel is configured. Every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOutbound;

#[async_trait]
impl ChannelOutbound for NoopOutbound {
    async fn send_message(&self, target: &str, _text: &str) -> bool {
        debug!(target_chat = %target, "no channel configured, dropping message");
        false
    }
}

impl ChannelStatus for NoopOutbound {
    fn snapshot(&self) -> ChannelHealthSnapshot {
        ChannelHealthSnapshot {
            channel: "none".into(),
            state: "disabled".into(),
            ready: false,
        }
    }
}
