//! [`WaTransport`] over the in-process `whatsapp-rust` client.
//!
//! The linked-device session lives in a [`SledStore`] under `store_path`, so a
//! restart reconnects without pairing again.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use {
    async_trait::async_trait,
    prayerwall_config::WhatsAppConfig,
    tokio::task::JoinHandle,
    tracing::{debug, info},
    wacore::types::events::Event,
    wacore_binary::jid::Jid,
    waproto::whatsapp as wa,
    whatsapp_rust::{Client, bot::Bot},
    whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory,
    whatsapp_rust_ureq_http_client::UreqHttpClient,
};

use crate::{
    Error, Result,
    sled_store::SledStore,
    transport::{EventSender, TransportEvent, WaTransport},
};

#[derive(Debug, Clone)]
pub struct NativeConfig {
    /// Directory holding the sled session database.
    pub store_path: PathBuf,
    pub request_timeout: Duration,
}

impl NativeConfig {
    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self {
            store_path: config.store_path.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

struct Session {
    client: Arc<Client>,
    run: JoinHandle<()>,
}

pub struct NativeTransport {
    config: NativeConfig,
    session: Mutex<Option<Session>>,
}

impl NativeTransport {
    pub fn new(config: NativeConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    fn client(&self) -> Option<Arc<Client>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| Arc::clone(&s.client))
    }
}

#[async_trait]
impl WaTransport for NativeTransport {
    async fn connect(&self, events: EventSender) -> Result<()> {
        if self.client().is_some() {
            return Err(Error::Session("already connected".into()));
        }

        let store = SledStore::open(&self.config.store_path)?;
        info!(path = %self.config.store_path.display(), "opened whatsapp session store");

        let mut bot = Bot::builder()
            .with_backend(Arc::new(store))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .on_event(move |event, _client| {
                let events = events.clone();
                async move {
                    for mapped in map_event(&event) {
                        // The receiver is gone once the client shuts down.
                        let _ = events.send(mapped);
                    }
                }
            })
            .build()
            .await
            .map_err(|e| Error::Transport(format!("{e:#}")))?;

        let run = bot
            .run()
            .await
            .map_err(|e| Error::Transport(format!("{e:#}")))?;

        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Session {
            client: bot.client(),
            run,
        });
        debug!("whatsapp client running");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let client = self.client().ok_or(Error::Closed)?;
        let jid = chat_jid(chat_id)?;
        let message = wa::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };
        match tokio::time::timeout(
            self.config.request_timeout,
            client.send_message(jid, message),
        )
        .await
        {
            Ok(Ok(id)) => {
                debug!(message_id = %id, "whatsapp message accepted");
                Ok(())
            },
            Ok(Err(e)) => Err(Error::Transport(format!("{e:#}"))),
            Err(_) => Err(Error::Timeout(self.config.request_timeout)),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(session) = session else {
            debug!("whatsapp client was never connected");
            return Ok(());
        };
        session.client.disconnect().await;
        session.run.abort();
        Ok(())
    }
}

fn chat_jid(chat_id: &str) -> Result<Jid> {
    chat_id
        .parse::<Jid>()
        .map_err(|e| Error::Rejected(format!("invalid chat id '{chat_id}': {e}")))
}

/// Translate a client event into the session events the relay cares about.
fn map_event(event: &Event) -> Vec<TransportEvent> {
    match event {
        Event::PairingQrCode { code, .. } => vec![TransportEvent::Qr(code.clone())],
        Event::PairSuccess(_) => vec![TransportEvent::Authenticated],
        Event::PairError(e) => vec![TransportEvent::AuthFailure(e.error.clone())],
        Event::ClientOutdated(_) => {
            vec![TransportEvent::AuthFailure("client version is outdated".into())]
        },
        // A restored session never pairs, so `Connected` also stands in for authentication.
        Event::Connected(_) => vec![TransportEvent::Authenticated, TransportEvent::Ready],
        Event::Disconnected(_) => vec![TransportEvent::Disconnected("connection lost".into())],
        Event::LoggedOut(e) => vec![TransportEvent::Disconnected(format!(
            "logged out: {:?}",
            e.reason
        ))],
        Event::StreamReplaced(_) => vec![TransportEvent::Disconnected(
            "session opened elsewhere".into(),
        )],
        Event::TemporaryBan(e) => vec![TransportEvent::Disconnected(format!(
            "temporarily banned: {:?}",
            e.code
        ))],
        Event::ConnectFailure(e) => vec![TransportEvent::Disconnected(format!(
            "connect failure: {}",
            e.message
        ))],
        _ => Vec::new(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use wacore::types::events::{
        ClientOutdated, ConnectFailure, ConnectFailureReason, Connected, Disconnected, LoggedOut,
        PairError, PairSuccess, StreamReplaced,
    };

    use super::*;

    fn group() -> Jid {
        "120363@g.us".parse().unwrap()
    }

    #[test]
    fn pairing_qr_becomes_qr_token() {
        let event = Event::PairingQrCode {
            code: "2@abc,def".into(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(map_event(&event), vec![TransportEvent::Qr("2@abc,def".into())]);
    }

    #[test]
    fn connected_reports_authenticated_then_ready() {
        assert_eq!(map_event(&Event::Connected(Connected)), vec![
            TransportEvent::Authenticated,
            TransportEvent::Ready
        ]);
    }

    #[test]
    fn pair_outcomes() {
        let success = Event::PairSuccess(PairSuccess {
            id: group(),
            lid: group(),
            business_name: String::new(),
            platform: "web".into(),
        });
        assert_eq!(map_event(&success), vec![TransportEvent::Authenticated]);

        let failure = Event::PairError(PairError {
            id: group(),
            lid: group(),
            business_name: String::new(),
            platform: "web".into(),
            error: "bad signature".into(),
        });
        assert_eq!(map_event(&failure), vec![TransportEvent::AuthFailure(
            "bad signature".into()
        )]);

        assert!(matches!(
            map_event(&Event::ClientOutdated(ClientOutdated))[..],
            [TransportEvent::AuthFailure(_)]
        ));
    }

    #[test]
    fn connection_losses_become_disconnected() {
        let losses = [
            Event::Disconnected(Disconnected),
            Event::StreamReplaced(StreamReplaced),
            Event::LoggedOut(LoggedOut {
                on_connect: true,
                reason: ConnectFailureReason::LoggedOut,
            }),
            Event::ConnectFailure(ConnectFailure {
                reason: ConnectFailureReason::Generic,
                message: "503".into(),
                raw: None,
            }),
        ];
        for event in &losses {
            assert!(
                matches!(map_event(event)[..], [TransportEvent::Disconnected(_)]),
                "{event:?}"
            );
        }
    }

    #[test]
    fn unrelated_events_are_dropped() {
        let event = Event::PairingCode {
            code: "ABCD1234".into(),
            timeout: Duration::from_secs(180),
        };
        assert!(map_event(&event).is_empty());
    }

    #[test]
    fn chat_ids_must_be_jids() {
        assert_eq!(chat_jid("120363@g.us").unwrap(), group());
        assert!(matches!(chat_jid("nowhere"), Err(Error::Rejected(_))));
    }

    #[tokio::test]
    async fn send_before_connect_is_closed() {
        let dir = tempfile::tempdir().unwrap();
        let transport = NativeTransport::new(NativeConfig {
            store_path: dir.path().join("session"),
            request_timeout: Duration::from_secs(1),
        });
        assert!(matches!(
            transport.send_text("120363@g.us", "hello").await,
            Err(Error::Closed)
        ));
        transport.disconnect().await.unwrap();
    }
}
