//! Recording transport for tests.

use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    transport::{EventSender, TransportEvent, WaTransport},
};

#[derive(Default)]
pub struct MockTransport {
    events: Mutex<Option<EventSender>>,
    /// Events emitted before `connect`, flushed once it runs.
    queued: Mutex<Vec<TransportEvent>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_disconnect: AtomicBool,
    /// Make `connect` hang for this long before registering the event sender.
    pub connect_delay: Mutex<Option<Duration>>,
    /// Make `disconnect` hang for this long.
    pub disconnect_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event as if the network produced it.
    pub fn emit(&self, event: TransportEvent) {
        let events = self.events.lock().unwrap();
        match events.as_ref() {
            Some(tx) => {
                let _ = tx.send(event);
            },
            None => self.queued.lock().unwrap().push(event),
        }
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl WaTransport for MockTransport {
    async fn connect(&self, events: EventSender) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Transport("network unreachable".into()));
        }
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut slot = self.events.lock().unwrap();
        for event in self.queued.lock().unwrap().drain(..) {
            let _ = events.send(event);
        }
        *slot = Some(events);
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Rejected("chat not found".into()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.disconnect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(Error::Session("socket already closed".into()));
        }
        Ok(())
    }
}
