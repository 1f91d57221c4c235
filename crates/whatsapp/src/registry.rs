//! Process-scoped service registry.
//!
//! Anything that must exist at most once per process (the WhatsApp session
//! above all: a second one would authenticate the same account twice) is
//! acquired through a named slot. Slots live until the process exits.

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex, PoisonError},
};

use tracing::{debug, info};

use crate::{Error, Result, client::WhatsAppClient};

/// Slot holding the process's [`WhatsAppClient`].
pub const WHATSAPP_CLIENT_SLOT: &str = "prayerwall.whatsapp.client";

type Slot = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct ServiceRegistry {
    slots: Mutex<HashMap<&'static str, Slot>>,
}

static GLOBAL: LazyLock<ServiceRegistry> = LazyLock::new(ServiceRegistry::new);

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Return the instance in `slot`, creating it with `init` if the slot is empty.
    ///
    /// Lookup and creation happen under one lock, so concurrent callers never
    /// construct two instances. `init` must not call back into the registry.
    pub fn acquire<T>(&self, slot: &'static str, init: impl FnOnce() -> Arc<T>) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slots.get(slot) {
            debug!(slot, "reusing registered instance");
            return Arc::clone(existing)
                .downcast::<T>()
                .map_err(|_| Error::SlotType(slot));
        }
        let created = init();
        slots.insert(slot, Arc::clone(&created) as Slot);
        info!(slot, "registered new instance");
        Ok(created)
    }

    /// Acquire the WhatsApp client slot.
    pub fn whatsapp_client(
        &self,
        init: impl FnOnce() -> Arc<WhatsAppClient>,
    ) -> Result<Arc<WhatsAppClient>> {
        self.acquire(WHATSAPP_CLIENT_SLOT, init)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(slot)
    }
}
