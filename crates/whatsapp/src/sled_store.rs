//! Session store for the WhatsApp client on top of `sled`.
//!
//! One tree per record family, values encoded with `postcard`. Holds the
//! linked-device credentials, so reconnecting after a restart skips pairing.

use std::path::Path;

use {
    async_trait::async_trait,
    serde::{Serialize, de::DeserializeOwned},
    sled::{Db, Tree},
    wacore::{
        appstate::{hash::HashState, processor::AppStateMutationMAC},
        store::{
            Device,
            error::{Result, StoreError, db_err},
            traits::{
                AppStateSyncKey, AppSyncStore, DeviceListRecord, DeviceStore, LidPnMappingEntry,
                ProtocolStore, SignalStore,
            },
        },
    },
};

const DEVICE_KEY: &[u8] = b"device";

/// The only device id this store hands out; one process links one device.
const DEVICE_ID: i32 = 1;

pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(path: &Path) -> crate::Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// A throwaway store that is removed when dropped.
    pub fn temporary() -> crate::Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    fn tree(&self, name: &str) -> Result<Tree> {
        self.db.open_tree(name).map_err(db_err)
    }

    fn get_raw(&self, tree: &str, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tree(tree)?
            .get(key)
            .map_err(db_err)?
            .map(|v| v.to_vec()))
    }

    fn put_raw(&self, tree: &str, key: impl AsRef<[u8]>, value: &[u8]) -> Result<()> {
        self.tree(tree)?.insert(key, value).map_err(db_err)?;
        Ok(())
    }

    fn remove(&self, tree: &str, key: impl AsRef<[u8]>) -> Result<()> {
        self.tree(tree)?.remove(key).map_err(db_err)?;
        Ok(())
    }

    fn get_value<T: DeserializeOwned>(&self, tree: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        self.get_raw(tree, key)?.map(|bytes| decode(&bytes)).transpose()
    }

    fn put_value<T: Serialize>(&self, tree: &str, key: impl AsRef<[u8]>, value: &T) -> Result<()> {
        self.put_raw(tree, key, &encode(value)?)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Composite key `a \0 b`.
fn pair_key(a: &str, b: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(a.len() + 1 + b.len());
    key.extend_from_slice(a.as_bytes());
    key.push(0);
    key.extend_from_slice(b);
    key
}

#[async_trait]
impl SignalStore for SledStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        self.put_raw("identities", address, &key)
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.get_raw("identities", address)
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.remove("identities", address)
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.get_raw("sessions", address)
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        self.put_raw("sessions", address, session)
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.remove("sessions", address)
    }

    async fn store_prekey(&self, id: u32, record: &[u8], _uploaded: bool) -> Result<()> {
        self.put_raw("prekeys", id.to_be_bytes(), record)
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        self.get_raw("prekeys", id.to_be_bytes())
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        self.remove("prekeys", id.to_be_bytes())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        self.put_raw("signed_prekeys", id.to_be_bytes(), record)
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        self.get_raw("signed_prekeys", id.to_be_bytes())
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.tree("signed_prekeys")?.iter() {
            let (key, value) = entry.map_err(db_err)?;
            let id: [u8; 4] = key
                .as_ref()
                .try_into()
                .map_err(|_| StoreError::Serialization("bad signed prekey id".into()))?;
            out.push((u32::from_be_bytes(id), value.to_vec()));
        }
        Ok(out)
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        self.remove("signed_prekeys", id.to_be_bytes())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        self.put_raw("sender_keys", address, record)
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        self.get_raw("sender_keys", address)
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        self.remove("sender_keys", address)
    }
}

#[async_trait]
impl AppSyncStore for SledStore {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        self.get_value("sync_keys", key_id)
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        self.put_value("sync_keys", key_id, &key)
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        Ok(self.get_value("app_versions", name)?.unwrap_or_default())
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        self.put_value("app_versions", name, &state)
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        _version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        let tree = self.tree("mutation_macs")?;
        for m in mutations {
            tree.insert(pair_key(name, &m.index_mac), m.value_mac.as_slice())
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_raw("mutation_macs", pair_key(name, index_mac))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        let tree = self.tree("mutation_macs")?;
        for index_mac in index_macs {
            tree.remove(pair_key(name, index_mac)).map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProtocolStore for SledStore {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        Ok(self.get_value("skdm", group_jid)?.unwrap_or_default())
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        if device_jids.is_empty() {
            return Ok(());
        }
        let mut recipients = self.get_skdm_recipients(group_jid).await?;
        for jid in device_jids {
            if !recipients.contains(jid) {
                recipients.push(jid.clone());
            }
        }
        self.put_value("skdm", group_jid, &recipients)
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        self.remove("skdm", group_jid)
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        self.get_value("lid_map", lid)
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        Ok(self
            .get_all_lid_mappings()
            .await?
            .into_iter()
            .filter(|e| e.phone_number == phone)
            .max_by_key(|e| e.updated_at))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        self.put_value("lid_map", &entry.lid, entry)
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        let mut out = Vec::new();
        for entry in self.tree("lid_map")?.iter() {
            let (_, value) = entry.map_err(db_err)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        self.put_raw("base_keys", pair_key(address, message_id.as_bytes()), base_key)
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        let saved = self.get_raw("base_keys", pair_key(address, message_id.as_bytes()))?;
        Ok(saved.is_some_and(|k| k == current_base_key))
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        self.remove("base_keys", pair_key(address, message_id.as_bytes()))
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        self.put_value("device_lists", &record.user, &record)
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        self.get_value("device_lists", user)
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        let mut marks: Vec<String> = self.get_value("forget_marks", group_jid)?.unwrap_or_default();
        if !marks.iter().any(|p| p == participant) {
            marks.push(participant.to_string());
        }
        self.put_value("forget_marks", group_jid, &marks)
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let removed = self.tree("forget_marks")?.remove(group_jid).map_err(db_err)?;
        removed.map(|bytes| decode(&bytes)).transpose().map(Option::unwrap_or_default)
    }
}

#[async_trait]
impl DeviceStore for SledStore {
    async fn save(&self, device: &Device) -> Result<()> {
        self.put_value("device", DEVICE_KEY, device)?;
        self.db.flush_async().await.map_err(db_err)?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        self.get_value("device", DEVICE_KEY)
    }

    async fn exists(&self) -> Result<bool> {
        self.tree("device")?.contains_key(DEVICE_KEY).map_err(db_err)
    }

    async fn create(&self) -> Result<i32> {
        if !self.exists().await? {
            self.save(&Device::new()).await?;
        }
        Ok(DEVICE_ID)
    }
}
