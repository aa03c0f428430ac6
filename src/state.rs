//! In-memory state of the identity and data indices.
//!
//! A scan pass owns one of these values from checkpoint load to checkpoint save. Loading is
//! lenient: a field with the wrong shape falls back to empty instead of failing the load.

use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::classifier::id_is_valid_format;
use crate::config::ProtocolConfig;
use crate::types::{DataRecord, IdentityMessage, IdentityRegistration};

/// Insertion-ordered, so persisted arrays are stable across saves.
pub type OrderedSet = IndexSet<String>;

fn field_or_default<T: DeserializeOwned + Default>(doc: &Value, key: &str) -> T {
    doc.get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Checkpointed block, or `genesis` when absent, malformed or above the current tip.
fn start_block(doc: &Value, tip: u64, genesis: u64) -> u64 {
    match doc.get("block").and_then(Value::as_u64) {
        Some(block) if block <= tip => block,
        _ => genesis,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistrationRejection {
    #[error("registrant already holds an id")]
    RegistrantTaken,
    #[error("id already claimed")]
    IdTaken,
    #[error("public key already claimed")]
    PubKeyTaken,
    #[error("public key has length {0}")]
    PubKeyLength(usize),
    #[error("private key has length {0}")]
    PrivKeyLength(usize),
    #[error("id format invalid")]
    IdFormat,
}

impl RegistrationRejection {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::RegistrantTaken => "registrant_taken",
            Self::IdTaken => "id_taken",
            Self::PubKeyTaken => "pub_key_taken",
            Self::PubKeyLength(_) => "pub_key_length",
            Self::PrivKeyLength(_) => "priv_key_length",
            Self::IdFormat => "id_format",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DataRejection {
    #[error("owner has length {0}")]
    OwnerLength(usize),
    #[error("initial payload has length {0}")]
    PayloadLength(usize),
    #[error("transaction already indexed")]
    Duplicate,
}

impl DataRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::OwnerLength(_) => "owner_length",
            Self::PayloadLength(_) => "payload_length",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Serialize)]
struct IdentityDocument<'a> {
    block: u64,
    registrations: &'a [IdentityRegistration],
    #[serde(rename = "registrantArray")]
    registrant_array: &'a OrderedSet,
    #[serde(rename = "idArray")]
    id_array: &'a OrderedSet,
    #[serde(rename = "pubKeyArray")]
    pub_key_array: &'a OrderedSet,
    #[serde(rename = "validTwistIds")]
    valid_twist_ids: &'a [IdentityRegistration],
    #[serde(rename = "twistIdTxTxIdsArray")]
    twist_id_tx_tx_ids_array: &'a OrderedSet,
    #[serde(rename = "twistIdTxs")]
    twist_id_txs: &'a [IdentityMessage],
}

/// Registrations (raw log and validated set) and identity messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityIndex {
    pub last_scanned_block: u64,
    /// Every resolved registration, accepted or not.
    pub registrations: Vec<IdentityRegistration>,
    pub registrants: OrderedSet,
    /// Lower-cased.
    pub ids: OrderedSet,
    pub pub_keys: OrderedSet,
    pub valid: Vec<IdentityRegistration>,
    pub message_tx_ids: OrderedSet,
    pub messages: Vec<IdentityMessage>,
}

impl IdentityIndex {
    pub fn fresh(genesis: u64) -> Self {
        Self {
            last_scanned_block: genesis,
            ..Default::default()
        }
    }

    pub fn from_document(doc: &Value, tip: u64, genesis: u64) -> Self {
        Self {
            last_scanned_block: start_block(doc, tip, genesis),
            registrations: field_or_default(doc, "registrations"),
            registrants: field_or_default(doc, "registrantArray"),
            ids: field_or_default(doc, "idArray"),
            pub_keys: field_or_default(doc, "pubKeyArray"),
            valid: field_or_default(doc, "validTwistIds"),
            message_tx_ids: field_or_default(doc, "twistIdTxTxIdsArray"),
            messages: field_or_default(doc, "twistIdTxs"),
        }
    }

    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(IdentityDocument {
            block: self.last_scanned_block,
            registrations: &self.registrations,
            registrant_array: &self.registrants,
            id_array: &self.ids,
            pub_key_array: &self.pub_keys,
            valid_twist_ids: &self.valid,
            twist_id_tx_tx_ids_array: &self.message_tx_ids,
            twist_id_txs: &self.messages,
        })
    }

    /// Log the registration, then promote it to the validated set if it passes the
    /// uniqueness, key-length and id-format checks.
    pub fn record_registration(
        &mut self,
        reg: IdentityRegistration,
        protocol: &ProtocolConfig,
    ) -> Result<(), RegistrationRejection> {
        self.registrations.push(reg.clone());

        let id = reg.id.to_lowercase();
        if self.registrants.contains(&reg.registrant) {
            return Err(RegistrationRejection::RegistrantTaken);
        }
        if self.ids.contains(&id) {
            return Err(RegistrationRejection::IdTaken);
        }
        if self.pub_keys.contains(&reg.pub_key) {
            return Err(RegistrationRejection::PubKeyTaken);
        }
        if reg.pub_key.len() != protocol.public_key_b64_length {
            return Err(RegistrationRejection::PubKeyLength(reg.pub_key.len()));
        }
        if reg.priv_key.len() != protocol.private_key_b64_length {
            return Err(RegistrationRejection::PrivKeyLength(reg.priv_key.len()));
        }
        if !id_is_valid_format(&id, protocol) {
            return Err(RegistrationRejection::IdFormat);
        }

        self.registrants.insert(reg.registrant.clone());
        self.ids.insert(id);
        self.pub_keys.insert(reg.pub_key.clone());
        self.valid.push(reg);
        Ok(())
    }

    /// Returns `false` for a transaction already indexed.
    pub fn record_message(&mut self, msg: IdentityMessage) -> bool {
        if !self.message_tx_ids.insert(msg.tx_id.clone()) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Fill empty `recipient_id`s from the validated registrations, first match wins.
    /// Returns how many messages were resolved.
    pub fn backfill_recipients(&mut self) -> usize {
        let mut resolved = 0;
        for msg in self.messages.iter_mut().filter(|m| m.recipient_id.is_empty()) {
            if let Some(reg) = self.valid.iter().find(|r| r.registrant == msg.recipient_addr) {
                msg.recipient_id = reg.id.clone();
                resolved += 1;
            }
        }
        resolved
    }
}

#[derive(Serialize)]
struct DataDocument<'a> {
    block: u64,
    #[serde(rename = "validTwistData")]
    valid_twist_data: &'a [DataRecord],
    #[serde(rename = "twistDataTxTxIds")]
    twist_data_tx_tx_ids: &'a OrderedSet,
    #[serde(rename = "ownerSet")]
    owner_set: &'a OrderedSet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataIndex {
    pub last_scanned_block: u64,
    pub records: Vec<DataRecord>,
    pub tx_ids: OrderedSet,
    /// Hex owners seen so far. Informational; repeated owners are allowed.
    pub owners: OrderedSet,
}

impl DataIndex {
    pub fn fresh(genesis: u64) -> Self {
        Self {
            last_scanned_block: genesis,
            ..Default::default()
        }
    }

    pub fn from_document(doc: &Value, tip: u64, genesis: u64) -> Self {
        Self {
            last_scanned_block: start_block(doc, tip, genesis),
            records: field_or_default(doc, "validTwistData"),
            tx_ids: field_or_default(doc, "twistDataTxTxIds"),
            owners: field_or_default(doc, "ownerSet"),
        }
    }

    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(DataDocument {
            block: self.last_scanned_block,
            valid_twist_data: &self.records,
            twist_data_tx_tx_ids: &self.tx_ids,
            owner_set: &self.owners,
        })
    }

    pub fn record_data(
        &mut self,
        record: DataRecord,
        protocol: &ProtocolConfig,
    ) -> Result<(), DataRejection> {
        if record.owner.len() != protocol.data_owner_length {
            return Err(DataRejection::OwnerLength(record.owner.len()));
        }
        if record.initial_payload.len() < protocol.data_min_payload_length {
            return Err(DataRejection::PayloadLength(record.initial_payload.len()));
        }
        if !self.tx_ids.insert(record.tx_id.clone()) {
            return Err(DataRejection::Duplicate);
        }
        self.owners.insert(hex::encode(&record.owner));
        self.records.push(record);
        Ok(())
    }
}
