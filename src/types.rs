use serde::Deserialize;
use serde::Serialize;

// Chain-facing shapes, as returned by the node's verbose RPC calls.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockInfo {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub height: Option<u64>,
    pub time: u64,
    #[serde(default)]
    pub tx: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

/// A spent outpoint. Coinbase inputs carry `coinbase` and no `txid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxInput {
    pub txid: Option<String>,
    pub vout: Option<u32>,
    pub coinbase: Option<String>,
}

impl TxInput {
    pub fn outpoint(&self) -> Option<(&str, u32)> {
        match (&self.txid, self.vout) {
            (Some(txid), Some(vout)) => Some((txid.as_str(), vout)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub n: u32,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(rename = "type", default)]
    pub script_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Newer nodes report a single `address` instead of the array.
    #[serde(default)]
    pub address: Option<String>,
}

impl ScriptPubKey {
    pub fn is_nonstandard(&self) -> bool {
        self.script_type == "nonstandard"
    }

    pub fn first_address(&self) -> Option<&str> {
        self.addresses
            .first()
            .map(String::as_str)
            .or(self.address.as_deref())
    }

    /// Every address the output pays, in reported order.
    pub fn all_addresses(&self) -> Vec<&str> {
        if self.addresses.is_empty() {
            self.address.iter().map(String::as_str).collect()
        } else {
            self.addresses.iter().map(String::as_str).collect()
        }
    }
}

/// Where a record was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub block: u64,
    pub block_time: u64,
    pub tx_id: String,
}

// Protocol records. Field names match the persisted JSON documents.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRegistration {
    pub registrant: String,
    pub id_address: String,
    pub id: String,
    pub pub_key: String,
    pub priv_key: String,
    pub block: u64,
    pub block_time: u64,
    pub tx_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityMessage {
    pub sender_id: String,
    /// Empty until the backfill pass finds a validated registrant paid by this message.
    #[serde(default)]
    pub recipient_id: String,
    pub recipient_addr: String,
    pub amount: f64,
    #[serde(with = "hex")]
    pub message: Vec<u8>,
    pub has_message: bool,
    pub block: u64,
    pub block_time: u64,
    pub tx_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Private,
    Shareable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecord {
    #[serde(with = "hex")]
    pub owner: Vec<u8>,
    #[serde(with = "hex")]
    pub initial_payload: Vec<u8>,
    pub kind: DataKind,
    pub fee: f64,
    pub block: u64,
    pub block_time: u64,
    pub tx_id: String,
    pub short_tx_id: String,
}
