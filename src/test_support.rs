//! Shared fixtures for unit tests: an in-memory chain and protocol transaction builders.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::address::AddressCodec;
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::constants::*;
use crate::error::{ChainError, StoreError};
use crate::rpc::ChainSource;
use crate::types::{BlockInfo, DataKind, RawTransaction, ScriptPubKey, TxInput, TxOutput};

const BURN_AMOUNT: f64 = 0.0001;

pub fn test_address(label: &str) -> String {
    AddressCodec::default().encode(label.as_bytes())
}

fn empty_address() -> String {
    AddressCodec::default().encode(&[])
}

fn not_found(what: &str) -> ChainError {
    ChainError::Rpc {
        code: -5,
        message: format!("{} not found", what),
    }
}

#[derive(Default)]
struct ChainData {
    height: Option<u64>,
    blocks: BTreeMap<u64, Vec<String>>,
    txs: HashMap<String, RawTransaction>,
    failing_heights: HashSet<u64>,
    failing_txs: HashSet<String>,
    height_unavailable: bool,
}

/// Chain double. Blocks start at height 1; the reported height defaults to the last block.
#[derive(Default)]
pub struct MockChain {
    data: Mutex<ChainData>,
    tx_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block holding `txs` and return its height.
    pub fn push_block(&self, txs: Vec<RawTransaction>) -> u64 {
        let mut data = self.data.lock().unwrap();
        let height = data.blocks.keys().next_back().map_or(1, |h| h + 1);
        let ids = txs.iter().map(|tx| tx.txid.clone()).collect();
        for tx in txs {
            data.txs.insert(tx.txid.clone(), tx);
        }
        data.blocks.insert(height, ids);
        height
    }

    /// Make a transaction fetchable without placing it in a block.
    pub fn add_tx(&self, tx: RawTransaction) {
        self.data.lock().unwrap().txs.insert(tx.txid.clone(), tx);
    }

    pub fn set_height(&self, height: u64) {
        self.data.lock().unwrap().height = Some(height);
    }

    pub fn fail_block(&self, height: u64, failing: bool) {
        let mut data = self.data.lock().unwrap();
        if failing {
            data.failing_heights.insert(height);
        } else {
            data.failing_heights.remove(&height);
        }
    }

    pub fn fail_tx(&self, txid: &str) {
        self.data.lock().unwrap().failing_txs.insert(txid.to_string());
    }

    pub fn fail_height(&self, failing: bool) {
        self.data.lock().unwrap().height_unavailable = failing;
    }

    pub fn tx_calls(&self) -> usize {
        self.tx_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn height(&self) -> Result<u64, ChainError> {
        let data = self.data.lock().unwrap();
        if data.height_unavailable {
            return Err(not_found("height"));
        }
        Ok(data
            .height
            .unwrap_or_else(|| data.blocks.keys().next_back().copied().unwrap_or(0)))
    }

    async fn block_hash(&self, height: u64) -> Result<String, ChainError> {
        let data = self.data.lock().unwrap();
        if data.failing_heights.contains(&height) || !data.blocks.contains_key(&height) {
            return Err(not_found("block"));
        }
        Ok(format!("hash{}", height))
    }

    async fn block(&self, hash: &str) -> Result<BlockInfo, ChainError> {
        let height: u64 = hash
            .strip_prefix("hash")
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| not_found("block"))?;
        let data = self.data.lock().unwrap();
        let tx = data.blocks.get(&height).cloned().ok_or_else(|| not_found("block"))?;
        Ok(BlockInfo {
            hash: hash.to_string(),
            height: Some(height),
            time: 1_600_000_000 + height * 60,
            tx,
        })
    }

    async fn transaction(&self, txid: &str) -> Result<RawTransaction, ChainError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        let data = self.data.lock().unwrap();
        if data.failing_txs.contains(txid) {
            return Err(ChainError::Malformed {
                method: "getrawtransaction".to_string(),
                reason: "injected failure".to_string(),
            });
        }
        data.txs.get(txid).cloned().ok_or_else(|| not_found("transaction"))
    }
}

/// Memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyCheckpointStore {
    inner: MemoryCheckpointStore,
    failing: AtomicBool,
}

impl FlakyCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointStore for FlakyCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no space left on device",
            )));
        }
        self.inner.save(key, document).await
    }
}

pub struct TxBuilder {
    tx: RawTransaction,
}

impl TxBuilder {
    pub fn new(txid: &str) -> Self {
        Self {
            tx: RawTransaction {
                txid: txid.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn input(mut self, prev_txid: &str, vout: u32) -> Self {
        self.tx.vin.push(TxInput {
            txid: Some(prev_txid.to_string()),
            vout: Some(vout),
            coinbase: None,
        });
        self
    }

    pub fn coinbase(mut self) -> Self {
        self.tx.vin.push(TxInput {
            coinbase: Some("03".to_string()),
            ..Default::default()
        });
        self
    }

    pub fn pay(mut self, address: &str, value: f64) -> Self {
        let n = self.tx.vout.len() as u32;
        self.tx.vout.push(TxOutput {
            value,
            n,
            script_pub_key: ScriptPubKey {
                script_type: "pubkeyhash".to_string(),
                addresses: vec![address.to_string()],
                address: None,
            },
        });
        self
    }

    pub fn nonstandard(mut self) -> Self {
        let n = self.tx.vout.len() as u32;
        self.tx.vout.push(TxOutput {
            value: 0.0,
            n,
            script_pub_key: ScriptPubKey {
                script_type: "nonstandard".to_string(),
                ..Default::default()
            },
        });
        self
    }

    /// Pad with empty burn outputs until the transaction has `count` outputs.
    pub fn pad_to(mut self, count: usize) -> Self {
        while self.tx.vout.len() < count {
            self = self.pay(&empty_address(), BURN_AMOUNT);
        }
        self
    }

    pub fn burn_all(mut self, addresses: &[String]) -> Self {
        for address in addresses {
            self = self.pay(address, BURN_AMOUNT);
        }
        self
    }

    pub fn build(self) -> RawTransaction {
        self.tx
    }
}

fn chunk_addresses(bytes: &[u8]) -> Vec<String> {
    let codec = AddressCodec::default();
    bytes.chunks(20).map(|chunk| codec.encode(chunk)).collect()
}

/// Transaction paying `address` at output 0, used as a registration's funding input.
pub fn funding_transaction(txid: &str, address: &str) -> RawTransaction {
    TxBuilder::new(txid)
        .coinbase()
        .pay(address, 50.0)
        .pay(&test_address("unrelated"), 1.0)
        .build()
}

/// Keys and burn addresses for one identity registration.
pub struct RegistrationFixture {
    pub id: String,
    pub pub_key: String,
    pub priv_key: String,
}

impl RegistrationFixture {
    pub fn new(id: &str, seed: u8) -> Self {
        let mut material = id.as_bytes().to_vec();
        material.push(seed);
        let digest = Sha256::digest(&material);
        let priv_raw: Vec<u8> = (0..104).map(|i| digest[i % 32] ^ i as u8).collect();
        Self {
            id: id.to_string(),
            pub_key: base64::encode(&digest[..]),
            priv_key: base64::encode(&priv_raw),
        }
    }

    /// id, four public key slots, then the private key.
    pub fn burn_addresses(&self) -> Vec<String> {
        let mut addresses = vec![test_address(&self.id)];
        let mut pub_slots = chunk_addresses(self.pub_key.as_bytes());
        pub_slots.resize(4, empty_address());
        addresses.extend(pub_slots);
        addresses.extend(chunk_addresses(self.priv_key.as_bytes()));
        addresses
    }

    /// Flag, change back to the registrant, then the burn addresses.
    pub fn transaction(&self, txid: &str, registrant: &str, funding: (&str, u32)) -> RawTransaction {
        TxBuilder::new(txid)
            .input(funding.0, funding.1)
            .pay(REGISTRATION_ADDRESS, REGISTRATION_FEE)
            .pay(registrant, 3.0)
            .burn_all(&self.burn_addresses())
            .build()
    }
}

/// recipient, [change], flag, sender id, message text.
pub fn message_transaction(
    txid: &str,
    recipient: &str,
    amount: f64,
    with_change: bool,
    sender: &str,
    text: Option<&[u8]>,
) -> RawTransaction {
    let mut builder = TxBuilder::new(txid).pay(recipient, amount);
    if with_change {
        builder = builder.pay(&test_address("change"), 0.5);
    }
    builder = match text {
        Some(_) => builder.pay(MESSAGE_WITH_TEXT_ADDRESS, MESSAGE_WITH_TEXT_FEE),
        None => builder.pay(MESSAGE_STANDARD_ADDRESS, MESSAGE_STANDARD_FEE),
    };
    builder = builder.pay(&test_address(sender), BURN_AMOUNT);
    if let Some(text) = text {
        builder = builder.burn_all(&chunk_addresses(base64::encode(text).as_bytes()));
    }
    builder.pad_to(MIN_PROTOCOL_OUTPUTS).build()
}

/// [change], flag, owner, body.
pub fn data_transaction(
    txid: &str,
    kind: DataKind,
    change: Option<f64>,
    owner: &[u8],
    body: &[u8],
) -> RawTransaction {
    let owner_address = AddressCodec::default().encode(owner);
    data_transaction_with_owner(txid, kind, change, &owner_address, body)
}

pub fn data_transaction_with_owner(
    txid: &str,
    kind: DataKind,
    change: Option<f64>,
    owner_address: &str,
    body: &[u8],
) -> RawTransaction {
    let mut builder = TxBuilder::new(txid);
    if let Some(value) = change {
        builder = builder.pay(&test_address("change"), value);
    }
    let flag = match kind {
        DataKind::Private => DATA_PRIVATE_ADDRESS,
        DataKind::Shareable => DATA_SHAREABLE_ADDRESS,
    };
    builder
        .pay(flag, DATA_BASELINE_FEE)
        .pay(owner_address, BURN_AMOUNT)
        .burn_all(&chunk_addresses(body))
        .pad_to(MIN_PROTOCOL_OUTPUTS)
        .build()
}
