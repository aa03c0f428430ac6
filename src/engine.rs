//! Scan passes over the chain for the identity and data indices.
//!
//! A pass loads its index's checkpoint, scans from the checkpointed block through the current
//! tip (inclusive, in ascending order), then saves the whole document. Fetch failures for the
//! tip or a block abort the pass without saving; a failed transaction fetch skips only that
//! transaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::checkpoint::CheckpointStore;
use crate::classifier::TransactionClassifier;
use crate::config::{ProtocolConfig, ScanSettings, StorageSettings};
use crate::error::{PassError, StoreError};
use crate::metrics;
use crate::rpc::ChainSource;
use crate::state::{DataIndex, DataRejection, IdentityIndex};
use crate::telemetry::{is_progress_block, truncate_txid};
use crate::types::{BlockInfo, RawTransaction, TxContext};

pub const IDENTITY_INDEX: &str = "identity";
pub const DATA_INDEX: &str = "data";

/// Checkpoint store keys of the two indices.
#[derive(Debug, Clone)]
pub struct CheckpointKeys {
    pub identity: String,
    pub data: String,
}

impl From<&StorageSettings> for CheckpointKeys {
    fn from(storage: &StorageSettings) -> Self {
        Self {
            identity: storage.identity_file.clone(),
            data: storage.data_file.clone(),
        }
    }
}

/// What a completed pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub index: &'static str,
    pub from_block: u64,
    pub tip: u64,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped_txs: usize,
}

impl PassSummary {
    fn new(index: &'static str, from_block: u64, tip: u64) -> Self {
        Self {
            index,
            from_block,
            tip,
            accepted: 0,
            rejected: 0,
            skipped_txs: 0,
        }
    }
}

pub struct IndexerEngine {
    chain: Arc<dyn ChainSource>,
    store: Arc<dyn CheckpointStore>,
    classifier: TransactionClassifier,
    keys: CheckpointKeys,
    scan: ScanSettings,
}

impl IndexerEngine {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        store: Arc<dyn CheckpointStore>,
        protocol: ProtocolConfig,
        keys: CheckpointKeys,
        scan: ScanSettings,
    ) -> Self {
        Self {
            chain,
            store,
            classifier: TransactionClassifier::new(protocol),
            keys,
            scan,
        }
    }

    fn protocol(&self) -> &ProtocolConfig {
        self.classifier.protocol()
    }

    pub async fn run_identity_pass(&self) -> Result<PassSummary, PassError> {
        let result = async {
            let tip = self.chain.height().await.map_err(PassError::Height)?;
            metrics::set_chain_tip_height(tip);
            let state = self.load_identity(tip).await;
            let (state, summary) = self.scan_identity(state, tip).await?;
            self.save(&self.keys.identity, state.to_document(), IDENTITY_INDEX, state.last_scanned_block)
                .await?;
            Ok(summary)
        }
        .instrument(info_span!("identity_pass"))
        .await;
        finish(IDENTITY_INDEX, result)
    }

    pub async fn run_data_pass(&self) -> Result<PassSummary, PassError> {
        let result = async {
            let tip = self.chain.height().await.map_err(PassError::Height)?;
            metrics::set_chain_tip_height(tip);
            let state = self.load_data(tip).await;
            let (state, summary) = self.scan_data(state, tip).await?;
            self.save(&self.keys.data, state.to_document(), DATA_INDEX, state.last_scanned_block)
                .await?;
            Ok(summary)
        }
        .instrument(info_span!("data_pass"))
        .await;
        finish(DATA_INDEX, result)
    }

    async fn load_document(&self, key: &str) -> Option<serde_json::Value> {
        if !self.scan.resume_from_checkpoint {
            return None;
        }
        match self.store.load(key).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(key = key, error = %e, "Cannot read checkpoint, starting from genesis");
                None
            }
        }
    }

    pub async fn load_identity(&self, tip: u64) -> IdentityIndex {
        let genesis = self.protocol().identity_genesis_height;
        match self.load_document(&self.keys.identity).await {
            Some(doc) => IdentityIndex::from_document(&doc, tip, genesis),
            None => IdentityIndex::fresh(genesis),
        }
    }

    pub async fn load_data(&self, tip: u64) -> DataIndex {
        let genesis = self.protocol().data_genesis_height;
        match self.load_document(&self.keys.data).await {
            Some(doc) => DataIndex::from_document(&doc, tip, genesis),
            None => DataIndex::fresh(genesis),
        }
    }

    async fn save(
        &self,
        key: &str,
        document: Result<serde_json::Value, serde_json::Error>,
        index: &str,
        block: u64,
    ) -> Result<(), PassError> {
        let document = document.map_err(StoreError::from)?;
        info!(key = key, block = block, "Writing checkpoint");
        self.store.save(key, &document).await?;
        metrics::set_last_scanned_height(index, block);
        Ok(())
    }

    async fn fetch_block(&self, height: u64) -> Result<BlockInfo, PassError> {
        let hash = self
            .chain
            .block_hash(height)
            .await
            .map_err(|source| PassError::Block { height, source })?;
        self.chain
            .block(&hash)
            .await
            .map_err(|source| PassError::Block { height, source })
    }

    async fn fetch_transaction(&self, height: u64, txid: &str) -> Option<RawTransaction> {
        match self.chain.transaction(txid).await {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!(height = height, tx = %truncate_txid(txid), error = %e, "Skipping transaction");
                None
            }
        }
    }

    /// Distinct addresses paid by the outputs this transaction spends, resolved in input order.
    /// Inputs whose previous transaction cannot be fetched are skipped.
    pub async fn funding_addresses(&self, tx: &RawTransaction) -> BTreeSet<String> {
        let mut addresses = BTreeSet::new();
        for (prev_txid, index) in tx.vin.iter().filter_map(|input| input.outpoint()) {
            let prev = match self.chain.transaction(prev_txid).await {
                Ok(prev) => prev,
                Err(e) => {
                    debug!(tx = %truncate_txid(prev_txid), error = %e, "Funding input not resolvable");
                    continue;
                }
            };
            for out in prev.vout.iter().filter(|out| out.n == index) {
                addresses.extend(out.script_pub_key.all_addresses().into_iter().map(String::from));
            }
        }
        addresses
    }

    fn log_progress(&self, height: u64, tip: u64) {
        if is_progress_block(height, tip, self.scan.progress_log_interval) {
            info!(current = height, total = tip, "blocks-processed");
        }
    }

    /// Scan `state.last_scanned_block..=tip` into the identity index, then backfill recipients.
    pub async fn scan_identity(
        &self,
        mut state: IdentityIndex,
        tip: u64,
    ) -> Result<(IdentityIndex, PassSummary), PassError> {
        let mut summary = PassSummary::new(IDENTITY_INDEX, state.last_scanned_block, tip);
        info!(from = state.last_scanned_block, tip = tip, "Scanning for identity records");

        for height in state.last_scanned_block..=tip {
            let block = self.fetch_block(height).await?;
            for txid in &block.tx {
                let Some(tx) = self.fetch_transaction(height, txid).await else {
                    summary.skipped_txs += 1;
                    continue;
                };
                metrics::increment_transactions_inspected(IDENTITY_INDEX);
                let ctx = TxContext {
                    block: height,
                    block_time: block.time,
                    tx_id: txid.clone(),
                };
                self.index_identity_tx(&mut state, &tx, &ctx, &mut summary).await;
            }
            state.last_scanned_block = height;
            metrics::increment_blocks_scanned(IDENTITY_INDEX);
            self.log_progress(height, tip);
        }

        let resolved = state.backfill_recipients();
        info!(resolved = resolved, messages = state.messages.len(), "Resolved message recipients");
        Ok((state, summary))
    }

    async fn index_identity_tx(
        &self,
        state: &mut IdentityIndex,
        tx: &RawTransaction,
        ctx: &TxContext,
        summary: &mut PassSummary,
    ) {
        if let Some(candidate) = self.classifier.detect_registration(tx) {
            let funding = self.funding_addresses(tx).await;
            if let Some(reg) = self.classifier.resolve_registration(&candidate, &funding, ctx) {
                let id = reg.id.clone();
                match state.record_registration(reg, self.protocol()) {
                    Ok(()) => {
                        info!(block = ctx.block, tx = %truncate_txid(&ctx.tx_id), id = %id, "Identity registered");
                        metrics::increment_records_accepted("registration");
                        summary.accepted += 1;
                    }
                    Err(reason) => {
                        debug!(block = ctx.block, tx = %truncate_txid(&ctx.tx_id), id = %id, %reason, "Registration rejected");
                        metrics::increment_records_rejected("registration", reason.reason());
                        summary.rejected += 1;
                    }
                }
            }
        }

        if let Some(msg) = self.classifier.classify_message(tx, ctx) {
            if state.record_message(msg) {
                debug!(block = ctx.block, tx = %truncate_txid(&ctx.tx_id), "Identity message indexed");
                metrics::increment_records_accepted("message");
                summary.accepted += 1;
            } else {
                metrics::increment_records_rejected("message", "duplicate");
                summary.rejected += 1;
            }
        }
    }

    /// Scan `state.last_scanned_block..=tip` into the data index.
    pub async fn scan_data(
        &self,
        mut state: DataIndex,
        tip: u64,
    ) -> Result<(DataIndex, PassSummary), PassError> {
        let mut summary = PassSummary::new(DATA_INDEX, state.last_scanned_block, tip);
        info!(from = state.last_scanned_block, tip = tip, "Scanning for data records");

        for height in state.last_scanned_block..=tip {
            let block = self.fetch_block(height).await?;
            for txid in &block.tx {
                let Some(tx) = self.fetch_transaction(height, txid).await else {
                    summary.skipped_txs += 1;
                    continue;
                };
                metrics::increment_transactions_inspected(DATA_INDEX);
                let ctx = TxContext {
                    block: height,
                    block_time: block.time,
                    tx_id: txid.clone(),
                };
                let Some(record) = self.classifier.classify_data(&tx, &ctx) else {
                    continue;
                };
                match state.record_data(record, self.protocol()) {
                    Ok(()) => {
                        debug!(block = height, tx = %truncate_txid(txid), "Data record indexed");
                        metrics::increment_records_accepted("data");
                        summary.accepted += 1;
                    }
                    Err(DataRejection::Duplicate) => {
                        metrics::increment_records_rejected("data", DataRejection::Duplicate.reason());
                        summary.rejected += 1;
                    }
                    Err(reason) => {
                        info!(block = height, tx = %truncate_txid(txid), %reason, "Data record validation failed");
                        metrics::increment_records_rejected("data", reason.reason());
                        summary.rejected += 1;
                    }
                }
            }
            state.last_scanned_block = height;
            metrics::increment_blocks_scanned(DATA_INDEX);
            self.log_progress(height, tip);
        }

        Ok((state, summary))
    }
}

fn finish(index: &str, result: Result<PassSummary, PassError>) -> Result<PassSummary, PassError> {
    match &result {
        Ok(summary) => info!(
            index = index,
            tip = summary.tip,
            accepted = summary.accepted,
            rejected = summary.rejected,
            skipped_txs = summary.skipped_txs,
            "Pass complete"
        ),
        Err(e) => {
            error!(index = index, error = %e, "Pass aborted");
            metrics::increment_passes_aborted(index);
        }
    }
    result
}
