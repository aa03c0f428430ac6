// classifier.rs
//
// Recognizes the three protocol transaction shapes from a transaction's outputs.
//
// Detection is two-phase: locate the first flag output that pays its fee floor, then collect
// every address of the eligible output prefix (flag and earlier outputs included) as the
// candidate list, and prune it per shape.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::address::AddressCodec;
use crate::config::ProtocolConfig;
use crate::payload::PayloadAssembler;
use crate::telemetry::truncate_txid;
use crate::types::{DataKind, DataRecord, IdentityMessage, IdentityRegistration, RawTransaction, TxContext};

/// One output of the eligible prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub address: String,
    pub amount: f64,
}

/// A transaction that paid the registration flag. Needs its funding addresses resolved
/// before it becomes a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationCandidate {
    /// Distinct output addresses in first-seen order.
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionClassifier {
    protocol: ProtocolConfig,
    assembler: PayloadAssembler,
}

impl TransactionClassifier {
    pub fn new(protocol: ProtocolConfig) -> Self {
        let codec = AddressCodec::new(protocol.version_markers.clone());
        let assembler = PayloadAssembler::new(codec, protocol.id_allowed_chars.clone());
        Self {
            protocol,
            assembler,
        }
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.protocol
    }

    /// Outputs up to (not including) the first nonstandard or address-less one.
    /// `None` when the transaction has too few outputs to carry a payload.
    pub fn eligible_outputs(&self, tx: &RawTransaction) -> Option<Vec<Candidate>> {
        if tx.vout.len() < self.protocol.min_outputs {
            return None;
        }
        let outputs = tx
            .vout
            .iter()
            .map_while(|out| {
                if out.script_pub_key.is_nonstandard() {
                    return None;
                }
                out.script_pub_key.first_address().map(|address| Candidate {
                    address: address.to_string(),
                    amount: out.value,
                })
            })
            .collect();
        Some(outputs)
    }

    /// Registration shape, phase 1 and 2. Funding resolution happens in `resolve_registration`.
    pub fn detect_registration(&self, tx: &RawTransaction) -> Option<RegistrationCandidate> {
        let outputs = self.eligible_outputs(tx)?;
        let flags = [(
            self.protocol.registration_address.as_str(),
            self.protocol.registration_fee * self.protocol.identity_fee_floor,
        )];
        locate_flag(&outputs, &flags)?;

        let mut seen = BTreeSet::new();
        let addresses = outputs
            .into_iter()
            .map(|c| c.address)
            .filter(|address| seen.insert(address.clone()))
            .collect();
        Some(RegistrationCandidate { addresses })
    }

    /// Turn a registration candidate into a record, given the distinct addresses that
    /// funded the transaction. Exactly one funding address is required.
    pub fn resolve_registration(
        &self,
        candidate: &RegistrationCandidate,
        funding: &BTreeSet<String>,
        ctx: &TxContext,
    ) -> Option<IdentityRegistration> {
        if funding.len() != 1 {
            debug!(
                tx = %truncate_txid(&ctx.tx_id),
                funding = funding.len(),
                "registration needs exactly one funding address"
            );
            return None;
        }
        let registrant = funding.iter().next()?.clone();

        let burn: Vec<String> = candidate
            .addresses
            .iter()
            .filter(|address| {
                **address != registrant && **address != self.protocol.registration_address
            })
            .cloned()
            .collect();
        let id_address = burn.first()?.clone();

        let payload = self.assembler.assemble_registration(&burn);
        Some(IdentityRegistration {
            registrant,
            id_address,
            id: payload.id,
            pub_key: payload.pub_key,
            priv_key: payload.priv_key,
            block: ctx.block,
            block_time: ctx.block_time,
            tx_id: ctx.tx_id.clone(),
        })
    }

    /// Identity-to-identity payment, with or without message text.
    pub fn classify_message(&self, tx: &RawTransaction, ctx: &TxContext) -> Option<IdentityMessage> {
        let outputs = self.eligible_outputs(tx)?;
        let p = &self.protocol;
        let flags = [
            (
                p.message_standard_address.as_str(),
                p.message_standard_fee * p.identity_fee_floor,
            ),
            (
                p.message_with_text_address.as_str(),
                p.message_with_text_fee * p.identity_fee_floor,
            ),
        ];
        let flag = locate_flag(&outputs, &flags)?;

        // recipient, [change], flag, sender id, message...
        let shift = match flag_slot(&outputs, flag, &[1, 2]) {
            Some(index) => index + 1,
            None => {
                debug!(tx = %truncate_txid(&ctx.tx_id), "message flag out of place");
                return None;
            }
        };
        let recipient = &outputs[0];
        let rest: Vec<String> = outputs[shift..].iter().map(|c| c.address.clone()).collect();
        let payload = self.assembler.assemble_message(&rest);

        Some(IdentityMessage {
            sender_id: payload.sender_id,
            recipient_id: String::new(),
            recipient_addr: recipient.address.clone(),
            amount: recipient.amount,
            message: payload.message,
            has_message: flag == p.message_with_text_address,
            block: ctx.block,
            block_time: ctx.block_time,
            tx_id: ctx.tx_id.clone(),
        })
    }

    /// Data transaction. Length checks are left to the data index.
    pub fn classify_data(&self, tx: &RawTransaction, ctx: &TxContext) -> Option<DataRecord> {
        let outputs = self.eligible_outputs(tx)?;
        let p = &self.protocol;
        let floor = p.data_fee * p.data_fee_floor;
        let flags = [
            (p.data_private_address.as_str(), floor),
            (p.data_shareable_address.as_str(), floor),
        ];
        let flag = locate_flag(&outputs, &flags)?;

        // [change], flag, owner, payload...
        let Some(flag_index) = flag_slot(&outputs, flag, &[0, 1]) else {
            debug!(tx = %truncate_txid(&ctx.tx_id), "data flag out of place");
            return None;
        };
        let fee: f64 = outputs[flag_index..].iter().map(|c| c.amount).sum();
        let kind = if flag == p.data_shareable_address {
            DataKind::Shareable
        } else {
            DataKind::Private
        };

        let rest: Vec<String> = outputs[flag_index + 1..]
            .iter()
            .map(|c| c.address.clone())
            .collect();
        let payload = self.assembler.assemble_data_record(&rest, kind);

        Some(DataRecord {
            owner: payload.owner,
            initial_payload: payload.initial_payload,
            kind: payload.kind,
            fee,
            block: ctx.block,
            block_time: ctx.block_time,
            tx_id: ctx.tx_id.clone(),
            short_tx_id: short_tx_id(&ctx.tx_id),
        })
    }
}

/// First output paying one of `flags` at least its floor. Returns the matched flag address.
fn locate_flag<'a>(outputs: &[Candidate], flags: &[(&'a str, f64)]) -> Option<&'a str> {
    outputs.iter().find_map(|c| {
        flags
            .iter()
            .find(|(flag, floor)| c.address == *flag && c.amount >= *floor)
            .map(|(flag, _)| *flag)
    })
}

/// First of `slots`, checked in order, whose output is `flag`.
fn flag_slot(outputs: &[Candidate], flag: &str, slots: &[usize]) -> Option<usize> {
    slots
        .iter()
        .copied()
        .find(|&i| outputs.get(i).is_some_and(|c| c.address == flag))
}

/// Identifier format rules, applied to the lower-cased id. Uniqueness is checked elsewhere.
pub fn id_is_valid_format(id: &str, protocol: &ProtocolConfig) -> bool {
    let id = id.to_lowercase();
    let len = id.chars().count();
    len >= protocol.id_min_length
        && len <= protocol.id_max_length
        && id.chars().all(|c| protocol.id_allowed_chars.contains(c))
}

/// First 8 hex characters of sha256 over the txid text.
pub fn short_tx_id(tx_id: &str) -> String {
    let digest = Sha256::digest(tx_id.as_bytes());
    hex::encode(&digest[..4])
}
