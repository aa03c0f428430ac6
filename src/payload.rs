//! Reassembles identifiers, keys, messages and data blobs from ordered burn-address sequences.

use crate::address::{trim_trailing_zeros, AddressCodec};
use crate::types::DataKind;

const BASE64_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPayload {
    pub id: String,
    pub pub_key: String,
    pub priv_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePayload {
    pub sender_id: String,
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub owner: Vec<u8>,
    pub initial_payload: Vec<u8>,
    pub kind: DataKind,
}

#[derive(Debug, Clone)]
pub struct PayloadAssembler {
    codec: AddressCodec,
    id_chars: String,
}

impl PayloadAssembler {
    pub fn new(codec: AddressCodec, id_chars: impl Into<String>) -> Self {
        Self {
            codec,
            id_chars: id_chars.into(),
        }
    }

    /// Decoded payload of one address; an undecodable address carries nothing.
    fn payload_of(&self, address: &str) -> Vec<u8> {
        self.codec
            .decode(address)
            .map(|payload| payload.to_vec())
            .unwrap_or_default()
    }

    fn concat(&self, addresses: &[String]) -> Vec<u8> {
        addresses
            .iter()
            .flat_map(|address| self.payload_of(address))
            .collect()
    }

    /// Longest prefix of `payload` made only of identifier characters.
    pub fn purify(&self, payload: &[u8]) -> String {
        payload
            .iter()
            .map(|&b| b as char)
            .take_while(|c| self.id_chars.contains(*c))
            .collect()
    }

    fn purified_first(&self, addresses: &[String]) -> String {
        addresses
            .first()
            .map(|address| self.purify(&self.payload_of(address)))
            .unwrap_or_default()
    }

    /// `[0]` id, `[1..5]` public key, `[5..]` private key.
    pub fn assemble_registration(&self, addresses: &[String]) -> RegistrationPayload {
        let pub_end = addresses.len().min(5);
        let pub_start = addresses.len().min(1);
        RegistrationPayload {
            id: self.purified_first(addresses),
            pub_key: strip_non_base64(&self.concat(&addresses[pub_start..pub_end])),
            priv_key: strip_non_base64(&self.concat(&addresses[pub_end..])),
        }
    }

    /// `[0]` sender id, `[1..]` base64 text of the (encrypted) message.
    pub fn assemble_message(&self, addresses: &[String]) -> MessagePayload {
        let rest = addresses.get(1..).unwrap_or_default();
        let text = strip_non_base64(&self.concat(rest));
        MessagePayload {
            sender_id: self.purified_first(addresses),
            message: decode_base64_lenient(&text),
        }
    }

    /// `[0]` owner (full 20 bytes), `[1..]` initial payload with padding trimmed.
    pub fn assemble_data_record(&self, addresses: &[String], kind: DataKind) -> DataPayload {
        let owner = addresses
            .first()
            .map(|address| self.payload_of(address))
            .unwrap_or_default();
        let rest = addresses.get(1..).unwrap_or_default();
        let initial_payload = trim_trailing_zeros(&self.concat(rest)).to_vec();
        DataPayload {
            owner,
            initial_payload,
            kind,
        }
    }
}

/// Keep only base64 alphabet characters (padding `=` included), in order.
pub fn strip_non_base64(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| b as char)
        .filter(|c| BASE64_CHARS.contains(*c))
        .collect()
}

/// Decode whatever the text carries: padding is dropped wherever it appears, as is a dangling
/// final symbol that cannot complete a byte.
fn decode_base64_lenient(text: &str) -> Vec<u8> {
    let mut symbols: String = text.chars().filter(|&c| c != '=').collect();
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }
    let config = base64::STANDARD_NO_PAD.decode_allow_trailing_bits(true);
    base64::decode_config(&symbols, config).unwrap_or_default()
}
