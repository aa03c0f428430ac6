// address.rs
//
// Checksummed base58 codec for the 20-byte data segment of an address.
//
// Layout of the encoded value (25 bytes, big-endian):
//   [version:1][payload:20, zero-padded on the right][checksum:4]
// checksum = first 4 bytes of sha256(sha256(version || payload)).

use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// Bytes carried by one address.
pub const PAYLOAD_LEN: usize = 20;
/// Version byte plus payload.
const BUFFER_LEN: usize = PAYLOAD_LEN + 1;
const CHECKSUM_LEN: usize = 4;
const RAW_LEN: usize = BUFFER_LEN + CHECKSUM_LEN;

/// Shortest string `decode` will look at.
pub const MIN_ADDRESS_LEN: usize = 26;
/// First characters accepted by `decode` unless configured otherwise.
pub const DEFAULT_VERSION_MARKERS: &str = "13W";

pub type Payload = [u8; PAYLOAD_LEN];

pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(&first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

fn checksum(buffer: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = sha256d(buffer);
    let mut sum = [0u8; CHECKSUM_LEN];
    sum.copy_from_slice(&hash[..CHECKSUM_LEN]);
    sum
}

fn leading_zero_bytes(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| b == 0).count()
}

#[derive(Debug, Clone)]
pub struct AddressCodec {
    version_markers: String,
}

impl Default for AddressCodec {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION_MARKERS)
    }
}

impl AddressCodec {
    pub fn new(version_markers: impl Into<String>) -> Self {
        Self {
            version_markers: version_markers.into(),
        }
    }

    /// Encode up to 20 bytes as an address. Longer input is truncated.
    ///
    /// Every leading zero byte (the version byte included) becomes a literal `'1'`,
    /// so an all-zero payload encodes with 21 leading `'1'` characters.
    pub fn encode(&self, payload: &[u8]) -> String {
        let len = payload.len().min(PAYLOAD_LEN);
        let mut raw = [0u8; RAW_LEN];
        raw[1..1 + len].copy_from_slice(&payload[..len]);

        let sum = checksum(&raw[..BUFFER_LEN]);
        raw[BUFFER_LEN..].copy_from_slice(&sum);

        bs58::encode(&raw).into_string()
    }

    /// Decode an address back to its 20-byte payload.
    ///
    /// Trailing zero bytes embedded by `encode` are left in place.
    pub fn decode(&self, address: &str) -> Result<Payload, CodecError> {
        if address.len() < MIN_ADDRESS_LEN {
            return Err(CodecError::TooShort { len: address.len() });
        }
        let marker = address.chars().next().unwrap_or_default();
        if !self.version_markers.contains(marker) {
            return Err(CodecError::VersionMarker(marker));
        }

        let decoded = bs58::decode(address)
            .into_vec()
            .map_err(|e| CodecError::InvalidBase58(e.to_string()))?;

        // bs58 turns every leading '1' into a zero byte; only the significant bytes matter here.
        let significant = &decoded[leading_zero_bytes(&decoded)..];
        if significant.len() > RAW_LEN {
            return Err(CodecError::Overflow { max: RAW_LEN });
        }
        let mut raw = [0u8; RAW_LEN];
        raw[RAW_LEN - significant.len()..].copy_from_slice(significant);

        let (buffer, claimed) = raw.split_at(BUFFER_LEN);
        if checksum(buffer) != claimed {
            return Err(CodecError::Checksum);
        }

        let zero_bytes = leading_zero_bytes(&buffer[1..]);
        let padding = address.chars().skip(1).take_while(|&c| c == '1').count();
        if zero_bytes != padding {
            return Err(CodecError::Padding { padding, zero_bytes });
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buffer[1..]);
        Ok(payload)
    }

    pub fn is_valid(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }

    /// Split `text` into 20-byte chunks and encode each one.
    ///
    /// With `end_with_newline`, text longer than one address that has no newline
    /// gets a trailing `'\n'` so readers can tell where it stops.
    pub fn encode_text(&self, text: &str, end_with_newline: bool) -> Vec<String> {
        let mut bytes = text.as_bytes().to_vec();
        if end_with_newline && bytes.len() > PAYLOAD_LEN && !bytes.contains(&b'\n') {
            bytes.push(b'\n');
        }
        if bytes.is_empty() {
            return vec![self.encode(&[])];
        }
        bytes.chunks(PAYLOAD_LEN).map(|chunk| self.encode(chunk)).collect()
    }
}

/// Drop zero bytes from the end of a decoded payload.
pub fn trim_trailing_zeros(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}
