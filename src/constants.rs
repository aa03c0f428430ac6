/// Protocol Constants
///
/// Default values for every fixed parameter of the identity and data protocols.
/// `ProtocolConfig::default()` is built from these; deployments may override any
/// of them through configuration, but the defaults are what wallets emit.

/// Flag output marking an identity registration ("TwistIdRegistration").
pub const REGISTRATION_ADDRESS: &str = "18hcozxYBgHywr9eUYHmeUnJEkhyWyoBdy";
pub const REGISTRATION_FEE: f64 = 10.0;

/// Flag output marking an identity-to-identity payment without text ("TwistIdSendStandard").
pub const MESSAGE_STANDARD_ADDRESS: &str = "18hcozxYBgHzVTqeMR7F3UVtQ8L3i3VusE";
pub const MESSAGE_STANDARD_FEE: f64 = 0.1;

/// Flag output marking an identity-to-identity payment carrying text ("TwistIdSendMessage").
pub const MESSAGE_WITH_TEXT_ADDRESS: &str = "18hcozxYBgHzVTqeLuqjav3woKBgzhvbJS";
pub const MESSAGE_WITH_TEXT_FEE: f64 = 0.5;

/// Share of the nominal fee an identity-shaped transaction must pay.
pub const IDENTITY_FEE_FLOOR: f64 = 0.98;

/// Flag outputs for data transactions ("TwistDataPrivate" / "TwistDataShareable").
pub const DATA_PRIVATE_ADDRESS: &str = "18hcozxYAm5q9NYVQKfFRAdmPpKdWEdsmv";
pub const DATA_SHAREABLE_ADDRESS: &str = "18hcozxYAm5q9NdJ4KGwwaEdK3Y2ABpZnd";
pub const DATA_BASELINE_FEE: f64 = 1.0;

/// Share of the baseline fee a data transaction must pay.
pub const DATA_FEE_FLOOR: f64 = 0.90;

/// Transactions with fewer outputs cannot carry any protocol payload.
pub const MIN_PROTOCOL_OUTPUTS: usize = 10;

pub const ID_MIN_LENGTH: usize = 3;
/// One address worth of bytes.
pub const ID_MAX_LENGTH: usize = 20;
pub const ID_ALLOWED_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// Length of the base64 text of a registered public key (32 raw bytes).
pub const PUBLIC_KEY_B64_LENGTH: usize = 44;
/// Length of the base64 text of a registered, encrypted private key (104 raw bytes).
pub const PRIVATE_KEY_B64_LENGTH: usize = 140;

pub const DATA_OWNER_LENGTH: usize = 20;
pub const DATA_MIN_PAYLOAD_LENGTH: usize = 5;

/// First block that can hold an identity registration or payment.
pub const IDENTITY_GENESIS_HEIGHT: u64 = 1;
/// First block that can hold a data transaction.
pub const DATA_GENESIS_HEIGHT: u64 = 1;

/// Seconds between chain height polls.
pub const BLOCK_SEARCH_INTERVAL_SECS: u64 = 10;

/// Progress is logged once per this many blocks (and on the last block of a pass).
pub const PROGRESS_LOG_INTERVAL: u64 = 5000;
