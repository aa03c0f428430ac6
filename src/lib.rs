//! Indexer for the TWIST identity and data protocols, which carry payloads inside the data
//! segment of ordinary payment addresses.

pub mod address;
pub mod api;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod payload;
pub mod rpc;
pub mod state;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_support;

pub use address::AddressCodec;
pub use classifier::TransactionClassifier;
pub use engine::IndexerEngine;
pub use monitor::ScanScheduler;
pub use payload::PayloadAssembler;
