//! Kafka consumer library that yields messages with JSON-decoded payloads
//! as plain records.
//!
//! Features:
//!
//! - JSON Deserialization: message payloads are parsed into [`serde_json::Value`], keys into UTF-8 text
//! - Consumer Groups: subscribe to topics and let the broker coordinate partitions across group members
//! - Manual Assignment: assign all partitions of the configured topics explicitly, bypassing group coordination
//!
//! All partition management, offset bookkeeping, group coordination, and
//! network I/O are delegated to the underlying client; this crate is a thin
//! configuration and decoding layer on top of it.

/// Capability interface over the broker client, and its `rdkafka` binding
///
/// The consumer facade only talks to the client through this interface,
/// which is what keeps the facade testable without a live broker.
pub mod client;

/// The consumer facade: configuration, decoding, and iteration
pub mod consumer;
pub mod error;

// Re-export main types for easy access
pub use client::{
    BrokerClient, BrokerConnector, KafkaClient, KafkaConnector, RawRecord, SeekPosition,
    TopicPartition,
};
pub use consumer::{decode_key, decode_value, Consumer, ConsumerConfig, Message, OffsetReset};
pub use error::{Error, Result};
