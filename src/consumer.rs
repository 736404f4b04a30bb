use crate::client::{
    BrokerClient, BrokerConnector, KafkaClient, KafkaConnector, RawRecord, SeekPosition,
    TopicPartition,
};
use crate::error::{Error, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// Where a consumer starts reading when it has no prior position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetReset {
    /// Start from the beginning of each partition.
    #[default]
    Earliest,
    /// Start from the end, seeing only new messages.
    Latest,
}

impl OffsetReset {
    /// The librdkafka configuration value for this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }

    fn seek_position(&self) -> SeekPosition {
        match self {
            OffsetReset::Earliest => SeekPosition::Beginning,
            OffsetReset::Latest => SeekPosition::End,
        }
    }
}

/// Configuration for the JSON consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Topics to consume from.
    pub topics: Vec<String>,
    /// Kafka brokers (comma-separated list).
    pub brokers: String,
    /// Consumer group ID.
    ///
    /// Ignored when `use_assign` is set: manual assignment bypasses group
    /// coordination entirely.
    pub group_id: Option<String>,
    /// Client identifier reported to the brokers.
    pub client_id: String,
    /// Offset reset strategy when the group has no committed position.
    pub offset_reset: OffsetReset,
    /// Enable periodic offset auto commit (group mode only).
    pub enable_auto_commit: bool,
    /// How long a single poll waits for data, in milliseconds.
    ///
    /// A poll that times out ends iteration instead of blocking forever.
    pub poll_timeout_ms: u64,
    /// Assign all partitions of the configured topics explicitly instead
    /// of subscribing through a consumer group.
    pub use_assign: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            brokers: "localhost:9092".to_string(),
            group_id: None,
            client_id: "kafka-json-consumer".to_string(),
            offset_reset: OffsetReset::Earliest,
            enable_auto_commit: true,
            poll_timeout_ms: 1000,
            use_assign: false,
        }
    }
}

impl ConsumerConfig {
    /// The poll timeout as a [`Duration`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(Error::InvalidConfig(
                "topic list must not be empty".to_string(),
            ));
        }
        if self.brokers.is_empty() {
            return Err(Error::InvalidConfig("brokers must not be empty".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::InvalidConfig(
                "client_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A consumed Kafka message with its payload decoded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Kafka topic.
    pub topic: String,
    /// Kafka partition.
    pub partition: i32,
    /// Kafka offset.
    pub offset: i64,
    /// Broker-assigned timestamp (milliseconds since epoch, -1 if the
    /// broker assigned none).
    pub timestamp: i64,
    /// Message key decoded as UTF-8 text, if any.
    pub key: Option<String>,
    /// Message payload parsed as JSON, `None` for empty payloads.
    pub value: Option<serde_json::Value>,
}

impl Message {
    fn from_raw(raw: RawRecord) -> Result<Self> {
        Ok(Self {
            topic: raw.topic,
            partition: raw.partition,
            offset: raw.offset,
            timestamp: raw.timestamp.unwrap_or(-1),
            key: decode_key(raw.key.as_deref())?,
            value: decode_value(raw.payload.as_deref())?,
        })
    }
}

/// Decode a raw message payload.
///
/// An absent or empty payload decodes to `None`; anything else must be
/// valid UTF-8 JSON.
pub fn decode_value(raw: Option<&[u8]>) -> Result<Option<serde_json::Value>> {
    match raw {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
    }
}

/// Decode a raw message key as UTF-8 text.
///
/// An absent or empty key decodes to `None`. Keys are never JSON-parsed.
pub fn decode_key(raw: Option<&[u8]>) -> Result<Option<String>> {
    match raw {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => Ok(Some(std::str::from_utf8(bytes)?.to_string())),
    }
}

/// Kafka consumer that yields JSON-decoded messages.
///
/// Owns exactly one underlying client handle, created at construction and
/// released by [`Consumer::close`].
pub struct Consumer<C: BrokerClient> {
    client: C,
    config: ConsumerConfig,
}

impl Consumer<KafkaClient> {
    /// Connect to Kafka with the given configuration.
    pub fn connect(config: ConsumerConfig) -> Result<Self> {
        Self::open_with(&KafkaConnector, config)
    }
}

impl<C: BrokerClient> Consumer<C> {
    /// Open a consumer through an arbitrary connector.
    ///
    /// With `use_assign` unset, the client is opened subscribed to the
    /// configured topics and partition coordination is left entirely to
    /// the client's consumer group machinery.
    ///
    /// With `use_assign` set, a standalone client is opened with no
    /// consumer group, all current partitions of the configured topics are
    /// discovered and assigned in one call, and the assigned partitions
    /// are positioned once at the beginning or end per the offset reset
    /// policy. A topic without discoverable partitions contributes
    /// nothing; it is not an error.
    pub fn open_with<B>(connector: &B, config: ConsumerConfig) -> Result<Self>
    where
        B: BrokerConnector<Client = C>,
    {
        config.validate()?;

        if !config.use_assign {
            let client = connector.open_subscribed(&config)?;
            info!(
                "Subscribed to topics {:?} (group: {:?})",
                config.topics, config.group_id
            );
            return Ok(Self { client, config });
        }

        let mut client = connector.open_standalone(&config)?;

        let mut partitions = Vec::new();
        for topic in &config.topics {
            let partition_ids = client.partitions_for_topic(topic)?;
            if partition_ids.is_empty() {
                // Topic may not exist yet, or its metadata has not
                // propagated.
                debug!("No partitions discovered for topic {topic}");
                continue;
            }
            partitions.extend(partition_ids.into_iter().map(|partition| TopicPartition {
                topic: topic.clone(),
                partition,
            }));
        }

        if !partitions.is_empty() {
            client.assign(&partitions)?;
            client.seek_all(&partitions, config.offset_reset.seek_position())?;
            info!(
                "Assigned {} partitions across topics {:?}",
                partitions.len(),
                config.topics
            );
        }

        Ok(Self { client, config })
    }

    /// Get the config
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Receive the next message.
    ///
    /// Blocks up to the configured poll timeout. Returns `None` when the
    /// timeout elapses without data, ending iteration. Decode failures are
    /// fatal for the affected message and propagate; nothing is skipped or
    /// retried.
    pub async fn next(&mut self) -> Option<Result<Message>> {
        match self.client.poll().await? {
            Ok(raw) => Some(Message::from_raw(raw)),
            Err(e) => Some(Err(e)),
        }
    }

    /// Close the consumer and release the underlying client.
    ///
    /// Consumes the consumer, so closing twice or polling after close does
    /// not compile.
    pub fn close(mut self) {
        self.client.close();
    }
}
