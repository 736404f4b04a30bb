use crate::consumer::ConsumerConfig;
use crate::error::Result;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer as RdkafkaConsumer, StreamConsumer as RdkafkaStreamConsumer};
use rdkafka::message::Message as RdkafkaMessage;
use rdkafka::{Offset, TopicPartitionList};
use std::time::Duration;

/// Timeout for metadata and seek requests against the brokers.
const BROKER_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// One broker-side partition of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

/// Where assigned partitions are positioned before the first poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPosition {
    /// The earliest available offset of each partition.
    Beginning,
    /// The latest available offset of each partition.
    End,
}

/// A record as handed over by the underlying client, before any decoding.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Broker-assigned timestamp in milliseconds since epoch, if any.
    pub timestamp: Option<i64>,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

/// Capability interface over the underlying Kafka client.
///
/// The consumer facade drives everything through this trait, so partition
/// coordination, offset management, and network I/O stay inside the client
/// library. Tests substitute a recording implementation.
#[async_trait::async_trait]
pub trait BrokerClient: Send {
    /// List the current partition ids of a topic.
    ///
    /// Returns an empty list when the topic is unknown or its metadata is
    /// not yet available.
    fn partitions_for_topic(&self, topic: &str) -> Result<Vec<i32>>;

    /// Assign an explicit set of partitions to this client.
    fn assign(&mut self, partitions: &[TopicPartition]) -> Result<()>;

    /// Seek every given partition to the requested position.
    fn seek_all(&mut self, partitions: &[TopicPartition], position: SeekPosition) -> Result<()>;

    /// Receive the next raw record.
    ///
    /// Blocks up to the configured poll timeout. `None` means the timeout
    /// elapsed without data.
    async fn poll(&self) -> Option<Result<RawRecord>>;

    /// Release the client, including any group membership and background
    /// work it owns.
    fn close(&mut self);
}

/// Opens broker clients in one of the two binding modes.
pub trait BrokerConnector {
    type Client: BrokerClient;

    /// Open a client subscribed to the configured topics within the
    /// configured (optional) consumer group.
    fn open_subscribed(&self, config: &ConsumerConfig) -> Result<Self::Client>;

    /// Open a bare client with no subscription and no consumer group.
    ///
    /// Implementations must ignore `group_id`; partitions are assigned
    /// explicitly after opening.
    fn open_standalone(&self, config: &ConsumerConfig) -> Result<Self::Client>;
}

/// `rdkafka`-backed broker client.
pub struct KafkaClient {
    consumer: RdkafkaStreamConsumer,
    poll_timeout: Duration,
}

impl KafkaClient {
    fn base_config(config: &ConsumerConfig) -> ClientConfig {
        let mut kafka_config = ClientConfig::new();
        kafka_config
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("enable.partition.eof", "false");
        kafka_config
    }
}

#[async_trait::async_trait]
impl BrokerClient for KafkaClient {
    fn partitions_for_topic(&self, topic: &str) -> Result<Vec<i32>> {
        let metadata = self
            .consumer
            .fetch_metadata(Some(topic), BROKER_OP_TIMEOUT)?;
        // A topic-level error (e.g. unknown topic) yields no partitions
        // rather than a failure.
        let ids = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic && t.error().is_none())
            .map(|t| t.partitions().iter().map(|p| p.id()).collect())
            .unwrap_or_default();
        Ok(ids)
    }

    fn assign(&mut self, partitions: &[TopicPartition]) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        for tp in partitions {
            tpl.add_partition(&tp.topic, tp.partition);
        }
        self.consumer.assign(&tpl)?;
        Ok(())
    }

    fn seek_all(&mut self, partitions: &[TopicPartition], position: SeekPosition) -> Result<()> {
        let offset = match position {
            SeekPosition::Beginning => Offset::Beginning,
            SeekPosition::End => Offset::End,
        };
        for tp in partitions {
            self.consumer
                .seek(&tp.topic, tp.partition, offset, BROKER_OP_TIMEOUT)?;
        }
        Ok(())
    }

    async fn poll(&self) -> Option<Result<RawRecord>> {
        match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            Ok(Ok(message)) => Some(Ok(RawRecord {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                timestamp: message.timestamp().to_millis(),
                key: message.key().map(|k| k.to_vec()),
                payload: message.payload().map(|p| p.to_vec()),
            })),
            Ok(Err(e)) => Some(Err(e.into())),
            Err(_) => None, // Poll timeout, no data available right now
        }
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
    }
}

/// Connector that opens [`KafkaClient`]s.
pub struct KafkaConnector;

impl BrokerConnector for KafkaConnector {
    type Client = KafkaClient;

    fn open_subscribed(&self, config: &ConsumerConfig) -> Result<KafkaClient> {
        let mut kafka_config = KafkaClient::base_config(config);
        kafka_config
            .set("auto.offset.reset", config.offset_reset.as_str())
            .set("enable.auto.commit", config.enable_auto_commit.to_string());
        if let Some(group_id) = &config.group_id {
            kafka_config.set("group.id", group_id);
        }

        let consumer: RdkafkaStreamConsumer = kafka_config.create()?;
        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        Ok(KafkaClient {
            consumer,
            poll_timeout: config.poll_timeout(),
        })
    }

    fn open_standalone(&self, config: &ConsumerConfig) -> Result<KafkaClient> {
        // No group.id and no subscription: offsets are positioned by the
        // explicit seek after assignment, so auto.offset.reset is not set
        // either.
        let consumer: RdkafkaStreamConsumer = KafkaClient::base_config(config).create()?;

        Ok(KafkaClient {
            consumer,
            poll_timeout: config.poll_timeout(),
        })
    }
}
