use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed JSON message payload: {0}")]
    ValueDecode(#[from] serde_json::Error),

    #[error("Message key is not valid UTF-8: {0}")]
    KeyDecode(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;
