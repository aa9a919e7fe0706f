//! Error types for broker operations.

use thiserror::Error;

/// Errors reported by a broker backend.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Invalid broker URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unsupported broker scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Broker unreachable: {0}")]
    Unreachable(String),

    #[error("Topic rejected: {0}")]
    TopicRejected(String),

    #[error("Schema rejected: {0}")]
    SchemaRejected(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Handle already closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, BrokerError>;
