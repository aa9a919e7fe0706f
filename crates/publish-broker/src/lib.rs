//! Broker side of avro-publish.
//!
//! - [`BrokerClient`] / [`Connection`] / [`Producer`] - the transport seam
//! - [`KafkaClient`] - `kafka://host:port[,host:port]` via rdkafka
//! - [`MemoryBroker`] - `memory://name`, an in-process log for tests and dry runs
//! - [`BrokerRouter`] - picks the backend from the URI scheme
//! - [`PublisherSession`] - connection and producer lifecycle around a schema

pub mod client;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod router;
pub mod session;
pub mod uri;

pub use client::{BrokerClient, Connection, MessageId, OutgoingMessage, Producer};
pub use error::{BrokerError, Result};
pub use kafka::{KafkaClient, KafkaSettings, KAFKA_SCHEME, SCHEMA_HEADER};
pub use memory::{MemoryBroker, StoredMessage, MEMORY_SCHEME};
pub use router::BrokerRouter;
pub use session::{MessageMeta, PublishResult, PublisherSession, SessionError, SessionState};
pub use uri::BrokerUri;
