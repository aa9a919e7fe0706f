//! The broker client seam.
//!
//! A backend implements [`BrokerClient`], which hands out a [`Connection`],
//! which in turn creates one [`Producer`] per topic/schema pair. Handles are
//! released explicitly with `close()`; the session guarantees the order.

use crate::error::Result;
use crate::uri::BrokerUri;
use publish_core::Schema;
use std::collections::BTreeMap;
use std::fmt;

/// Broker-assigned identifier of a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An encoded message ready for the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    /// Message key (partitioning key on Kafka)
    pub key: Option<String>,

    /// Encoded payload
    pub payload: Vec<u8>,

    /// String properties, sent as message headers
    pub properties: BTreeMap<String, String>,
}

/// Entry point of a broker backend.
pub trait BrokerClient {
    /// Establish a connection to the cluster named by `uri`.
    fn connect(&self, uri: &BrokerUri) -> Result<Box<dyn Connection>>;
}

/// An open connection to a broker cluster.
pub trait Connection: Send {
    /// Create a producer bound to `topic` and `schema`.
    fn create_producer(&mut self, topic: &str, schema: &Schema) -> Result<Box<dyn Producer>>;

    /// Release the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// A producer bound to one topic and schema.
pub trait Producer: Send {
    fn topic(&self) -> &str;

    /// Send one message and wait for the broker to acknowledge it.
    fn send(&mut self, message: &OutgoingMessage) -> Result<MessageId>;

    /// Release the producer. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}
