//! Scheme-based dispatch between broker backends.

use crate::client::{BrokerClient, Connection};
use crate::error::{BrokerError, Result};
use crate::kafka::{KafkaClient, KafkaSettings, KAFKA_SCHEME};
use crate::memory::{MemoryBroker, MEMORY_SCHEME};
use crate::uri::BrokerUri;

/// Routes `connect` to the backend named by the URI scheme.
#[derive(Debug, Clone, Default)]
pub struct BrokerRouter {
    kafka: KafkaClient,
    memory: MemoryBroker,
}

impl BrokerRouter {
    pub fn new(kafka: KafkaSettings) -> Self {
        Self {
            kafka: KafkaClient::new(kafka),
            memory: MemoryBroker::new(),
        }
    }

    /// Use an existing in-process broker for `memory://` URIs.
    pub fn with_memory(mut self, memory: MemoryBroker) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &MemoryBroker {
        &self.memory
    }
}

impl BrokerClient for BrokerRouter {
    fn connect(&self, uri: &BrokerUri) -> Result<Box<dyn Connection>> {
        match uri.scheme() {
            KAFKA_SCHEME => self.kafka.connect(uri),
            MEMORY_SCHEME => self.memory.connect(uri),
            other => Err(BrokerError::UnsupportedScheme(other.to_string())),
        }
    }
}
