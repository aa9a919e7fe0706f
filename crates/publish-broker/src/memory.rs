//! In-process broker backend for the `memory://` scheme.
//!
//! Messages are appended to a per-topic log inside the process. Every
//! [`MemoryBroker`] clone shares the same state, so a test can hand one clone
//! to the session and inspect the log and handle counts through another.

use crate::client::{BrokerClient, Connection, MessageId, OutgoingMessage, Producer};
use crate::error::{BrokerError, Result};
use crate::uri::BrokerUri;
use publish_core::Schema;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const MEMORY_SCHEME: &str = "memory";

/// A message as stored by the in-process broker.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct TopicLog {
    /// Canonical form of the schema the topic is bound to
    schema: Option<String>,
    messages: Vec<StoredMessage>,
}

#[derive(Debug, Default)]
struct MemoryState {
    topics: HashMap<String, TopicLog>,
    unreachable: bool,
    fail_sends: bool,
    open_connections: usize,
    open_producers: usize,
    send_attempts: usize,
}

/// Shared handle to the in-process broker.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `connect` calls fail as if the host was down.
    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    /// Make subsequent sends fail after reaching the broker.
    pub fn set_fail_sends(&self, fail: bool) {
        lock(&self.state).fail_sends = fail;
    }

    pub fn open_connections(&self) -> usize {
        lock(&self.state).open_connections
    }

    pub fn open_producers(&self) -> usize {
        lock(&self.state).open_producers
    }

    /// Number of times any producer tried to send, successful or not.
    pub fn send_attempts(&self) -> usize {
        lock(&self.state).send_attempts
    }

    /// Messages stored on `topic`, oldest first.
    pub fn messages(&self, topic: &str) -> Vec<StoredMessage> {
        lock(&self.state)
            .topics
            .get(topic)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    /// Canonical schema the topic is bound to, if any producer was created on it.
    pub fn topic_schema(&self, topic: &str) -> Option<String> {
        lock(&self.state)
            .topics
            .get(topic)
            .and_then(|log| log.schema.clone())
    }
}

impl BrokerClient for MemoryBroker {
    fn connect(&self, uri: &BrokerUri) -> Result<Box<dyn Connection>> {
        if uri.scheme() != MEMORY_SCHEME {
            return Err(BrokerError::UnsupportedScheme(uri.scheme().to_string()));
        }

        let mut state = lock(&self.state);
        if state.unreachable {
            return Err(BrokerError::Unreachable(uri.hosts().join(",")));
        }
        state.open_connections += 1;
        debug!("Opened in-memory connection to {}", uri);

        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl Connection for MemoryConnection {
    fn create_producer(&mut self, topic: &str, schema: &Schema) -> Result<Box<dyn Producer>> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let canonical = schema.canonical_form();
        let mut state = lock(&self.state);
        let log = state.topics.entry(topic.to_string()).or_default();
        let bound = log.schema.get_or_insert_with(|| canonical.clone());
        if *bound != canonical {
            return Err(BrokerError::SchemaRejected(format!(
                "topic '{topic}' is bound to a different schema"
            )));
        }
        state.open_producers += 1;

        Ok(Box::new(MemoryProducer {
            state: Arc::clone(&self.state),
            topic: topic.to_string(),
            closed: false,
        }))
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).open_connections -= 1;
        }
        Ok(())
    }
}

struct MemoryProducer {
    state: Arc<Mutex<MemoryState>>,
    topic: String,
    closed: bool,
}

impl Producer for MemoryProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn send(&mut self, message: &OutgoingMessage) -> Result<MessageId> {
        if self.closed {
            return Err(BrokerError::Closed);
        }

        let mut state = lock(&self.state);
        state.send_attempts += 1;
        if state.fail_sends {
            return Err(BrokerError::Delivery(format!(
                "broker refused message on '{}'",
                self.topic
            )));
        }

        let log = state.topics.entry(self.topic.clone()).or_default();
        let id = MessageId::new(format!("{}:0:{}", self.topic, log.messages.len()));
        log.messages.push(StoredMessage {
            id: id.clone(),
            key: message.key.clone(),
            payload: message.payload.clone(),
            properties: message.properties.clone(),
        });
        Ok(id)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            lock(&self.state).open_producers -= 1;
        }
        Ok(())
    }
}
