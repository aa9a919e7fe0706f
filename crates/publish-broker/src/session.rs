//! Publisher session lifecycle.
//!
//! A [`PublisherSession`] walks through
//! `Unconnected -> Connected -> ProducerReady -> Closed`. Any failure while
//! opening or creating the producer moves it to `Failed`. Operations called
//! in the wrong state return [`SessionError::InvalidState`] without touching
//! the broker.

use crate::client::{BrokerClient, Connection, MessageId, OutgoingMessage, Producer};
use crate::error::BrokerError;
use crate::uri::BrokerUri;
use publish_core::{validate, EncodingError, Record, Schema, WireFormat};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    ProducerReady,
    Closed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connected => "connected",
            SessionState::ProducerReady => "producer-ready",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors returned by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] BrokerError),

    #[error("Failed to create producer: {0}")]
    ProducerCreate(#[source] BrokerError),

    #[error("Record rejected: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Failed to publish message: {0}")]
    Publish(#[source] BrokerError),

    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// Outcome of a single publish.
pub type PublishResult = Result<MessageId, SessionError>;

/// Optional per-message metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMeta {
    pub key: Option<String>,
    pub properties: BTreeMap<String, String>,
}

impl MessageMeta {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// One connection plus at most one producer, released together.
pub struct PublisherSession<'a> {
    client: &'a dyn BrokerClient,
    state: SessionState,
    wire_format: WireFormat,
    connection: Option<Box<dyn Connection>>,
    producer: Option<Box<dyn Producer>>,
    schema: Option<Schema>,
}

impl<'a> PublisherSession<'a> {
    pub fn new(client: &'a dyn BrokerClient) -> Self {
        Self {
            client,
            state: SessionState::Unconnected,
            wire_format: WireFormat::Raw,
            connection: None,
            producer: None,
            schema: None,
        }
    }

    /// Frame payloads with `format` instead of plain Avro binary.
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Schema the producer is bound to, once created.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.producer.as_ref().map(|p| p.topic())
    }

    /// Connect to the broker named by `uri`.
    pub fn open(&mut self, uri: &str) -> Result<(), SessionError> {
        self.require(SessionState::Unconnected, "open")?;

        let parsed = match BrokerUri::parse(uri) {
            Ok(parsed) => parsed,
            Err(e) => return Err(self.fail(SessionError::Connect(e))),
        };

        match self.client.connect(&parsed) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.state = SessionState::Connected;
                info!("Connected to {}", parsed);
                Ok(())
            }
            Err(e) => Err(self.fail(SessionError::Connect(e))),
        }
    }

    /// Create the producer for `topic`, bound to `schema`.
    pub fn create_producer(&mut self, topic: &str, schema: Schema) -> Result<(), SessionError> {
        self.require(SessionState::Connected, "create a producer")?;

        if topic.trim().is_empty() {
            return Err(self.fail(SessionError::ProducerCreate(BrokerError::TopicRejected(
                "topic name is empty".to_string(),
            ))));
        }

        let result = match self.connection.as_mut() {
            Some(connection) => connection.create_producer(topic, &schema),
            None => return Err(self.invalid_state("create a producer")),
        };

        match result {
            Ok(producer) => {
                info!("Producer ready on '{}' with schema {}", topic, schema.name());
                self.producer = Some(producer);
                self.schema = Some(schema);
                self.state = SessionState::ProducerReady;
                Ok(())
            }
            Err(e) => Err(self.fail(SessionError::ProducerCreate(e))),
        }
    }

    /// Validate, encode and send one record.
    pub fn publish(&mut self, record: &Record) -> PublishResult {
        self.publish_with(record, &MessageMeta::default())
    }

    /// Like [`publish`](Self::publish) with a key and properties attached.
    ///
    /// Encoding failures are reported before anything reaches the broker.
    /// Transport failures leave the session usable; there is no retry.
    pub fn publish_with(&mut self, record: &Record, meta: &MessageMeta) -> PublishResult {
        self.require(SessionState::ProducerReady, "publish")?;

        let state = self.state;
        let invalid = move || SessionError::InvalidState {
            operation: "publish",
            state,
        };
        let schema = self.schema.as_ref().ok_or_else(invalid)?;
        let producer = self.producer.as_mut().ok_or_else(invalid)?;

        let payload = validate(record, schema)?.encode(schema, self.wire_format)?;
        let message = OutgoingMessage {
            key: meta.key.clone(),
            payload,
            properties: meta.properties.clone(),
        };

        let id = producer.send(&message).map_err(SessionError::Publish)?;
        debug!(
            "Published {} bytes to '{}' as {}",
            message.payload.len(),
            producer.topic(),
            id
        );
        Ok(id)
    }

    /// Release the producer, then the connection.
    ///
    /// Safe to call in any state and any number of times. Release failures
    /// are logged and do not stop the remaining releases.
    pub fn close(&mut self) {
        if let Some(mut producer) = self.producer.take() {
            if let Err(e) = producer.close() {
                warn!("Failed to close producer on '{}': {}", producer.topic(), e);
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                warn!("Failed to close connection: {}", e);
            }
        }
        if self.state != SessionState::Failed && self.state != SessionState::Closed {
            debug!("Session closed from state {}", self.state);
            self.state = SessionState::Closed;
        }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        self.state = SessionState::Failed;
        err
    }
}

impl Drop for PublisherSession<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
