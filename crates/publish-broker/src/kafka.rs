//! Kafka backend for the `kafka://` scheme.
//!
//! Uses a synchronous rdkafka [`BaseProducer`]. Each `send` enqueues one
//! record and flushes, so the call returns only once the delivery report for
//! that record has arrived.

use crate::client::{BrokerClient, Connection, MessageId, OutgoingMessage, Producer};
use crate::error::{BrokerError, Result};
use crate::uri::BrokerUri;
use publish_core::Schema;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, Message, OwnedHeaders};
use rdkafka::producer::{
    BaseProducer, BaseRecord, DeliveryResult, Producer as _, ProducerContext,
};
use rdkafka::ClientContext;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const KAFKA_SCHEME: &str = "kafka";

/// Header carrying the Avro schema full name on every message.
pub const SCHEMA_HEADER: &str = "avro.schema.name";

/// Settings applied to every Kafka connection.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    /// Extra librdkafka properties, applied after the defaults
    pub client_config: BTreeMap<String, String>,

    /// Metadata and delivery timeout
    pub timeout: Duration,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            client_config: BTreeMap::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Records the outcome of the most recent delivery.
#[derive(Default)]
pub struct DeliveryContext {
    outcome: Mutex<Option<std::result::Result<MessageId, String>>>,
}

impl DeliveryContext {
    fn reset(&self) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn take(&self) -> Option<std::result::Result<MessageId, String>> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let outcome = match result {
            Ok(message) => Ok(MessageId::new(format!(
                "{}:{}:{}",
                message.topic(),
                message.partition(),
                message.offset()
            ))),
            Err((err, _)) => Err(err.to_string()),
        };
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }
}

/// Headers for one message: the schema name first, then the properties.
fn message_headers(schema_name: &str, properties: &BTreeMap<String, String>) -> OwnedHeaders {
    properties.iter().fold(
        OwnedHeaders::new().insert(Header {
            key: SCHEMA_HEADER,
            value: Some(schema_name),
        }),
        |headers, (key, value)| {
            headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            })
        },
    )
}

type KafkaProducerHandle = Arc<BaseProducer<DeliveryContext>>;

/// Client for Kafka clusters.
#[derive(Debug, Clone, Default)]
pub struct KafkaClient {
    settings: KafkaSettings,
}

impl KafkaClient {
    pub fn new(settings: KafkaSettings) -> Self {
        Self { settings }
    }

    fn client_config(&self, bootstrap: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", bootstrap)
            .set(
                "message.timeout.ms",
                self.settings.timeout.as_millis().to_string(),
            );
        for (key, value) in &self.settings.client_config {
            config.set(key, value);
        }
        config
    }
}

impl BrokerClient for KafkaClient {
    fn connect(&self, uri: &BrokerUri) -> Result<Box<dyn Connection>> {
        if uri.scheme() != KAFKA_SCHEME {
            return Err(BrokerError::UnsupportedScheme(uri.scheme().to_string()));
        }

        let bootstrap = uri.hosts().join(",");
        let producer: BaseProducer<DeliveryContext> = self
            .client_config(&bootstrap)
            .create_with_context(DeliveryContext::default())?;

        // librdkafka connects lazily; fetching metadata proves the cluster answers.
        let metadata = producer
            .client()
            .fetch_metadata(None, self.settings.timeout)
            .map_err(|e| BrokerError::Unreachable(format!("{bootstrap}: {e}")))?;
        info!(
            "Connected to Kafka at {} ({} brokers)",
            bootstrap,
            metadata.brokers().len()
        );

        Ok(Box::new(KafkaConnection {
            producer: Some(Arc::new(producer)),
            timeout: self.settings.timeout,
        }))
    }
}

struct KafkaConnection {
    producer: Option<KafkaProducerHandle>,
    timeout: Duration,
}

impl Connection for KafkaConnection {
    fn create_producer(&mut self, topic: &str, schema: &Schema) -> Result<Box<dyn Producer>> {
        let producer = self.producer.as_ref().ok_or(BrokerError::Closed)?;

        let metadata = producer
            .client()
            .fetch_metadata(Some(topic), self.timeout)
            .map_err(|e| BrokerError::TopicRejected(format!("{topic}: {e}")))?;
        let entry = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| BrokerError::TopicRejected(format!("{topic}: not in metadata")))?;
        if let Some(err) = entry.error() {
            return Err(BrokerError::TopicRejected(format!("{topic}: {err:?}")));
        }
        debug!(
            "Topic '{}' has {} partitions",
            topic,
            entry.partitions().len()
        );

        Ok(Box::new(KafkaProducer {
            producer: Some(Arc::clone(producer)),
            topic: topic.to_string(),
            schema_name: schema.name().to_string(),
            timeout: self.timeout,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.producer.take();
        Ok(())
    }
}

struct KafkaProducer {
    producer: Option<KafkaProducerHandle>,
    topic: String,
    schema_name: String,
    timeout: Duration,
}

impl Producer for KafkaProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn send(&mut self, message: &OutgoingMessage) -> Result<MessageId> {
        let producer = self.producer.as_ref().ok_or(BrokerError::Closed)?;

        let headers = message_headers(&self.schema_name, &message.properties);
        let mut record: BaseRecord<'_, [u8], [u8]> = BaseRecord::to(&self.topic)
            .payload(message.payload.as_slice())
            .headers(headers);
        if let Some(key) = &message.key {
            record = record.key(key.as_bytes());
        }

        producer.context().reset();
        producer
            .send(record)
            .map_err(|(err, _)| BrokerError::Delivery(err.to_string()))?;
        producer.flush(self.timeout)?;

        match producer.context().take() {
            Some(Ok(id)) => Ok(id),
            Some(Err(reason)) => Err(BrokerError::Delivery(reason)),
            None => Err(BrokerError::Delivery(format!(
                "no delivery report for '{}' within {:?}",
                self.topic, self.timeout
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(producer) = self.producer.take() {
            if let Err(e) = producer.flush(self.timeout) {
                warn!("Pending messages on '{}' not flushed: {}", self.topic, e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}
