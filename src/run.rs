//! One publish run: schema, session, record, publish, close.

use crate::config::Settings;
use crate::error::PublishFailure;
use publish_broker::{BrokerClient, BrokerRouter, MessageId, PublisherSession};
use publish_core::Schema;
use tracing::info;

/// Run against the backend picked by the broker URI scheme.
pub fn run(settings: &Settings) -> Result<MessageId, PublishFailure> {
    let router = BrokerRouter::new(settings.kafka_settings());
    publish_once(settings, &router)
}

/// Publish one record through `client`.
///
/// The session is closed on every path; early returns close it on drop.
pub fn publish_once(
    settings: &Settings,
    client: &dyn BrokerClient,
) -> Result<MessageId, PublishFailure> {
    info!("Loading schema from {:?}", settings.schema_path);
    let schema = Schema::load(&settings.schema_path)?;
    info!(
        "Loaded schema {} with {} fields",
        schema.name(),
        schema.fields().len()
    );

    let mut session = PublisherSession::new(client).with_wire_format(settings.wire_format());

    info!("Connecting to {}", settings.broker_uri);
    session.open(&settings.broker_uri)?;

    info!("Creating producer for topic '{}'", settings.topic);
    session.create_producer(&settings.topic, schema)?;

    let record = settings.build_record();
    info!("Publishing record with {} fields", record.len());
    let id = session.publish_with(&record, &settings.message_meta())?;
    info!("Published message {}", id);

    session.close();
    info!("Session closed");
    Ok(id)
}
