//! Top-level failure type and exit-code mapping.

use crate::config::ConfigError;
use publish_broker::SessionError;
use publish_core::SchemaError;
use thiserror::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_SCHEMA: i32 = 10;
pub const EXIT_CONNECT: i32 = 20;
pub const EXIT_PRODUCER_CREATE: i32 = 30;
pub const EXIT_ENCODING: i32 = 40;
pub const EXIT_PUBLISH: i32 = 50;
pub const EXIT_INTERNAL: i32 = 70;

/// Anything that stops a publish run.
#[derive(Error, Debug)]
pub enum PublishFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl PublishFailure {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PublishFailure::Config(_) => EXIT_CONFIG,
            PublishFailure::Schema(_) => EXIT_SCHEMA,
            PublishFailure::Session(e) => match e {
                SessionError::Connect(_) => EXIT_CONNECT,
                SessionError::ProducerCreate(_) => EXIT_PRODUCER_CREATE,
                SessionError::Encoding(_) => EXIT_ENCODING,
                SessionError::Publish(_) => EXIT_PUBLISH,
                SessionError::InvalidState { .. } => EXIT_INTERNAL,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use publish_broker::{BrokerError, SessionState};
    use publish_core::EncodingError;

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let failures = [
            PublishFailure::Config(ConfigError::Missing("topic")),
            PublishFailure::Schema(SchemaError::Parse("bad".to_string())),
            SessionError::Connect(BrokerError::Unreachable("h".to_string())).into(),
            SessionError::ProducerCreate(BrokerError::Closed).into(),
            SessionError::Encoding(EncodingError::MissingField("f".to_string())).into(),
            SessionError::Publish(BrokerError::Delivery("x".to_string())).into(),
            SessionError::InvalidState {
                operation: "publish",
                state: SessionState::Closed,
            }
            .into(),
        ];
        let codes: Vec<i32> = failures.iter().map(PublishFailure::exit_code).collect();
        assert_eq!(codes, vec![2, 10, 20, 30, 40, 50, 70]);
        assert!(!codes.contains(&EXIT_OK));
    }

    #[test]
    fn test_schema_failure_message() {
        let failure = PublishFailure::Schema(SchemaError::Parse("no fields".to_string()));
        assert_eq!(failure.to_string(), "Failed to parse schema: no fields");
    }
}
