//! Core types for avro-publish.
//!
//! This crate owns everything that happens before a message reaches a
//! broker:
//!
//! - [`Schema`] - a flat Avro record schema loaded from an `.avsc` file
//! - [`Record`] / [`Value`] - the caller-built unit of data
//! - [`validate`] - record/schema conformance check producing a
//!   [`ValidatedRecord`] that encodes to Avro binary
//!
//! # Example
//!
//! ```rust
//! use publish_core::{validate, Record, Schema, WireFormat};
//!
//! let schema = Schema::parse_str(
//!     r#"{"type": "record", "name": "Reading", "fields": [
//!         {"name": "sensorType", "type": "string"},
//!         {"name": "readingValue", "type": "float"}
//!     ]}"#,
//! )
//! .unwrap();
//!
//! let record = Record::new()
//!     .with("sensorType", "temperature")
//!     .with("readingValue", 333);
//!
//! let validated = validate(&record, &schema).unwrap();
//! let payload = validated.encode(&schema, WireFormat::Raw).unwrap();
//! assert!(!payload.is_empty());
//! ```

pub mod encoder;
pub mod record;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use encoder::{validate, EncodingError, ValidatedRecord, WireFormat};
pub use record::{Record, Value};
pub use schema::{load, schema_path_from_location, FieldDefinition, FieldType, Schema, SchemaError};
