//! Configuration for a publish run.
//!
//! Values come from three layers, highest priority first:
//!
//! 1. command-line flags
//! 2. `AVRO_PUBLISH_*` environment variables
//! 3. the TOML file named by `--config`
//!
//! `broker_uri`, `schema_path` and `topic` have no defaults. A run without
//! any one of them fails with [`ConfigError::Missing`].

use crate::sample;
use clap::Parser;
use publish_broker::{KafkaSettings, MessageMeta};
use publish_core::{schema_path_from_location, Record, Value, WireFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required setting '{0}' (config file, flag or environment)")]
    Missing(&'static str),

    #[error("Invalid {kind} '{input}': expected NAME=VALUE")]
    InvalidAssignment { kind: &'static str, input: String },

    #[error("Unsupported value for record field '{field}': {reason}")]
    UnsupportedValue { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Command line
// ============================================================================

/// Publish one schema-validated Avro record to a broker.
///
/// Without `[record]` in the config file the fixed warning-sensor reading is
/// published. `--field` overrides individual fields either way.
#[derive(Parser, Debug, Default)]
#[command(name = "avro-publish", version, about)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "AVRO_PUBLISH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Broker URI, e.g. kafka://localhost:9092 or memory://local
    #[arg(long, env = "AVRO_PUBLISH_BROKER_URI", value_name = "URI")]
    pub broker_uri: Option<String>,

    /// Avro schema file (.avsc), plain path or file:// location
    #[arg(long, env = "AVRO_PUBLISH_SCHEMA_PATH", value_name = "PATH")]
    pub schema_path: Option<String>,

    /// Topic to publish to
    #[arg(long, env = "AVRO_PUBLISH_TOPIC")]
    pub topic: Option<String>,

    /// Registry schema id; enables the 5-byte registry framing
    #[arg(long, env = "AVRO_PUBLISH_SCHEMA_ID")]
    pub schema_id: Option<u32>,

    /// Message key
    #[arg(long)]
    pub key: Option<String>,

    /// Record field, VALUE read as a TOML literal (repeatable)
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Message property sent as a header (repeatable)
    #[arg(long = "property", value_name = "NAME=VALUE")]
    pub properties: Vec<String>,

    /// Broker operation timeout in milliseconds [default: 5000]
    #[arg(long, env = "AVRO_PUBLISH_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,
}

// ============================================================================
// Config file
// ============================================================================

/// Contents of the TOML config file. Every key is optional here; required
/// values are checked after merging with the command line.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub broker_uri: Option<String>,
    pub schema_path: Option<String>,
    pub topic: Option<String>,
    pub schema_id: Option<u32>,
    pub key: Option<String>,
    pub timeout_ms: Option<u64>,

    /// librdkafka passthrough settings
    #[serde(default)]
    pub client: toml::Table,

    /// Caller-supplied record; replaces the fixed reading
    pub record: Option<toml::Table>,

    #[serde(default)]
    pub properties: toml::Table,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Effective settings
// ============================================================================

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub broker_uri: String,
    pub schema_path: PathBuf,
    pub topic: String,
    pub schema_id: Option<u32>,
    pub key: Option<String>,
    pub timeout: Duration,
    pub client_config: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,

    /// Record from the config file, if any
    pub record: Option<Record>,

    /// `--field` values applied on top of the base record
    pub field_overrides: Vec<(String, Value)>,
}

impl Settings {
    /// Merge the command line (with its env fallbacks) over the config file.
    pub fn resolve(cli: Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let broker_uri = cli
            .broker_uri
            .or(file.broker_uri)
            .ok_or(ConfigError::Missing("broker_uri"))?;
        let schema_location = cli
            .schema_path
            .or(file.schema_path)
            .ok_or(ConfigError::Missing("schema_path"))?;
        let topic = cli
            .topic
            .or(file.topic)
            .ok_or(ConfigError::Missing("topic"))?;

        let record = file.record.as_ref().map(table_to_record).transpose()?;

        let mut field_overrides = Vec::with_capacity(cli.fields.len());
        for input in &cli.fields {
            let (name, raw) = parse_assignment("field", input)?;
            let value = toml_to_value(&name, &parse_literal(&raw))?;
            field_overrides.push((name, value));
        }

        let mut properties = stringify_table(&file.properties);
        for input in &cli.properties {
            let (name, value) = parse_assignment("property", input)?;
            properties.insert(name, value);
        }

        let settings = Self {
            broker_uri,
            schema_path: schema_path_from_location(&schema_location),
            topic,
            schema_id: cli.schema_id.or(file.schema_id),
            key: cli.key.or(file.key),
            timeout: Duration::from_millis(
                cli.timeout_ms.or(file.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            client_config: stringify_table(&file.client),
            properties,
            record,
            field_overrides,
        };
        debug!(
            "Resolved settings: broker={} schema={:?} topic={} timeout={:?} client_keys={:?}",
            settings.broker_uri,
            settings.schema_path,
            settings.topic,
            settings.timeout,
            settings.client_config.keys().collect::<Vec<_>>()
        );
        Ok(settings)
    }

    /// The record to publish: the configured one or the fixed reading, with
    /// `--field` overrides applied.
    pub fn build_record(&self) -> Record {
        let mut record = self.record.clone().unwrap_or_else(sample::sensor_reading);
        for (name, value) in &self.field_overrides {
            record.insert(name.clone(), value.clone());
        }
        record
    }

    pub fn wire_format(&self) -> WireFormat {
        match self.schema_id {
            Some(schema_id) => WireFormat::Confluent { schema_id },
            None => WireFormat::Raw,
        }
    }

    pub fn message_meta(&self) -> MessageMeta {
        MessageMeta {
            key: self.key.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn kafka_settings(&self) -> KafkaSettings {
        KafkaSettings {
            client_config: self.client_config.clone(),
            timeout: self.timeout,
        }
    }
}

// ============================================================================
// Value conversion
// ============================================================================

fn parse_assignment(kind: &'static str, input: &str) -> Result<(String, String)> {
    let invalid = || ConfigError::InvalidAssignment {
        kind,
        input: input.to_string(),
    };
    let (name, value) = input.split_once('=').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    Ok((name.to_string(), value.to_string()))
}

/// Read `raw` as a TOML literal; anything that is not one is a plain string.
fn parse_literal(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn toml_to_value(field: &str, value: &toml::Value) -> Result<Value> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(Value::Int(*i)),
        toml::Value::Float(f) => Ok(Value::Float(*f)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        // Dates and timestamps are parsed against the schema by the encoder.
        toml::Value::Datetime(dt) => Ok(Value::String(dt.to_string())),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(ConfigError::UnsupportedValue {
            field: field.to_string(),
            reason: format!("{} values are not supported", value.type_str()),
        }),
    }
}

fn table_to_record(table: &toml::Table) -> Result<Record> {
    table
        .iter()
        .map(|(name, value)| toml_to_value(name, value).map(|v| (name.clone(), v)))
        .collect::<Result<Vec<(String, Value)>>>()
        .map(Record::from_iter)
}

fn stringify_table(table: &toml::Table) -> BTreeMap<String, String> {
    table
        .iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
