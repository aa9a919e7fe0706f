//! Shared fixtures for unit tests.

use crate::record::Record;

pub(crate) const SENSOR_SCHEMA: &str = r#"{
    "type": "record",
    "name": "WarningSensorData",
    "namespace": "com.example",
    "fields": [
        {"name": "drillID", "type": "string"},
        {"name": "sensorID", "type": "string"},
        {"name": "readingDate", "type": {"type": "int", "logicalType": "date"}},
        {"name": "readingTime", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "sensorType", "type": "string"},
        {"name": "readingValue", "type": "float"},
        {"name": "note", "type": ["null", "string"], "default": null}
    ]
}"#;

/// A record that satisfies [`SENSOR_SCHEMA`].
pub(crate) fn sensor_record() -> Record {
    Record::new()
        .with("drillID", "DRL-001")
        .with("sensorID", "SNS-temp-99")
        .with("readingDate", "2021-04-05")
        .with("readingTime", "2021-04-05T17:10:22")
        .with("sensorType", "temperature")
        .with("readingValue", 333)
}
