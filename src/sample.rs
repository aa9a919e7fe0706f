//! The fixed warning-sensor reading published when no record is configured.

use publish_core::Record;

pub const DRILL_ID: &str = "DRL-001";
pub const SENSOR_ID: &str = "SNS-temp-99";
pub const READING_DATE: &str = "2021-04-05";
pub const READING_TIME: &str = "2021-04-05T17:10:22";
pub const SENSOR_TYPE: &str = "temperature";
pub const READING_VALUE: i64 = 333;

/// Build the fixed reading. Date and time are given as strings and converted
/// against the schema's logical types at encode time.
pub fn sensor_reading() -> Record {
    Record::new()
        .with("drillID", DRILL_ID)
        .with("sensorID", SENSOR_ID)
        .with("readingDate", READING_DATE)
        .with("readingTime", READING_TIME)
        .with("sensorType", SENSOR_TYPE)
        .with("readingValue", READING_VALUE)
}
