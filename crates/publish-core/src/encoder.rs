//! Record validation and Avro encoding.
//!
//! [`validate`] checks a [`Record`] against a [`Schema`] and converts it into
//! the Avro value tree, in schema field order. The result encodes to an Avro
//! binary datum, optionally framed by a [`WireFormat`].

use crate::record::{Record, Value};
use crate::schema::{FieldDefinition, FieldType, Schema};
use apache_avro::types::Value as AvroValue;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Accepted layouts for timestamps written without an offset (read as UTC).
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Errors that can occur while validating or encoding a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Avro serialization error: {0}")]
    Serialization(String),
}

impl EncodingError {
    /// The offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) | Self::TypeMismatch { field, .. } => Some(field),
            Self::Serialization(_) => None,
        }
    }
}

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, EncodingError>;

/// Byte framing around an Avro datum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// Plain Avro binary datum
    #[default]
    Raw,

    /// Magic byte `0`, 4-byte big-endian schema id, then the datum
    Confluent { schema_id: u32 },
}

impl WireFormat {
    /// Wrap an encoded datum.
    pub fn frame(&self, datum: Vec<u8>) -> Vec<u8> {
        match self {
            WireFormat::Raw => datum,
            WireFormat::Confluent { schema_id } => {
                let mut framed = Vec::with_capacity(5 + datum.len());
                framed.push(0u8);
                framed.extend_from_slice(&schema_id.to_be_bytes());
                framed.extend_from_slice(&datum);
                framed
            }
        }
    }
}

/// A record that conforms to its schema, ready to encode.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    value: AvroValue,
}

impl ValidatedRecord {
    /// The Avro value tree (an Avro record in schema field order).
    pub fn avro_value(&self) -> &AvroValue {
        &self.value
    }

    /// Encode as a plain Avro binary datum.
    pub fn to_avro_datum(&self, schema: &Schema) -> Result<Vec<u8>> {
        apache_avro::to_avro_datum(schema.avro(), self.value.clone())
            .map_err(|e| EncodingError::Serialization(e.to_string()))
    }

    /// Encode and frame for the wire.
    pub fn encode(&self, schema: &Schema, format: WireFormat) -> Result<Vec<u8>> {
        Ok(format.frame(self.to_avro_datum(schema)?))
    }
}

/// Check a record against a schema.
///
/// Every non-nullable field must be present with a type-compatible value.
/// Fields are checked in schema order and the first offending field is
/// reported. Record entries that the schema does not declare are ignored.
pub fn validate(record: &Record, schema: &Schema) -> Result<ValidatedRecord> {
    let mut fields = Vec::with_capacity(schema.fields().len());

    for field in schema.fields() {
        let value = match (record.get(&field.name), field.branches) {
            (None, Some(branches)) | (Some(Value::Null), Some(branches)) => {
                AvroValue::Union(branches.null, Box::new(AvroValue::Null))
            }
            (None, None) => return Err(EncodingError::MissingField(field.name.clone())),
            (Some(value), Some(branches)) => {
                AvroValue::Union(branches.value, Box::new(convert_value(field, value)?))
            }
            (Some(value), None) => convert_value(field, value)?,
        };
        fields.push((field.name.clone(), value));
    }

    Ok(ValidatedRecord {
        value: AvroValue::Record(fields),
    })
}

/// Convert one non-null value to its Avro representation.
fn convert_value(field: &FieldDefinition, value: &Value) -> Result<AvroValue> {
    let mismatch = || EncodingError::TypeMismatch {
        field: field.name.clone(),
        expected: field.field_type.to_string(),
        actual: value.kind().to_string(),
    };

    let converted = match (&field.field_type, value) {
        (FieldType::Boolean, Value::Bool(b)) => AvroValue::Boolean(*b),

        (FieldType::Int, Value::Int(i)) => {
            let narrowed = i32::try_from(*i).map_err(|_| EncodingError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type.to_string(),
                actual: format!("int {i} out of 32-bit range"),
            })?;
            AvroValue::Int(narrowed)
        }
        (FieldType::Long, Value::Int(i)) => AvroValue::Long(*i),

        // Integer to float widening
        (FieldType::Float, Value::Int(i)) => AvroValue::Float(*i as f32),
        (FieldType::Float, Value::Float(f)) => {
            let narrowed = *f as f32;
            if f.is_finite() && !narrowed.is_finite() {
                return Err(EncodingError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type.to_string(),
                    actual: format!("float {f} out of 32-bit range"),
                });
            }
            AvroValue::Float(narrowed)
        }
        (FieldType::Double, Value::Int(i)) => AvroValue::Double(*i as f64),
        (FieldType::Double, Value::Float(f)) => AvroValue::Double(*f),

        (FieldType::String, Value::String(s)) => AvroValue::String(s.clone()),
        (FieldType::Enum(symbols), Value::String(s)) => {
            let index = symbols.iter().position(|sym| sym == s).ok_or_else(|| {
                EncodingError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type.to_string(),
                    actual: format!("unknown symbol '{s}'"),
                }
            })?;
            AvroValue::Enum(index as u32, s.clone())
        }
        (FieldType::Bytes, Value::Bytes(b)) => AvroValue::Bytes(b.clone()),
        (FieldType::Uuid, Value::String(s)) => {
            AvroValue::Uuid(uuid::Uuid::parse_str(s).map_err(|_| malformed(field, s))?)
        }

        (FieldType::Date, Value::Date(d)) => AvroValue::Date(days_since_epoch(*d)),
        (FieldType::Date, Value::String(s)) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| malformed(field, s))?;
            AvroValue::Date(days_since_epoch(date))
        }

        (FieldType::TimestampMillis, Value::Timestamp(ts)) => {
            AvroValue::TimestampMillis(ts.timestamp_millis())
        }
        (FieldType::TimestampMillis, Value::String(s)) => {
            let ts = parse_timestamp(s).ok_or_else(|| malformed(field, s))?;
            AvroValue::TimestampMillis(ts.timestamp_millis())
        }
        (FieldType::TimestampMicros, Value::Timestamp(ts)) => {
            AvroValue::TimestampMicros(ts.timestamp_micros())
        }
        (FieldType::TimestampMicros, Value::String(s)) => {
            let ts = parse_timestamp(s).ok_or_else(|| malformed(field, s))?;
            AvroValue::TimestampMicros(ts.timestamp_micros())
        }

        _ => return Err(mismatch()),
    };

    Ok(converted)
}

fn malformed(field: &FieldDefinition, raw: &str) -> EncodingError {
    EncodingError::TypeMismatch {
        field: field.name.clone(),
        expected: field.field_type.to_string(),
        actual: format!("malformed string '{raw}'"),
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Parse an RFC 3339 timestamp, or a naive one interpreted as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sensor_record, SENSOR_SCHEMA};

    fn sensor_schema() -> Schema {
        Schema::parse_str(SENSOR_SCHEMA).unwrap()
    }

    fn single_field_schema(avro_type: &str) -> Schema {
        Schema::parse_str(&format!(
            r#"{{"type": "record", "name": "R", "fields": [{{"name": "v", "type": {avro_type}}}]}}"#
        ))
        .unwrap()
    }

    fn field_value(validated: &ValidatedRecord, name: &str) -> AvroValue {
        match validated.avro_value() {
            AvroValue::Record(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap(),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_sensor_record() {
        let schema = sensor_schema();
        let validated = validate(&sensor_record(), &schema).unwrap();

        assert_eq!(
            field_value(&validated, "drillID"),
            AvroValue::String("DRL-001".to_string())
        );
        // 2021-04-05
        assert_eq!(field_value(&validated, "readingDate"), AvroValue::Date(18722));
        assert_eq!(
            field_value(&validated, "readingTime"),
            AvroValue::TimestampMillis(1_617_642_622_000)
        );
        assert_eq!(field_value(&validated, "readingValue"), AvroValue::Float(333.0));
        assert_eq!(
            field_value(&validated, "note"),
            AvroValue::Union(0, Box::new(AvroValue::Null))
        );
    }

    #[test]
    fn test_fields_follow_schema_order() {
        let schema = sensor_schema();
        let validated = validate(&sensor_record(), &schema).unwrap();
        match validated.avro_value() {
            AvroValue::Record(fields) => {
                let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                let expected: Vec<&str> =
                    schema.fields().iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, expected);
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_field() {
        let schema = sensor_schema();
        let mut record = sensor_record();
        record.remove("sensorType");

        let err = validate(&record, &schema).unwrap_err();
        assert_eq!(err, EncodingError::MissingField("sensorType".to_string()));
        assert_eq!(err.field(), Some("sensorType"));
    }

    #[test]
    fn test_first_offending_field_in_schema_order() {
        let schema = sensor_schema();
        let mut record = sensor_record();
        record.remove("readingValue");
        record.insert("sensorID", 42);

        let err = validate(&record, &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { ref field, .. } if field == "sensorID"));
    }

    #[test]
    fn test_null_for_required_field_is_mismatch() {
        let schema = sensor_schema();
        let record = sensor_record().with("sensorType", Value::Null);

        let err = validate(&record, &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { ref actual, .. } if actual == "null"));
    }

    #[test]
    fn test_nullable_field_with_value() {
        let schema = sensor_schema();
        let record = sensor_record().with("note", "over threshold");

        let validated = validate(&record, &schema).unwrap();
        assert_eq!(
            field_value(&validated, "note"),
            AvroValue::Union(1, Box::new(AvroValue::String("over threshold".to_string())))
        );
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let schema = sensor_schema();
        let record = sensor_record().with("firmware", "1.2.3");
        assert!(validate(&record, &schema).is_ok());
    }

    #[test]
    fn test_integer_widens_to_float() {
        let schema = single_field_schema(r#""double""#);
        let validated = validate(&Record::new().with("v", 7), &schema).unwrap();
        assert_eq!(field_value(&validated, "v"), AvroValue::Double(7.0));
    }

    #[test]
    fn test_string_does_not_coerce_to_number() {
        for avro_type in [r#""int""#, r#""long""#, r#""float""#, r#""double""#] {
            let schema = single_field_schema(avro_type);
            let err = validate(&Record::new().with("v", "42"), &schema).unwrap_err();
            assert!(
                matches!(err, EncodingError::TypeMismatch { .. }),
                "{avro_type}: {err:?}"
            );
        }
    }

    #[test]
    fn test_float_does_not_narrow_to_integer() {
        let schema = single_field_schema(r#""long""#);
        let err = validate(&Record::new().with("v", 1.5), &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_int_out_of_range() {
        let schema = single_field_schema(r#""int""#);
        let err = validate(&Record::new().with("v", i64::MAX), &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_float_out_of_range() {
        let schema = single_field_schema(r#""float""#);
        let err = validate(&Record::new().with("v", 1e300_f64), &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { ref field, .. } if field == "v"));

        let ok = validate(&Record::new().with("v", 1.5e38_f64), &schema).unwrap();
        assert_eq!(field_value(&ok, "v"), AvroValue::Float(1.5e38_f64 as f32));

        let double = single_field_schema(r#""double""#);
        assert!(validate(&Record::new().with("v", 1e300_f64), &double).is_ok());
    }

    #[test]
    fn test_malformed_timestamp_is_mismatch() {
        let schema = sensor_schema();
        let record = sensor_record().with("readingTime", "2021-04-05 at teatime");

        let err = validate(&record, &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { ref field, .. } if field == "readingTime"));
    }

    #[test]
    fn test_malformed_date_is_mismatch() {
        let schema = sensor_schema();
        let record = sensor_record().with("readingDate", "2021-13-45");

        let err = validate(&record, &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { ref field, .. } if field == "readingDate"));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2021, 4, 5, 17, 10, 22).unwrap();
        assert_eq!(parse_timestamp("2021-04-05T17:10:22Z"), Some(expected));
        assert_eq!(parse_timestamp("2021-04-05T17:10:22.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2021-04-05T19:10:22+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-04-05T17:10:22"), Some(expected));
        assert_eq!(parse_timestamp("2021-04-05 17:10:22"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_timestamp_micros() {
        let schema = single_field_schema(r#"{"type": "long", "logicalType": "timestamp-micros"}"#);
        let ts = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        let validated = validate(&Record::new().with("v", ts), &schema).unwrap();
        assert_eq!(field_value(&validated, "v"), AvroValue::TimestampMicros(1_000_000));
    }

    #[test]
    fn test_enum_symbol() {
        let schema = single_field_schema(
            r#"{"type": "enum", "name": "Kind", "symbols": ["TEMP", "PRESSURE"]}"#,
        );
        let validated = validate(&Record::new().with("v", "PRESSURE"), &schema).unwrap();
        assert_eq!(
            field_value(&validated, "v"),
            AvroValue::Enum(1, "PRESSURE".to_string())
        );

        let err = validate(&Record::new().with("v", "HUMIDITY"), &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_uuid_field() {
        let schema = single_field_schema(r#"{"type": "string", "logicalType": "uuid"}"#);
        assert!(validate(
            &Record::new().with("v", "550e8400-e29b-41d4-a716-446655440000"),
            &schema
        )
        .is_ok());

        let err = validate(&Record::new().with("v", "not-a-uuid"), &schema).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_encode_decodes_back() {
        let schema = sensor_schema();
        let validated = validate(&sensor_record(), &schema).unwrap();
        let datum = validated.to_avro_datum(&schema).unwrap();

        let mut reader = datum.as_slice();
        let decoded = apache_avro::from_avro_datum(schema.avro(), &mut reader, None).unwrap();
        assert_eq!(&decoded, validated.avro_value());
    }

    #[test]
    fn test_confluent_framing() {
        let framed = WireFormat::Confluent { schema_id: 7 }.frame(vec![0xAA, 0xBB]);
        assert_eq!(framed, vec![0, 0, 0, 0, 7, 0xAA, 0xBB]);

        let raw = WireFormat::Raw.frame(vec![0xAA]);
        assert_eq!(raw, vec![0xAA]);
    }
}
