//! Avro schema loading.
//!
//! A [`Schema`] is the flattened view of an Avro `record` schema: an ordered
//! list of named, typed fields, plus the parsed Avro schema that the encoder
//! needs to produce binary datums.
//!
//! Only flat records are supported. Every field must be a primitive or
//! logical type from [`FieldType`], optionally wrapped in a `["null", T]`
//! union. Anything else is rejected as a parse error so a caller never ends
//! up with a partial schema.

use apache_avro::schema::UnionSchema;
use apache_avro::Schema as AvroSchema;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema loading.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema document could not be read
    #[error("Failed to read schema file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema document was read but is not a supported Avro record schema
    #[error("Failed to parse schema: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

// ============================================================================
// Field Types
// ============================================================================

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    Float,
    Double,
    String,
    Bytes,
    /// String restricted to the listed symbols
    Enum(Vec<String>),
    /// String carrying a UUID
    Uuid,
    /// Days since the Unix epoch
    Date,
    /// Milliseconds since the Unix epoch, UTC
    TimestampMillis,
    /// Microseconds since the Unix epoch, UTC
    TimestampMicros,
}

impl FieldType {
    fn from_avro(schema: &AvroSchema) -> Option<Self> {
        let field_type = match schema {
            AvroSchema::Boolean => FieldType::Boolean,
            AvroSchema::Int => FieldType::Int,
            AvroSchema::Long => FieldType::Long,
            AvroSchema::Float => FieldType::Float,
            AvroSchema::Double => FieldType::Double,
            AvroSchema::String => FieldType::String,
            AvroSchema::Bytes => FieldType::Bytes,
            AvroSchema::Enum(enum_schema) => FieldType::Enum(enum_schema.symbols.clone()),
            AvroSchema::Uuid => FieldType::Uuid,
            AvroSchema::Date => FieldType::Date,
            AvroSchema::TimestampMillis => FieldType::TimestampMillis,
            AvroSchema::TimestampMicros => FieldType::TimestampMicros,
            _ => return None,
        };
        Some(field_type)
    }

    /// Whether values of this type are numbers (integer widening applies).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Long | FieldType::Float | FieldType::Double
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Int => write!(f, "int"),
            FieldType::Long => write!(f, "long"),
            FieldType::Float => write!(f, "float"),
            FieldType::Double => write!(f, "double"),
            FieldType::String => write!(f, "string"),
            FieldType::Bytes => write!(f, "bytes"),
            FieldType::Enum(symbols) => write!(f, "enum[{}]", symbols.join(",")),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::Date => write!(f, "date"),
            FieldType::TimestampMillis => write!(f, "timestamp-millis"),
            FieldType::TimestampMicros => write!(f, "timestamp-micros"),
        }
    }
}

/// Union branch positions of a nullable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NullableBranches {
    pub(crate) null: u32,
    pub(crate) value: u32,
}

// ============================================================================
// Field & Schema
// ============================================================================

/// One field of a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,

    /// Declared type (the non-null branch for nullable fields)
    pub field_type: FieldType,

    pub(crate) branches: Option<NullableBranches>,
}

impl FieldDefinition {
    /// Whether the field may be absent or null in a record.
    pub fn is_nullable(&self) -> bool {
        self.branches.is_some()
    }
}

/// A flat Avro record schema.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDefinition>,
    avro: AvroSchema,
}

impl Schema {
    /// Load a schema from an `.avsc` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|e| {
            SchemaError::Parse(format!("{}: not valid UTF-8: {e}", path.display()))
        })?;

        let schema = Self::parse_str(&content).map_err(|e| match e {
            SchemaError::Parse(reason) => SchemaError::Parse(format!("{}: {reason}", path.display())),
            other => other,
        })?;

        debug!(
            "Loaded schema '{}' with {} fields from {:?}",
            schema.name,
            schema.fields.len(),
            path
        );
        Ok(schema)
    }

    /// Parse a schema from its JSON definition.
    pub fn parse_str(definition: &str) -> Result<Self> {
        let avro = AvroSchema::parse_str(definition)
            .map_err(|e| SchemaError::Parse(format!("invalid Avro schema: {e}")))?;

        let record = match &avro {
            AvroSchema::Record(record) => record,
            other => {
                return Err(SchemaError::Parse(format!(
                    "top-level type must be a record, found {other:?}"
                )))
            }
        };

        if record.fields.is_empty() {
            return Err(SchemaError::Parse(format!(
                "record '{}' has no fields",
                record.name.name
            )));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::Parse(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
            fields.push(field_definition(&field.name, &field.schema)?);
        }

        Ok(Self {
            name: record.name.name.clone(),
            fields,
            avro,
        })
    }

    /// Record name (without namespace).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields every record must carry.
    pub fn required_field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.is_nullable())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// The parsed Avro schema, used for binary encoding.
    pub fn avro(&self) -> &AvroSchema {
        &self.avro
    }

    /// Parsing Canonical Form, stable across formatting differences.
    pub fn canonical_form(&self) -> String {
        self.avro.canonical_form()
    }
}

/// Load a schema from an `.avsc` file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Schema> {
    Schema::load(path)
}

/// Turn a configured schema location into a filesystem path.
///
/// Accepts plain paths and `file://` URIs.
pub fn schema_path_from_location(location: &str) -> PathBuf {
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

fn field_definition(name: &str, schema: &AvroSchema) -> Result<FieldDefinition> {
    if let AvroSchema::Union(union) = schema {
        let (branches, inner) = nullable_branches(name, union)?;
        let field_type = FieldType::from_avro(inner).ok_or_else(|| unsupported(name, inner))?;
        return Ok(FieldDefinition {
            name: name.to_string(),
            field_type,
            branches: Some(branches),
        });
    }

    let field_type = FieldType::from_avro(schema).ok_or_else(|| unsupported(name, schema))?;
    Ok(FieldDefinition {
        name: name.to_string(),
        field_type,
        branches: None,
    })
}

/// Split a `["null", T]` union into its branch positions and `T`.
fn nullable_branches<'a>(
    name: &str,
    union: &'a UnionSchema,
) -> Result<(NullableBranches, &'a AvroSchema)> {
    let variants = union.variants();
    let null_pos = variants.iter().position(|v| matches!(v, AvroSchema::Null));

    match (variants.len(), null_pos) {
        (2, Some(null)) => {
            let value = 1 - null;
            Ok((
                NullableBranches {
                    null: null as u32,
                    value: value as u32,
                },
                &variants[value],
            ))
        }
        _ => Err(SchemaError::Parse(format!(
            "field '{name}': only [\"null\", T] unions are supported"
        ))),
    }
}

fn unsupported(name: &str, schema: &AvroSchema) -> SchemaError {
    SchemaError::Parse(format!("field '{name}': unsupported type {schema:?}"))
}
