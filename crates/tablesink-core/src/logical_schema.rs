//! Logical schema definitions persisted in the transaction log.
//!
//! Table schemas are stored as [`LogicalSchema`] values rather than raw Arrow
//! schemas so the JSON commit format stays stable and readable. Conversion is
//! available in both directions for the supported type set; Arrow types with
//! no logical counterpart are rejected when a table is created or widened.
use std::{collections::HashSet, fmt, sync::Arc};

use arrow::datatypes::{DataType, Field, FieldRef, Fields, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Units for logical timestamps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogicalTimestampUnit {
    /// Second precision timestamps.
    Seconds,
    /// Millisecond precision timestamps.
    Millis,
    /// Microsecond precision timestamps.
    Micros,
    /// Nanosecond precision timestamps.
    Nanos,
}

impl LogicalTimestampUnit {
    fn to_arrow_time_unit(self) -> TimeUnit {
        match self {
            LogicalTimestampUnit::Seconds => TimeUnit::Second,
            LogicalTimestampUnit::Millis => TimeUnit::Millisecond,
            LogicalTimestampUnit::Micros => TimeUnit::Microsecond,
            LogicalTimestampUnit::Nanos => TimeUnit::Nanosecond,
        }
    }

    fn from_arrow_time_unit(unit: &TimeUnit) -> Self {
        match unit {
            TimeUnit::Second => LogicalTimestampUnit::Seconds,
            TimeUnit::Millisecond => LogicalTimestampUnit::Millis,
            TimeUnit::Microsecond => LogicalTimestampUnit::Micros,
            TimeUnit::Nanosecond => LogicalTimestampUnit::Nanos,
        }
    }
}

impl fmt::Display for LogicalTimestampUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalTimestampUnit::Seconds => write!(f, "s"),
            LogicalTimestampUnit::Millis => write!(f, "ms"),
            LogicalTimestampUnit::Micros => write!(f, "us"),
            LogicalTimestampUnit::Nanos => write!(f, "ns"),
        }
    }
}

/// Logical column definition in a schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogicalField {
    /// Column name as stored in the schema.
    pub name: String,
    /// Logical data type for the column.
    pub data_type: LogicalDataType,
    /// Whether the column allows null values.
    #[serde(default)]
    pub nullable: bool,
}

impl LogicalField {
    /// Build a field from its parts.
    pub fn new(name: impl Into<String>, data_type: LogicalDataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Convert an Arrow field (recursively for nested types).
    pub fn try_from_arrow(field: &Field) -> Result<Self, SchemaConvertError> {
        let data_type = LogicalDataType::try_from_arrow(field.name(), field.data_type())?;
        Ok(Self {
            name: field.name().clone(),
            data_type,
            nullable: field.is_nullable(),
        })
    }

    fn to_arrow_field_ref(&self, path: &str) -> Result<FieldRef, SchemaConvertError> {
        let dt = self.data_type.to_arrow_datatype(path)?;
        Ok(Arc::new(Field::new(self.name.clone(), dt, self.nullable)))
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{}?: {}", self.name, self.data_type)
        } else {
            write!(f, "{}: {}", self.name, self.data_type)
        }
    }
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

/// Logical data types that can be stored in a table schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogicalDataType {
    /// Boolean value.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 encoded string (32-bit offsets).
    Utf8,
    /// UTF-8 encoded string (64-bit offsets).
    LargeUtf8,
    /// Variable-length binary data (32-bit offsets).
    Binary,
    /// Variable-length binary data (64-bit offsets).
    LargeBinary,
    /// Fixed-length binary data.
    FixedBinary {
        /// Fixed byte width for each value (in bytes).
        byte_width: i32,
    },
    /// Days since the UNIX epoch.
    Date32,
    /// Milliseconds since the UNIX epoch.
    Date64,

    /// Timestamp value with a precision unit and optional timezone.
    Timestamp {
        /// Timestamp precision unit.
        unit: LogicalTimestampUnit,
        /// Optional IANA timezone identifier.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timezone: Option<String>,
    },

    /// 128-bit decimal with declared precision (at most 38) and scale.
    Decimal {
        /// Total number of decimal digits.
        precision: i32,
        /// Number of digits to the right of the decimal point.
        scale: i32,
    },

    /// 256-bit decimal with declared precision (at most 76) and scale.
    Decimal256 {
        /// Total number of decimal digits.
        precision: i32,
        /// Number of digits to the right of the decimal point.
        scale: i32,
    },

    /// Struct with named child fields.
    Struct {
        /// Ordered child fields.
        fields: Vec<LogicalField>,
    },

    /// List with a single element field definition.
    List {
        /// Element field definition for list items.
        elements: Box<LogicalField>,
    },
}

impl LogicalDataType {
    /// Map an Arrow data type onto the logical type set.
    ///
    /// `column` is only used for error messages (dotted path for nested
    /// children).
    pub fn try_from_arrow(column: &str, dt: &DataType) -> Result<Self, SchemaConvertError> {
        Ok(match dt {
            DataType::Boolean => LogicalDataType::Bool,
            DataType::Int8 => LogicalDataType::Int8,
            DataType::Int16 => LogicalDataType::Int16,
            DataType::Int32 => LogicalDataType::Int32,
            DataType::Int64 => LogicalDataType::Int64,
            DataType::UInt8 => LogicalDataType::UInt8,
            DataType::UInt16 => LogicalDataType::UInt16,
            DataType::UInt32 => LogicalDataType::UInt32,
            DataType::UInt64 => LogicalDataType::UInt64,
            DataType::Float32 => LogicalDataType::Float32,
            DataType::Float64 => LogicalDataType::Float64,
            DataType::Utf8 => LogicalDataType::Utf8,
            DataType::LargeUtf8 => LogicalDataType::LargeUtf8,
            DataType::Binary => LogicalDataType::Binary,
            DataType::LargeBinary => LogicalDataType::LargeBinary,
            DataType::FixedSizeBinary(width) => LogicalDataType::FixedBinary {
                byte_width: *width,
            },
            DataType::Date32 => LogicalDataType::Date32,
            DataType::Date64 => LogicalDataType::Date64,
            DataType::Timestamp(unit, tz) => LogicalDataType::Timestamp {
                unit: LogicalTimestampUnit::from_arrow_time_unit(unit),
                timezone: tz.as_ref().map(|s| s.to_string()),
            },
            DataType::Decimal128(precision, scale) => LogicalDataType::Decimal {
                precision: i32::from(*precision),
                scale: i32::from(*scale),
            },
            DataType::Decimal256(precision, scale) => LogicalDataType::Decimal256 {
                precision: i32::from(*precision),
                scale: i32::from(*scale),
            },
            DataType::Struct(children) => {
                let mut fields = Vec::with_capacity(children.len());
                for child in children {
                    let child_path = join_path(column, child.name());
                    fields.push(LogicalField {
                        name: child.name().clone(),
                        data_type: Self::try_from_arrow(&child_path, child.data_type())?,
                        nullable: child.is_nullable(),
                    });
                }
                LogicalDataType::Struct { fields }
            }
            DataType::List(element) => {
                let child_path = join_path(column, element.name());
                LogicalDataType::List {
                    elements: Box::new(LogicalField {
                        name: element.name().clone(),
                        data_type: Self::try_from_arrow(&child_path, element.data_type())?,
                        nullable: element.is_nullable(),
                    }),
                }
            }
            other => {
                return UnsupportedArrowTypeSnafu {
                    column,
                    data_type: other.clone(),
                }
                .fail();
            }
        })
    }

    fn to_arrow_datatype(&self, column: &str) -> Result<DataType, SchemaConvertError> {
        Ok(match self {
            LogicalDataType::Bool => DataType::Boolean,
            LogicalDataType::Int8 => DataType::Int8,
            LogicalDataType::Int16 => DataType::Int16,
            LogicalDataType::Int32 => DataType::Int32,
            LogicalDataType::Int64 => DataType::Int64,
            LogicalDataType::UInt8 => DataType::UInt8,
            LogicalDataType::UInt16 => DataType::UInt16,
            LogicalDataType::UInt32 => DataType::UInt32,
            LogicalDataType::UInt64 => DataType::UInt64,
            LogicalDataType::Float32 => DataType::Float32,
            LogicalDataType::Float64 => DataType::Float64,
            LogicalDataType::Utf8 => DataType::Utf8,
            LogicalDataType::LargeUtf8 => DataType::LargeUtf8,
            LogicalDataType::Binary => DataType::Binary,
            LogicalDataType::LargeBinary => DataType::LargeBinary,
            LogicalDataType::Date32 => DataType::Date32,
            LogicalDataType::Date64 => DataType::Date64,

            LogicalDataType::FixedBinary { byte_width } => {
                if *byte_width <= 0 {
                    return FixedBinaryInvalidWidthSnafu {
                        column,
                        byte_width: *byte_width,
                    }
                    .fail();
                }
                DataType::FixedSizeBinary(*byte_width)
            }

            LogicalDataType::Timestamp { unit, timezone } => {
                let tz: Option<Arc<str>> = timezone.as_deref().map(Arc::<str>::from);
                DataType::Timestamp(unit.to_arrow_time_unit(), tz)
            }

            LogicalDataType::Decimal { precision, scale } => {
                decimal_to_arrow(column, *precision, *scale, DecimalWidth::Bits128)?
            }

            LogicalDataType::Decimal256 { precision, scale } => {
                decimal_to_arrow(column, *precision, *scale, DecimalWidth::Bits256)?
            }

            LogicalDataType::Struct { fields } => {
                let mut arrow_children: Vec<FieldRef> = Vec::with_capacity(fields.len());
                for f in fields {
                    let child_path = join_path(column, &f.name);
                    arrow_children.push(f.to_arrow_field_ref(&child_path)?);
                }
                DataType::Struct(Fields::from(arrow_children))
            }

            LogicalDataType::List { elements } => {
                let child_path = join_path(column, &elements.name);
                DataType::List(elements.to_arrow_field_ref(&child_path)?)
            }
        })
    }
}

#[derive(Clone, Copy)]
enum DecimalWidth {
    Bits128,
    Bits256,
}

fn decimal_to_arrow(
    column: &str,
    precision: i32,
    scale: i32,
    width: DecimalWidth,
) -> Result<DataType, SchemaConvertError> {
    let invalid = |details: &str| {
        DecimalInvalidSnafu {
            column,
            precision,
            scale,
            details,
        }
        .fail()
    };

    if precision <= 0 {
        return invalid("precision must be > 0");
    }
    if scale < 0 {
        return invalid("scale must be >= 0");
    }
    if scale > precision {
        return invalid("scale must be <= precision");
    }

    // Bounds checked here; the casts cannot truncate.
    match width {
        DecimalWidth::Bits128 if precision > 38 => {
            invalid("precision exceeds Decimal128 maximum (38 digits)")
        }
        DecimalWidth::Bits256 if precision > 76 => {
            invalid("precision exceeds Decimal256 maximum (76 digits)")
        }
        DecimalWidth::Bits128 => Ok(DataType::Decimal128(precision as u8, scale as i8)),
        DecimalWidth::Bits256 => Ok(DataType::Decimal256(precision as u8, scale as i8)),
    }
}

impl fmt::Display for LogicalDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalDataType::Bool => write!(f, "bool"),
            LogicalDataType::Int8 => write!(f, "int8"),
            LogicalDataType::Int16 => write!(f, "int16"),
            LogicalDataType::Int32 => write!(f, "int32"),
            LogicalDataType::Int64 => write!(f, "int64"),
            LogicalDataType::UInt8 => write!(f, "uint8"),
            LogicalDataType::UInt16 => write!(f, "uint16"),
            LogicalDataType::UInt32 => write!(f, "uint32"),
            LogicalDataType::UInt64 => write!(f, "uint64"),
            LogicalDataType::Float32 => write!(f, "float32"),
            LogicalDataType::Float64 => write!(f, "float64"),
            LogicalDataType::Utf8 => write!(f, "utf8"),
            LogicalDataType::LargeUtf8 => write!(f, "large_utf8"),
            LogicalDataType::Binary => write!(f, "binary"),
            LogicalDataType::LargeBinary => write!(f, "large_binary"),
            LogicalDataType::FixedBinary { byte_width } => write!(f, "fixed_binary[{byte_width}]"),
            LogicalDataType::Date32 => write!(f, "date32"),
            LogicalDataType::Date64 => write!(f, "date64"),

            LogicalDataType::Timestamp { unit, timezone } => match timezone {
                Some(tz) => write!(f, "timestamp[{unit}]({tz})"),
                None => write!(f, "timestamp[{unit}]"),
            },

            LogicalDataType::Decimal { precision, scale } => {
                write!(f, "decimal({precision}, {scale})")
            }
            LogicalDataType::Decimal256 { precision, scale } => {
                write!(f, "decimal256({precision}, {scale})")
            }

            LogicalDataType::Struct { fields } => {
                write!(f, "struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ">")
            }

            LogicalDataType::List { elements } => write!(f, "list<{elements}>"),
        }
    }
}

/// Ordered collection of uniquely-named logical columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogicalSchema {
    columns: Vec<LogicalField>,
}

impl LogicalSchema {
    /// Construct a validated logical schema (rejects duplicate column names).
    pub fn new(columns: Vec<LogicalField>) -> Result<Self, LogicalSchemaError> {
        let mut seen = HashSet::new();
        for col in &columns {
            validate_name(&col.name, &col.name)?;
            if !seen.insert(col.name.as_str()) {
                return DuplicateColumnSnafu {
                    column: col.name.clone(),
                }
                .fail();
            }
            validate_dtype(&col.data_type, &col.name)?;
        }

        Ok(Self { columns })
    }

    /// Convert and validate an Arrow schema.
    pub fn try_from_arrow(schema: &Schema) -> Result<Self, LogicalSchemaError> {
        let mut columns = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            columns.push(LogicalField::try_from_arrow(field).context(ConvertSnafu)?);
        }
        Self::new(columns)
    }

    /// Borrow the logical columns.
    pub fn columns(&self) -> &[LogicalField] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&LogicalField> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// A new schema with `added` appended after the existing columns.
    ///
    /// Existing columns are kept untouched; any added name that collides with
    /// an existing (or another added) column is rejected.
    pub fn with_added_columns(&self, added: &[LogicalField]) -> Result<Self, LogicalSchemaError> {
        let mut columns = self.columns.clone();
        columns.extend_from_slice(added);
        Self::new(columns)
    }

    /// Convert this logical schema to an owned Arrow [`Schema`].
    pub fn to_arrow_schema(&self) -> Result<Schema, SchemaConvertError> {
        let mut fields = Vec::with_capacity(self.columns.len());
        for c in &self.columns {
            fields.push(c.to_arrow_field_ref(&c.name)?);
        }
        Ok(Schema::new(fields))
    }

    /// Convert this logical schema to a shared Arrow [`SchemaRef`].
    pub fn to_arrow_schema_ref(&self) -> Result<SchemaRef, SchemaConvertError> {
        Ok(Arc::new(self.to_arrow_schema()?))
    }
}

impl fmt::Display for LogicalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{col}")?;
        }
        Ok(())
    }
}

fn validate_name(name: &str, path: &str) -> Result<(), LogicalSchemaError> {
    ensure!(
        !name.trim().is_empty(),
        EmptyColumnNameSnafu {
            column_path: path.to_string()
        }
    );
    Ok(())
}

fn validate_dtype(dt: &LogicalDataType, path: &str) -> Result<(), LogicalSchemaError> {
    match dt {
        LogicalDataType::FixedBinary { byte_width } => {
            ensure!(
                *byte_width > 0,
                FixedBinaryInvalidWidthInSchemaSnafu {
                    column: path,
                    byte_width: *byte_width,
                }
            );
            Ok(())
        }

        LogicalDataType::Struct { fields } => {
            ensure!(
                !fields.is_empty(),
                EmptyStructSnafu { column_path: path }
            );

            let mut seen = HashSet::with_capacity(fields.len());
            for child in fields {
                let child_path = join_path(path, &child.name);
                validate_name(&child.name, &child_path)?;
                if !seen.insert(child.name.as_str()) {
                    return DuplicatedFieldNameSnafu {
                        column_path: path,
                        field: child.name.clone(),
                    }
                    .fail();
                }
                validate_dtype(&child.data_type, &child_path)?;
            }
            Ok(())
        }

        LogicalDataType::List { elements } => {
            let child_path = join_path(path, &elements.name);
            validate_name(&elements.name, &child_path)?;
            validate_dtype(&elements.data_type, &child_path)
        }

        _ => Ok(()),
    }
}

/// Errors that can occur while constructing or validating a logical schema.
#[derive(Debug, Snafu)]
pub enum LogicalSchemaError {
    /// Duplicate column names are not allowed.
    #[snafu(display("Duplicate column name: {column}"))]
    DuplicateColumn {
        /// The duplicate column name.
        column: String,
    },

    /// Column and nested field names must be non-empty.
    #[snafu(display("Column name must be non-empty: column={column_path}"))]
    EmptyColumnName {
        /// Dotted path of the unnamed column.
        column_path: String,
    },

    /// FixedBinary columns must include a positive byte width.
    #[snafu(display(
        "invalid FixedBinary byte_width for column '{column}': {byte_width} (must be > 0)"
    ))]
    FixedBinaryInvalidWidthInSchema {
        /// Column name that failed validation.
        column: String,
        /// Declared byte width.
        byte_width: i32,
    },

    /// Duplicate field names within a struct are not allowed.
    #[snafu(display("Duplicate field name: column={column_path}, field={field}"))]
    DuplicatedFieldName {
        /// Column path for the struct that contains the duplicate field.
        column_path: String,
        /// Duplicate field name.
        field: String,
    },

    /// Struct fields must be non-empty.
    #[snafu(display("Struct must have at least one field: column={column_path}"))]
    EmptyStruct {
        /// Column path for the empty struct.
        column_path: String,
    },

    /// An Arrow schema could not be converted.
    #[snafu(display("Cannot derive logical schema: {source}"))]
    Convert {
        /// Underlying conversion error.
        source: SchemaConvertError,
    },
}

/// Errors encountered while converting between Arrow and logical schemas.
#[derive(Debug, Snafu)]
pub enum SchemaConvertError {
    /// The Arrow type has no logical counterpart.
    #[snafu(display("unsupported Arrow type for column '{column}': {data_type}"))]
    UnsupportedArrowType {
        /// Column (dotted path) that failed conversion.
        column: String,
        /// The offending Arrow type.
        data_type: DataType,
    },

    /// FixedBinary fields must declare a positive byte width.
    #[snafu(display(
        "invalid FixedBinary byte_width for column '{column}': {byte_width} (must be > 0)"
    ))]
    FixedBinaryInvalidWidth {
        /// Column name that failed validation.
        column: String,
        /// Declared byte width.
        byte_width: i32,
    },

    /// Decimal precision/scale is out of supported bounds for Arrow conversion.
    #[snafu(display(
        "invalid decimal definition for column '{column}': precision={precision}, scale={scale} ({details})"
    ))]
    DecimalInvalid {
        /// Column name that failed conversion.
        column: String,
        /// Declared total precision.
        precision: i32,
        /// Declared scale.
        scale: i32,
        /// Which constraint was violated.
        details: String,
    },
}
