use chrono::{DateTime, Utc};
use std::fmt;

/// A single value as it crosses the driver boundary, in either direction:
/// bound as a statement argument or returned as a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl WireValue {
    /// Name of the wire shape, used in diagnostics.
    pub fn wire_type(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Text(_) => "text",
            WireValue::Bytes(_) => "bytes",
            WireValue::Bool(_) => "bool",
            WireValue::Int(_) => "int64",
            WireValue::Float(_) => "float64",
            WireValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Null => f.write_str("<nil>"),
            WireValue::Text(s) => f.write_str(s),
            WireValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            WireValue::Bool(b) => write!(f, "{b}"),
            WireValue::Int(i) => write!(f, "{i}"),
            WireValue::Float(x) => write!(f, "{x}"),
            WireValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Text(value)
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(value: Vec<u8>) -> Self {
        WireValue::Bytes(value)
    }
}

impl From<&[u8]> for WireValue {
    fn from(value: &[u8]) -> Self {
        WireValue::Bytes(value.to_vec())
    }
}

impl From<bool> for WireValue {
    fn from(value: bool) -> Self {
        WireValue::Bool(value)
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Float(value)
    }
}

impl From<f32> for WireValue {
    fn from(value: f32) -> Self {
        WireValue::Float(value as f64)
    }
}

impl From<DateTime<Utc>> for WireValue {
    fn from(value: DateTime<Utc>) -> Self {
        WireValue::Timestamp(value)
    }
}

impl<T: Into<WireValue>> From<Option<T>> for WireValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(WireValue::Null, Into::into)
    }
}

macro_rules! int_into_wire {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for WireValue {
                fn from(value: $ty) -> Self {
                    WireValue::Int(value as i64)
                }
            }
        )*
    };
}

int_into_wire!(i8, i16, i32, i64, isize, u8, u16, u32);

macro_rules! wide_unsigned_into_wire {
    ($($ty:ty),*) => {
        $(
            /// Values above `i64::MAX` are bound as decimal text.
            impl From<$ty> for WireValue {
                fn from(value: $ty) -> Self {
                    i64::try_from(value)
                        .map_or_else(|_| WireValue::Text(value.to_string()), WireValue::Int)
                }
            }
        )*
    };
}

wide_unsigned_into_wire!(u64, usize);
