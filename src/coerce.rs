//! Wire value coercion.
//!
//! Drivers disagree on how they surface the same logical value: numerics may
//! arrive as text or bytes, booleans as `Y`/`N`. [`coerce`] is the one place
//! that maps every wire shape onto the destination's static type.

use crate::record::Slot;
use crate::value::WireValue;
use thiserror::Error;

/// A value that cannot be stored into its destination.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("can't convert '{value}' {wire_type} to {destination}")]
pub struct CoercionError {
    pub value: String,
    pub wire_type: &'static str,
    pub destination: &'static str,
}

impl CoercionError {
    fn new(value: &WireValue, slot: &Slot<'_>) -> Self {
        Self {
            value: value.to_string(),
            wire_type: value.wire_type(),
            destination: slot.type_name(),
        }
    }
}

/// Stores `value` into `slot`.
///
/// Rules, in order: null zeroes the slot; bytes are copied into byte slots
/// and read as text otherwise; text parses into strings, integers, floats and
/// booleans (`Y`/`N` or `true`/`false`); timestamps and booleans need a slot
/// of the same kind; floats and integers go into their own kind or are
/// formatted into strings.
pub fn coerce(value: WireValue, mut slot: Slot<'_>) -> Result<(), CoercionError> {
    let value = match value {
        WireValue::Bytes(bytes) => match slot {
            Slot::Bytes(dest) => {
                *dest = bytes;
                return Ok(());
            }
            _ => WireValue::Text(
                String::from_utf8(bytes)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
            ),
        },
        other => other,
    };

    let stored = match (&value, &mut slot) {
        (WireValue::Null, slot) => {
            slot.set_zero();
            true
        }
        (WireValue::Text(text), slot) => store_text(text, slot),
        (WireValue::Timestamp(t), Slot::Timestamp(dest)) => {
            **dest = *t;
            true
        }
        (WireValue::Bool(b), Slot::Bool(dest)) => {
            **dest = *b;
            true
        }
        (WireValue::Float(f), Slot::Text(dest)) => {
            **dest = f.to_string();
            true
        }
        (WireValue::Float(f), slot) if slot.is_float() => store_float(*f, slot),
        (WireValue::Int(i), Slot::Text(dest)) => {
            **dest = i.to_string();
            true
        }
        (WireValue::Int(i), slot) if slot.is_integer() => store_int(*i as i128, slot),
        _ => false,
    };

    if stored {
        Ok(())
    } else {
        Err(CoercionError::new(&value, &slot))
    }
}

fn store_text(text: &str, slot: &mut Slot<'_>) -> bool {
    match slot {
        Slot::Text(dest) => {
            dest.clear();
            dest.push_str(text);
            true
        }
        Slot::Bool(dest) => match parse_bool(text) {
            Some(b) => {
                **dest = b;
                true
            }
            None => false,
        },
        slot if slot.is_integer() => text
            .parse::<i128>()
            .map_or(false, |i| store_int(i, slot)),
        slot if slot.is_float() => text.parse::<f64>().map_or(false, |f| store_float(f, slot)),
        _ => false,
    }
}

/// `Y`/`N` in any case, then the usual `true`/`false`/`t`/`f`/`1`/`0`.
pub fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("y") {
        return Some(true);
    }
    if text.eq_ignore_ascii_case("n") {
        return Some(false);
    }
    match text.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

fn store_float(f: f64, slot: &mut Slot<'_>) -> bool {
    match slot {
        Slot::F64(dest) => **dest = f,
        Slot::F32(dest) => **dest = f as f32,
        _ => return false,
    }
    true
}

// Out-of-range values are rejected rather than truncated.
fn store_int(i: i128, slot: &mut Slot<'_>) -> bool {
    macro_rules! narrow {
        ($dest:expr) => {
            match i.try_into() {
                Ok(v) => {
                    **$dest = v;
                    true
                }
                Err(_) => false,
            }
        };
    }
    match slot {
        Slot::I8(dest) => narrow!(dest),
        Slot::I16(dest) => narrow!(dest),
        Slot::I32(dest) => narrow!(dest),
        Slot::I64(dest) => narrow!(dest),
        Slot::Isize(dest) => narrow!(dest),
        Slot::U8(dest) => narrow!(dest),
        Slot::U16(dest) => narrow!(dest),
        Slot::U32(dest) => narrow!(dest),
        Slot::U64(dest) => narrow!(dest),
        Slot::Usize(dest) => narrow!(dest),
        _ => false,
    }
}
