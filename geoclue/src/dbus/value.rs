//! Coercion between bus values and Rust scalars.
//!
//! Every property read or method return travels as a [`zvariant::OwnedValue`].
//! [`RemoteValue`] maps those onto the handful of scalar kinds GeoClue uses,
//! and refuses (rather than defaulting) when the kind is wrong.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zvariant::{OwnedObjectPath, OwnedValue, StructureBuilder, Value};

use crate::Result;
use crate::api::models::{AccuracyLevel, GeoclueError};
use crate::types::constants::NULL_OBJECT_PATH;

/// A Rust type that can be read from and written to the bus.
pub trait RemoteValue: Sized {
    /// D-Bus signature of the wire representation.
    const WIRE_SIGNATURE: &'static str;

    /// Extracts `Self` from a bus value, or `None` if the kind differs.
    fn from_value(value: &Value<'_>) -> Option<Self>;

    /// Encodes `self` for the bus.
    fn into_value(self) -> Result<OwnedValue>;
}

impl RemoteValue for bool {
    const WIRE_SIGNATURE: &'static str = "b";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::Bool(self))?)
    }
}

impl RemoteValue for u32 {
    const WIRE_SIGNATURE: &'static str = "u";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::U32(n) => Some(*n),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::U32(self))?)
    }
}

impl RemoteValue for u64 {
    const WIRE_SIGNATURE: &'static str = "t";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::U64(n) => Some(*n),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::U64(self))?)
    }
}

impl RemoteValue for f64 {
    const WIRE_SIGNATURE: &'static str = "d";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::F64(n) => Some(*n),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::F64(self))?)
    }
}

impl RemoteValue for String {
    const WIRE_SIGNATURE: &'static str = "s";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.as_str().to_owned()),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::from(self))?)
    }
}

impl RemoteValue for OwnedObjectPath {
    const WIRE_SIGNATURE: &'static str = "o";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        match value {
            Value::ObjectPath(p) => Some(OwnedObjectPath::from(p.clone())),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        Ok(OwnedValue::try_from(Value::ObjectPath(self.into_inner()))?)
    }
}

/// Timestamps travel as `(tt)`: seconds and microseconds since the epoch.
impl RemoteValue for SystemTime {
    const WIRE_SIGNATURE: &'static str = "(tt)";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        let Value::Structure(s) = value else {
            return None;
        };
        match s.fields() {
            [Value::U64(secs), Value::U64(usecs)] => UNIX_EPOCH
                .checked_add(Duration::from_secs(*secs))?
                .checked_add(Duration::from_micros(*usecs)),
            _ => None,
        }
    }

    fn into_value(self) -> Result<OwnedValue> {
        // pre-epoch times are clamped to the epoch
        let since = self.duration_since(UNIX_EPOCH).unwrap_or_default();
        let pair = StructureBuilder::new()
            .add_field(since.as_secs())
            .add_field(u64::from(since.subsec_micros()))
            .build()?;
        Ok(OwnedValue::try_from(Value::Structure(pair))?)
    }
}

impl RemoteValue for AccuracyLevel {
    const WIRE_SIGNATURE: &'static str = "u";

    fn from_value(value: &Value<'_>) -> Option<Self> {
        u32::from_value(value).map(AccuracyLevel::from)
    }

    fn into_value(self) -> Result<OwnedValue> {
        u32::from(self).into_value()
    }
}

/// Decodes a bus value into `T`, unwrapping nested variants first.
///
/// `name` only labels the error.
pub(crate) fn decode<T: RemoteValue>(name: &str, value: &OwnedValue) -> Result<T> {
    let inner = peel(value);
    T::from_value(inner).ok_or_else(|| GeoclueError::TypeMismatch {
        name: name.to_owned(),
        expected: T::WIRE_SIGNATURE,
        found: inner.value_signature().to_string(),
    })
}

fn peel<'v, 'a>(value: &'v Value<'a>) -> &'v Value<'a> {
    match value {
        Value::Value(inner) => peel(inner),
        other => other,
    }
}

/// Returns `true` if `path` is the bus's "no object" sentinel.
///
/// GeoClue sets object-reference properties to `/` until they are
/// populated; a blank token is treated the same way.
pub fn is_null_object(path: &str) -> bool {
    let trimmed = path.trim();
    trimmed.is_empty() || trimmed == NULL_OBJECT_PATH
}

/// Splits `org.example.Iface.Member` into `("org.example.Iface", "Member")`.
pub(crate) fn split_member(qualified: &str) -> Result<(&str, &str)> {
    match qualified.rsplit_once('.') {
        Some((interface, member)) if !interface.is_empty() && !member.is_empty() => {
            Ok((interface, member))
        }
        _ => Err(GeoclueError::InvalidMember(qualified.to_owned())),
    }
}
