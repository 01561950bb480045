//! # Extended value codec
//!
//! Plain JSON has no arbitrary-precision integer and no date/time type. This
//! module carries both through the wire as strings:
//!
//! | In memory | On the wire |
//! |-----------|-------------|
//! | [`ExtValue::BigInt`] | decimal digits, e.g. `"123456789012345678901234567890"` |
//! | [`ExtValue::DateTime`] | UTC ISO-8601 with a literal `Z`, e.g. `"2024-05-01T12:00:00.250Z"` |
//!
//! [`decode`] reinterprets *every* string matching those shapes, including
//! strings that were never meant as numbers or instants. A string parameter
//! `"42"` arrives at the handler as a big integer.
//!
//! Only instants in years 0000 through 9999 round-trip. Outside that range
//! chrono writes a signed year (`"+10000-01-01T00:00:00Z"`), which the
//! four-digit date pattern rejects, so the value decodes as a plain string.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use num_bigint::BigUint;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

lazy_static::lazy_static! {
    /// Digits with an optional trailing `n`
    static ref BIGINT_PATTERN: Regex = Regex::new(r"^[0-9]+n?$").expect("valid big integer pattern");
    /// `YYYY-MM-DDTHH:MM:SS[.fraction]Z`
    static ref DATETIME_PATTERN: Regex =
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?Z$")
            .expect("valid date/time pattern");
}

/// Insertion-ordered object map of extended values
pub type ExtMap = IndexMap<String, ExtValue>;

/// A JSON value extended with big integers and UTC instants
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    BigInt(BigUint),
    /// Round-trips through the wire for years 0000 to 9999 only
    DateTime(DateTime<Utc>),
    Array(Vec<ExtValue>),
    Object(ExtMap),
}

/// Encode an extended value into plain JSON.
pub fn encode(value: &ExtValue) -> Value {
    match value {
        ExtValue::Null => Value::Null,
        ExtValue::Bool(b) => Value::Bool(*b),
        ExtValue::Number(n) => Value::Number(n.clone()),
        ExtValue::String(s) => Value::String(s.clone()),
        ExtValue::BigInt(n) => Value::String(n.to_str_radix(10)),
        ExtValue::DateTime(dt) => Value::String(encode_datetime(dt)),
        ExtValue::Array(items) => Value::Array(items.iter().map(encode).collect()),
        ExtValue::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), encode(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

/// Decode plain JSON, reconstructing big integers and instants from strings.
pub fn decode(value: Value) -> ExtValue {
    match value {
        Value::Null => ExtValue::Null,
        Value::Bool(b) => ExtValue::Bool(b),
        Value::Number(n) => ExtValue::Number(n),
        Value::String(s) => decode_string(s),
        Value::Array(items) => ExtValue::Array(items.into_iter().map(decode).collect()),
        Value::Object(map) => {
            ExtValue::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect())
        }
    }
}

fn decode_string(s: String) -> ExtValue {
    if BIGINT_PATTERN.is_match(&s) {
        let digits = s.strip_suffix('n').unwrap_or(&s);
        if let Ok(n) = digits.parse::<BigUint>() {
            return ExtValue::BigInt(n);
        }
    } else if DATETIME_PATTERN.is_match(&s) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return ExtValue::DateTime(dt.with_timezone(&Utc));
        }
    }
    ExtValue::String(s)
}

/// Sub-second digits are emitted only when non-zero (0, 3, 6 or 9 of them),
/// so no precision is dropped.
fn encode_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl ExtValue {
    /// An empty object
    pub fn object() -> Self {
        ExtValue::Object(ExtMap::new())
    }

    /// Lift plain JSON without reinterpreting any strings
    pub fn from_json_verbatim(value: Value) -> Self {
        match value {
            Value::Null => ExtValue::Null,
            Value::Bool(b) => ExtValue::Bool(b),
            Value::Number(n) => ExtValue::Number(n),
            Value::String(s) => ExtValue::String(s),
            Value::Array(items) => {
                ExtValue::Array(items.into_iter().map(Self::from_json_verbatim).collect())
            }
            Value::Object(map) => ExtValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json_verbatim(v)))
                    .collect(),
            ),
        }
    }

    /// Wire form of this value
    pub fn to_json(&self) -> Value {
        encode(self)
    }

    /// Field lookup on objects
    pub fn get(&self, key: &str) -> Option<&ExtValue> {
        match self {
            ExtValue::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Element lookup on arrays
    pub fn get_index(&self, index: usize) -> Option<&ExtValue> {
        match self {
            ExtValue::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExtValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExtValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ExtValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ExtValue::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExtValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigUint> {
        match self {
            ExtValue::BigInt(n) => Some(n),
            _ => None,
        }
    }

    /// Big integer view that also accepts non-negative JSON integers
    pub fn to_bigint(&self) -> Option<BigUint> {
        match self {
            ExtValue::BigInt(n) => Some(n.clone()),
            ExtValue::Number(n) => n.as_u64().map(BigUint::from),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            ExtValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ExtValue>> {
        match self {
            ExtValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ExtMap> {
        match self {
            ExtValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for ExtValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode(self))
    }
}

impl Serialize for ExtValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ExtValue::Null => serializer.serialize_unit(),
            ExtValue::Bool(b) => serializer.serialize_bool(*b),
            ExtValue::Number(n) => n.serialize(serializer),
            ExtValue::String(s) => serializer.serialize_str(s),
            ExtValue::BigInt(n) => serializer.serialize_str(&n.to_str_radix(10)),
            ExtValue::DateTime(dt) => serializer.serialize_str(&encode_datetime(dt)),
            ExtValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ExtValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ExtValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(decode)
    }
}

impl From<Value> for ExtValue {
    /// Verbatim lift, see [`ExtValue::from_json_verbatim`]. Use [`decode`]
    /// for values that came off the wire.
    fn from(value: Value) -> Self {
        ExtValue::from_json_verbatim(value)
    }
}

impl From<ExtValue> for Value {
    fn from(value: ExtValue) -> Self {
        encode(&value)
    }
}

impl From<bool> for ExtValue {
    fn from(b: bool) -> Self {
        ExtValue::Bool(b)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ExtValue {
                fn from(n: $ty) -> Self {
                    ExtValue::Number(Number::from(n))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for ExtValue {
    /// Non-finite floats become `null`, as in `serde_json::json!`
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(ExtValue::Null, ExtValue::Number)
    }
}

impl From<&str> for ExtValue {
    fn from(s: &str) -> Self {
        ExtValue::String(s.to_string())
    }
}

impl From<String> for ExtValue {
    fn from(s: String) -> Self {
        ExtValue::String(s)
    }
}

impl From<BigUint> for ExtValue {
    fn from(n: BigUint) -> Self {
        ExtValue::BigInt(n)
    }
}

impl From<DateTime<Utc>> for ExtValue {
    fn from(dt: DateTime<Utc>) -> Self {
        ExtValue::DateTime(dt)
    }
}

impl From<ExtMap> for ExtValue {
    fn from(map: ExtMap) -> Self {
        ExtValue::Object(map)
    }
}

impl<T: Into<ExtValue>> From<Vec<T>> for ExtValue {
    fn from(items: Vec<T>) -> Self {
        ExtValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ExtValue>> From<Option<T>> for ExtValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ExtValue::Null, Into::into)
    }
}

impl<K: Into<String>> FromIterator<(K, ExtValue)> for ExtValue {
    fn from_iter<I: IntoIterator<Item = (K, ExtValue)>>(iter: I) -> Self {
        ExtValue::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl FromIterator<ExtValue> for ExtValue {
    fn from_iter<I: IntoIterator<Item = ExtValue>>(iter: I) -> Self {
        ExtValue::Array(iter.into_iter().collect())
    }
}
