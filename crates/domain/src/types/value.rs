//! Row payload types
//!
//! Values are kept storage-agnostic so the engine can move rows without
//! knowing the adapter's native value type.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// TEXT whose stored bytes are not valid UTF-8, kept byte for byte.
    RawText(Vec<u8>),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text from storage: valid UTF-8 becomes [`SqlValue::Text`], anything
    /// else is kept as [`SqlValue::RawText`].
    pub fn text_from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::RawText(bytes.to_vec()),
        }
    }

    /// Bytes of a TEXT value, whichever variant holds it.
    pub fn text_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(v) => Some(v.as_bytes()),
            Self::RawText(v) => Some(v),
            _ => None,
        }
    }

    /// SQL-style ordering: numbers compare numerically across integer/real,
    /// text lexically, blobs bytewise. `None` when either side is NULL or the
    /// storage classes differ.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Real(b)) => (*a as f64).partial_cmp(b),
            (Self::Real(a), Self::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Real(a), Self::Real(b)) => a.partial_cmp(b),
            (Self::Blob(a), Self::Blob(b)) => Some(a.cmp(b)),
            _ => self.text_bytes().zip(other.text_bytes()).map(|(a, b)| a.cmp(b)),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::RawText(v) => write!(f, "'{}'", String::from_utf8_lossy(v)),
            Self::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Real(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::RawText(v) | Self::Blob(v) => serializer.serialize_bytes(v),
        }
    }
}

struct SqlValueVisitor;

impl<'de> Visitor<'de> for SqlValueVisitor {
    type Value = SqlValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar value (null, boolean, number, string or bytes)")
    }

    fn visit_unit<E: de::Error>(self) -> Result<SqlValue, E> {
        Ok(SqlValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<SqlValue, E> {
        Ok(SqlValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<SqlValue, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<SqlValue, E> {
        Ok(SqlValue::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<SqlValue, E> {
        Ok(SqlValue::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<SqlValue, E> {
        i64::try_from(v)
            .map(SqlValue::Integer)
            .map_err(|_| E::custom(format!("integer {v} does not fit in a signed 64-bit column")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<SqlValue, E> {
        Ok(SqlValue::Real(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<SqlValue, E> {
        Ok(SqlValue::Text(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<SqlValue, E> {
        Ok(SqlValue::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<SqlValue, E> {
        Ok(SqlValue::Blob(v.to_vec()))
    }
}

impl<'de> Deserialize<'de> for SqlValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SqlValueVisitor)
    }
}

/// One source row: column names paired with their values, in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRow {
    columns: Vec<(String, SqlValue)>,
}

impl ArchiveRow {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    /// Builder-style helper used heavily by tests and adapters.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn columns(&self) -> &[(String, SqlValue)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_mixes_integer_and_real() {
        assert_eq!(SqlValue::Integer(2).compare(&SqlValue::Real(2.5)), Some(Ordering::Less));
        assert_eq!(SqlValue::Real(3.0).compare(&SqlValue::Integer(3)), Some(Ordering::Equal));
    }

    #[test]
    fn compare_with_null_is_unknown() {
        assert_eq!(SqlValue::Null.compare(&SqlValue::Integer(1)), None);
        assert_eq!(SqlValue::Text("a".into()).compare(&SqlValue::Integer(1)), None);
    }

    #[test]
    fn text_bytes_keep_invalid_utf8() {
        assert_eq!(SqlValue::text_from_bytes(b"closed"), SqlValue::Text("closed".into()));

        let raw = SqlValue::text_from_bytes(&[0xC3, 0xFF, 0x41]);
        assert_eq!(raw, SqlValue::RawText(vec![0xC3, 0xFF, 0x41]));
        assert_eq!(raw.text_bytes(), Some(&[0xC3_u8, 0xFF, 0x41][..]));
        assert_eq!(raw.compare(&SqlValue::Text("A".into())), Some(Ordering::Greater));
        assert_eq!(raw.compare(&SqlValue::Blob(vec![0xC3])), None);
    }

    #[test]
    fn deserializes_scalars_from_json() {
        let values: Vec<SqlValue> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "closed"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                SqlValue::Null,
                SqlValue::Integer(1),
                SqlValue::Integer(7),
                SqlValue::Real(1.5),
                SqlValue::Text("closed".into()),
            ]
        );
    }

    #[test]
    fn nested_list_is_rejected() {
        let result: std::result::Result<SqlValue, _> = serde_json::from_str("[1, 2]");
        assert!(result.is_err());
    }

    #[test]
    fn row_lookup_by_column() {
        let row = ArchiveRow::default().with("id", 4_i64).with("status", "closed");
        assert_eq!(row.get("status"), Some(&SqlValue::Text("closed".into())));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["id", "status"]);
    }
}
