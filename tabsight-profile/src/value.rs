//! Dynamic, order-preserving value tree used for profile output.
//!
//! Profiles are consumed by callers as opaque JSON-compatible data. Statistics
//! are computed as plain `f64`, which means a freshly built tree can still hold
//! NaN or infinite floats; [`crate::sanitize`] turns those into [`ProfileValue::Null`]
//! before the tree leaves the crate.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Ordered mapping used for every object node in a profile.
pub type ValueMap = IndexMap<String, ProfileValue>;

/// A nested profile value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ProfileValue>),
    Map(ValueMap),
}

impl ProfileValue {
    /// Build an empty map node.
    pub fn map() -> Self {
        ProfileValue::Map(ValueMap::new())
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        match self {
            ProfileValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Walk a path of map keys, e.g. `["summary", "Age", "mean"]`.
    pub fn pointer<'a, I>(&self, path: I) -> Option<&ProfileValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        path.into_iter()
            .try_fold(self, |node, key| node.get(key))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ProfileValue::Float(v) => Some(*v),
            ProfileValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ProfileValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProfileValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ProfileValue]> {
        match self {
            ProfileValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            ProfileValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ProfileValue::Null)
    }

    /// Convert into a `serde_json::Value`, keeping key order.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ProfileValue::Null => serde_json::Value::Null,
            ProfileValue::Bool(b) => serde_json::Value::Bool(*b),
            ProfileValue::Int(i) => serde_json::Value::from(*i),
            ProfileValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ProfileValue::Text(s) => serde_json::Value::String(s.clone()),
            ProfileValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ProfileValue::to_json).collect())
            }
            ProfileValue::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for ProfileValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfileValue::Null => serializer.serialize_unit(),
            ProfileValue::Bool(b) => serializer.serialize_bool(*b),
            ProfileValue::Int(i) => serializer.serialize_i64(*i),
            ProfileValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            ProfileValue::Float(_) => serializer.serialize_unit(),
            ProfileValue::Text(s) => serializer.serialize_str(s),
            ProfileValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ProfileValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl From<bool> for ProfileValue {
    fn from(v: bool) -> Self {
        ProfileValue::Bool(v)
    }
}

impl From<i64> for ProfileValue {
    fn from(v: i64) -> Self {
        ProfileValue::Int(v)
    }
}

impl From<usize> for ProfileValue {
    fn from(v: usize) -> Self {
        ProfileValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ProfileValue {
    fn from(v: f64) -> Self {
        ProfileValue::Float(v)
    }
}

impl From<&str> for ProfileValue {
    fn from(v: &str) -> Self {
        ProfileValue::Text(v.to_string())
    }
}

impl From<String> for ProfileValue {
    fn from(v: String) -> Self {
        ProfileValue::Text(v)
    }
}

impl<T: Into<ProfileValue>> From<Option<T>> for ProfileValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ProfileValue::Null)
    }
}

impl From<Vec<ProfileValue>> for ProfileValue {
    fn from(v: Vec<ProfileValue>) -> Self {
        ProfileValue::List(v)
    }
}

impl From<ValueMap> for ProfileValue {
    fn from(v: ValueMap) -> Self {
        ProfileValue::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_walks_nested_maps() {
        let mut inner = ValueMap::new();
        inner.insert("mean".to_string(), ProfileValue::Float(2.5));
        let mut outer = ValueMap::new();
        outer.insert("Age".to_string(), ProfileValue::Map(inner));
        let value = ProfileValue::Map(outer);

        assert_eq!(
            value.pointer(["Age", "mean"]).and_then(ProfileValue::as_f64),
            Some(2.5)
        );
        assert!(value.pointer(["Age", "std"]).is_none());
        assert!(value.pointer(["Fare"]).is_none());
    }

    #[test]
    fn test_serialize_keeps_order_and_nulls_non_finite() {
        let mut map = ValueMap::new();
        map.insert("z".to_string(), ProfileValue::Int(1));
        map.insert("a".to_string(), ProfileValue::Float(f64::NAN));
        map.insert("m".to_string(), ProfileValue::Float(f64::INFINITY));
        let json = serde_json::to_string(&ProfileValue::Map(map)).unwrap();
        assert_eq!(json, r#"{"z":1,"a":null,"m":null}"#);
    }

    #[test]
    fn test_to_json_matches_serialize() {
        let value = ProfileValue::List(vec![
            ProfileValue::from("x"),
            ProfileValue::from(3usize),
            ProfileValue::from(Some(1.5)),
            ProfileValue::from(None::<f64>),
        ]);
        let via_serde = serde_json::to_value(&value).unwrap();
        assert_eq!(value.to_json(), via_serde);
    }
}
