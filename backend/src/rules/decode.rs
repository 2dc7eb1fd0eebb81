//! Path-aware structural decoding.
//!
//! Rule documents arrive as loosely typed JSON written by a proposer. Plain
//! serde derives would report "missing field `row`" with no hint of *which*
//! `row`, so every rule type decodes itself through [`Decode`], carrying the
//! [`FieldPath`] down the tree and quoting it in each [`StructuralError`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{StructuralError, StructuralResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a field inside a rule document, e.g.
/// `areas[0].data_headers.roles[1].source`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<document>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Types decodable from a JSON value at a known path.
pub trait Decode: Sized {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self>;
}

/// Short name of a JSON value's type for messages.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn invalid(path: &FieldPath, message: impl Into<String>) -> StructuralError {
    StructuralError::InvalidField {
        path: path.to_string(),
        message: message.into(),
    }
}

/// Decode an array element by element, extending the path with indices.
pub fn decode_array<T: Decode>(value: &Value, path: &FieldPath) -> StructuralResult<Vec<T>> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(path, format!("expected an array, found {}", json_type(value))))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| T::decode(item, &path.index(i)))
        .collect()
}

/// A JSON object whose key set has been checked against the allowed fields.
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: FieldPath,
}

impl<'a> Fields<'a> {
    /// Reject non-objects and unknown keys.
    pub fn new(value: &'a Value, path: &FieldPath, allowed: &[&str]) -> StructuralResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| invalid(path, format!("expected an object, found {}", json_type(value))))?;
        if let Some(unknown) = map.keys().find(|key| !allowed.contains(&key.as_str())) {
            return Err(StructuralError::UnknownField {
                path: path.key(unknown).to_string(),
            });
        }
        Ok(Self {
            map,
            path: path.clone(),
        })
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn at(&self, key: &str) -> FieldPath {
        self.path.key(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The value under `key`; an explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn required(&self, key: &str) -> StructuralResult<&'a Value> {
        self.get(key).ok_or_else(|| StructuralError::MissingField {
            path: self.at(key).to_string(),
        })
    }

    /// Deserialize a leaf field with serde.
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> StructuralResult<Option<T>> {
        self.get(key)
            .map(|value| T::deserialize(value).map_err(|e| invalid(&self.at(key), e.to_string())))
            .transpose()
    }

    pub fn parse_required<T: DeserializeOwned>(&self, key: &str) -> StructuralResult<T> {
        let value = self.required(key)?;
        T::deserialize(value).map_err(|e| invalid(&self.at(key), e.to_string()))
    }

    pub fn decode<T: Decode>(&self, key: &str) -> StructuralResult<Option<T>> {
        self.get(key).map(|value| T::decode(value, &self.at(key))).transpose()
    }

    pub fn decode_required<T: Decode>(&self, key: &str) -> StructuralResult<T> {
        T::decode(self.required(key)?, &self.at(key))
    }

    /// Decode a list field; absent or `null` is an empty list.
    pub fn decode_list<T: Decode>(&self, key: &str) -> StructuralResult<Vec<T>> {
        match self.get(key) {
            Some(value) => decode_array(value, &self.at(key)),
            None => Ok(Vec::new()),
        }
    }

    /// Check a fixed string literal such as `kind`. Absent is accepted when
    /// `required` is false.
    pub fn literal(&self, key: &str, expected: &str, required: bool) -> StructuralResult<()> {
        let value = match self.get(key) {
            Some(value) => value,
            None if required => {
                return Err(StructuralError::MissingField {
                    path: self.at(key).to_string(),
                })
            }
            None => return Ok(()),
        };
        match value.as_str() {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(invalid(
                &self.at(key),
                format!("must be '{}', found '{}'", expected, found),
            )),
            None => Err(invalid(
                &self.at(key),
                format!("expected the string '{}', found {}", expected, json_type(value)),
            )),
        }
    }
}
