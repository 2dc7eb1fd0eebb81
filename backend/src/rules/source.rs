//! Where a value comes from: one cell, a walked range of cells, or a literal.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode::{invalid, json_type, Decode, FieldPath, Fields};
use crate::error::{StructuralError, StructuralResult};

/// Zero-based cell address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The neighbouring cell in `direction`, `None` when it would fall off
    /// the top or left edge.
    pub fn step(self, direction: Direction) -> Option<Coord> {
        match direction {
            Direction::Left => self.col.checked_sub(1).map(|col| Coord::new(self.row, col)),
            Direction::Right => Some(Coord::new(self.row, self.col + 1)),
            Direction::Up => self.row.checked_sub(1).map(|row| Coord::new(row, self.col)),
            Direction::Down => Some(Coord::new(self.row + 1, self.col)),
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

fn non_negative(fields: &Fields, key: &str) -> StructuralResult<usize> {
    let value = fields.required(key)?;
    match value.as_i64() {
        Some(n) if n < 0 => Err(invalid(
            &fields.at(key),
            format!("must not be negative (got {})", n),
        )),
        Some(n) => Ok(n as usize),
        None => Err(invalid(
            &fields.at(key),
            format!("expected a non-negative integer, found {}", json_type(value)),
        )),
    }
}

impl Decode for Coord {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["row", "col"])?;
        Ok(Coord {
            row: non_negative(&fields, "row")?,
            col: non_negative(&fields, "col")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    pub fn is_perpendicular(self, other: Direction) -> bool {
        self.is_vertical() != other.is_vertical()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cells walked from `coord` in `direction`. `max_count: None` walks to the
/// grid boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoordRange {
    pub coord: Coord,
    pub direction: Direction,
    pub max_count: Option<usize>,
}

impl CoordRange {
    pub fn new(coord: Coord, direction: Direction) -> Self {
        Self {
            coord,
            direction,
            max_count: None,
        }
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }
}

impl Decode for CoordRange {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["coord", "direction", "max_count"])?;
        let max_count = match fields.get("max_count") {
            None => None,
            Some(v) => match v.as_i64() {
                Some(n) if n < 0 => {
                    return Err(StructuralError::NegativeCount {
                        path: fields.at("max_count").to_string(),
                        value: n,
                    })
                }
                Some(n) => Some(n as usize),
                None => {
                    return Err(invalid(
                        &fields.at("max_count"),
                        format!("expected an integer or null, found {}", json_type(v)),
                    ))
                }
            },
        };
        Ok(CoordRange {
            coord: fields.decode_required("coord")?,
            direction: fields.parse_required("direction")?,
            max_count,
        })
    }
}

/// A literal scalar from the rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// `{"value": ...}`: a constant that ignores the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Literal {
    pub value: Scalar,
}

impl Decode for Literal {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["value"])?;
        Ok(Literal {
            value: fields.parse_required("value")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Source {
    Coord(Coord),
    Range(CoordRange),
    Value(Literal),
}

impl Source {
    pub fn literal(value: impl Into<Scalar>) -> Self {
        Source::Value(Literal {
            value: value.into(),
        })
    }

    pub fn as_range(&self) -> Option<&CoordRange> {
        match self {
            Source::Range(range) => Some(range),
            _ => None,
        }
    }
}

/// Shapes in decoding order, with the keys each one owns.
const SHAPES: [(&str, &[&str]); 3] = [
    ("coord", &["row", "col"]),
    ("range", &["coord", "direction", "max_count"]),
    ("value", &["value"]),
];

impl Decode for Source {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| invalid(path, format!("expected a source object, found {}", json_type(value))))?;

        if let Some(stray) = map
            .keys()
            .find(|key| SHAPES.iter().all(|(_, keys)| !keys.contains(&key.as_str())))
        {
            return Err(StructuralError::AmbiguousSource {
                path: path.to_string(),
                message: format!(
                    "key '{}' matches none of coord {{row, col}}, range {{coord, direction, max_count}}, value {{value}}",
                    stray
                ),
            });
        }

        let touched: Vec<&str> = SHAPES
            .iter()
            .filter(|(_, keys)| map.keys().any(|key| keys.contains(&key.as_str())))
            .map(|(name, _)| *name)
            .collect();

        match touched.as_slice() {
            ["coord"] => Coord::decode(value, path).map(Source::Coord),
            ["range"] => CoordRange::decode(value, path).map(Source::Range),
            ["value"] => Literal::decode(value, path).map(Source::Value),
            [] => Err(StructuralError::AmbiguousSource {
                path: path.to_string(),
                message: "empty object matches none of coord, range, value".to_string(),
            }),
            several => Err(StructuralError::AmbiguousSource {
                path: path.to_string(),
                message: format!("mixes fields of {}", several.join(" and ")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> StructuralResult<Source> {
        Source::decode(&value, &FieldPath::root().key("source"))
    }

    #[test]
    fn test_shapes() {
        assert_eq!(decode(json!({"row": 1, "col": 2})).unwrap(), Source::Coord(Coord::new(1, 2)));
        assert_eq!(
            decode(json!({"coord": {"row": 0, "col": 1}, "direction": "right"})).unwrap(),
            Source::Range(CoordRange::new(Coord::new(0, 1), Direction::Right))
        );
        assert_eq!(
            decode(json!({"coord": {"row": 0, "col": 1}, "direction": "down", "max_count": null})).unwrap(),
            Source::Range(CoordRange::new(Coord::new(0, 1), Direction::Down))
        );
        assert_eq!(decode(json!({"value": "Views"})).unwrap(), Source::literal("Views"));
        assert_eq!(
            decode(json!({"value": 3})).unwrap(),
            Source::Value(Literal { value: Scalar::Int(3) })
        );
    }

    #[test]
    fn test_mixed_shapes_are_ambiguous() {
        let err = decode(json!({"row": 1, "col": 2, "value": "x"})).unwrap_err();
        assert!(matches!(err, StructuralError::AmbiguousSource { ref path, .. } if path == "source"));
        assert!(err.to_string().contains("coord and value"));

        let err = decode(json!({"sheet": 1})).unwrap_err();
        assert!(matches!(err, StructuralError::AmbiguousSource { .. }));

        let err = decode(json!({})).unwrap_err();
        assert!(matches!(err, StructuralError::AmbiguousSource { .. }));
    }

    #[test]
    fn test_negative_counts() {
        let err = decode(json!({"coord": {"row": 0, "col": 0}, "direction": "up", "max_count": -1})).unwrap_err();
        assert_eq!(
            err,
            StructuralError::NegativeCount {
                path: "source.max_count".into(),
                value: -1
            }
        );
        let err = decode(json!({"row": -2, "col": 0})).unwrap_err();
        assert!(err.to_string().starts_with("source.row"));
    }

    #[test]
    fn test_bad_direction() {
        let err = decode(json!({"coord": {"row": 0, "col": 0}, "direction": "sideways"})).unwrap_err();
        assert!(err.to_string().starts_with("source.direction"));
    }

    #[test]
    fn test_missing_col() {
        let err = decode(json!({"row": 0})).unwrap_err();
        assert_eq!(
            err,
            StructuralError::MissingField {
                path: "source.col".into()
            }
        );
    }

    #[test]
    fn test_step_stops_at_edges() {
        let origin = Coord::new(0, 0);
        assert_eq!(origin.step(Direction::Up), None);
        assert_eq!(origin.step(Direction::Left), None);
        assert_eq!(origin.step(Direction::Down), Some(Coord::new(1, 0)));
        assert!(Direction::Right.is_perpendicular(Direction::Down));
        assert!(!Direction::Left.is_perpendicular(Direction::Right));
    }

    #[test]
    fn test_serializes_back_to_wire_shape() {
        let source = Source::Range(CoordRange::new(Coord::new(2, 0), Direction::Down).with_max_count(3));
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"coord": {"row": 2, "col": 0}, "direction": "down", "max_count": 3})
        );
    }
}
