//! Areas and the top-level parser definition.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::decode::{invalid, Decode, FieldPath, Fields};
use super::extractors::{
    is_reserved_column, DateOrigin, DateSource, DimensionSource, HeaderRole, MetricSource, OrganizationSource,
    Role, TitleIdSource, TitleSource,
};
use super::params::Action;
use super::source::{CoordRange, Direction, Source};
use crate::error::{StructuralError, StructuralResult};

/// The only area kind currently defined.
pub const NON_COUNTER_GENERIC: &str = "non_counter.generic";

/// Serializes as the fixed `"non_counter.generic"` literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonCounterGenericKind;

impl Serialize for NonCounterGenericKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(NON_COUNTER_GENERIC)
    }
}

/// Where the header cells are and which way the data runs from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataHeaders {
    pub roles: Vec<HeaderRole>,
    pub data_cells: CoordRange,
    pub data_direction: Direction,
}

fn check_perpendicular(
    source: &Source,
    path: &FieldPath,
    data_direction: Direction,
) -> StructuralResult<()> {
    if let Some(range) = source.as_range() {
        if !range.direction.is_perpendicular(data_direction) {
            return Err(StructuralError::NotPerpendicular {
                path: path.key("direction").to_string(),
                found: range.direction.to_string(),
                data_direction: data_direction.to_string(),
            });
        }
    }
    Ok(())
}

impl Decode for DataHeaders {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["roles", "data_cells", "data_direction"])?;
        let data_direction: Direction = fields.parse_required("data_direction")?;
        let data_cells: CoordRange = fields.decode_required("data_cells")?;
        if !data_cells.direction.is_perpendicular(data_direction) {
            return Err(StructuralError::NotPerpendicular {
                path: fields.at("data_cells").key("direction").to_string(),
                found: data_cells.direction.to_string(),
                data_direction: data_direction.to_string(),
            });
        }

        let roles: Vec<HeaderRole> = fields.decode_list("roles")?;
        for (i, role) in roles.iter().enumerate() {
            let role_path = fields.at("roles").index(i);
            match role {
                HeaderRole::Metric(metric) => {
                    check_perpendicular(&metric.source, &role_path.key("source"), data_direction)?
                }
                HeaderRole::Date(date) => check_date_perpendicular(date, &role_path, data_direction)?,
            }
        }

        Ok(Self {
            roles,
            data_cells,
            data_direction,
        })
    }
}

fn check_date_perpendicular(
    date: &DateSource,
    path: &FieldPath,
    data_direction: Direction,
) -> StructuralResult<()> {
    match &date.origin {
        DateOrigin::Direct(source) => {
            check_perpendicular(source, &path.key("source"), data_direction)
        }
        DateOrigin::Composed(parts) => {
            let composed = path.key("composed");
            check_perpendicular(&parts.year.source, &composed.key("year").key("source"), data_direction)?;
            check_perpendicular(&parts.month.source, &composed.key("month").key("source"), data_direction)
        }
    }
}

/// One rectangular block of the grid. Only `non_counter.generic` exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Area {
    pub data_headers: DataHeaders,
    pub metrics: Option<MetricSource>,
    pub dates: Option<DateSource>,
    pub titles: Option<TitleSource>,
    pub title_ids: Vec<TitleIdSource>,
    pub dimensions: Vec<DimensionSource>,
    pub organizations: Option<OrganizationSource>,
    pub kind: NonCounterGenericKind,
}

impl Area {
    pub fn header_metric(&self) -> Option<&MetricSource> {
        self.data_headers.roles.iter().find_map(|role| match role {
            HeaderRole::Metric(metric) => Some(metric),
            HeaderRole::Date(_) => None,
        })
    }

    pub fn header_date(&self) -> Option<&DateSource> {
        self.data_headers.roles.iter().find_map(|role| match role {
            HeaderRole::Date(date) => Some(date),
            HeaderRole::Metric(_) => None,
        })
    }

    fn check_sourced_once(&self, path: &FieldPath, role: Role, area_level: bool) -> StructuralResult<()> {
        let in_headers = self
            .data_headers
            .roles
            .iter()
            .filter(|r| r.role() == role)
            .count();
        match in_headers + usize::from(area_level) {
            0 => Err(StructuralError::MissingRole {
                path: path.to_string(),
                role,
            }),
            1 => Ok(()),
            _ => Err(StructuralError::DuplicateRole {
                path: path.to_string(),
                role,
            }),
        }
    }
}

impl Decode for Area {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(
            value,
            path,
            &[
                "data_headers",
                "metrics",
                "dates",
                "titles",
                "title_ids",
                "dimensions",
                "organizations",
                "kind",
            ],
        )?;
        fields.literal("kind", NON_COUNTER_GENERIC, false)?;

        let area = Area {
            data_headers: fields.decode_required("data_headers")?,
            metrics: fields.decode("metrics")?,
            dates: fields.decode("dates")?,
            titles: fields.decode("titles")?,
            title_ids: fields.decode_list("title_ids")?,
            dimensions: fields.decode_list("dimensions")?,
            organizations: fields.decode("organizations")?,
            kind: NonCounterGenericKind,
        };

        area.check_sourced_once(path, Role::Metric, area.metrics.is_some())?;
        area.check_sourced_once(path, Role::Date, area.dates.is_some())?;

        let mut names = HashSet::new();
        for (i, dimension) in area.dimensions.iter().enumerate() {
            if !names.insert(dimension.name.as_str()) {
                return Err(invalid(
                    &fields.at("dimensions").index(i).key("name"),
                    format!("dimension '{}' is defined twice", dimension.name),
                ));
            }
        }
        let mut kinds = HashSet::new();
        for (i, id) in area.title_ids.iter().enumerate() {
            if !kinds.insert(id.name) {
                return Err(invalid(
                    &fields.at("title_ids").index(i).key("name"),
                    format!("title id '{}' is defined twice", id.name),
                ));
            }
        }

        Ok(area)
    }
}

/// Conditions a file must meet to be handled by a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Heuristics {
    pub conds: Vec<Value>,
    pub kind: HeuristicsKind,
}

/// Serializes as the fixed `"and"` literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeuristicsKind;

impl Serialize for HeuristicsKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("and")
    }
}

impl Decode for Heuristics {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["conds", "kind"])?;
        fields.literal("kind", "and", false)?;
        Ok(Self {
            conds: fields.parse("conds")?.unwrap_or_default(),
            kind: HeuristicsKind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFormat {
    pub name: String,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self {
            name: "format".to_string(),
        }
    }
}

impl Decode for DataFormat {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["name"])?;
        Ok(Self {
            name: fields.parse_required("name")?,
        })
    }
}

/// A complete rule document.
///
/// Immutable once decoded: a corrected proposal is decoded into a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParserDefinition {
    pub parser_name: String,
    pub data_format: DataFormat,
    pub platforms: Vec<String>,
    pub metrics_to_skip: Vec<String>,
    pub titles_to_skip: Vec<String>,
    pub available_metrics: Option<Vec<String>>,
    pub on_metric_check_failed: Action,
    pub areas: Vec<Area>,
    pub metric_aliases: Vec<(String, String)>,
    pub dimension_aliases: Vec<(String, String)>,
    pub heuristics: Heuristics,
    pub kind: NonCounterGenericKind,
}

/// Reject `from` mapped to two targets and targets that are renamed again.
fn check_aliases(aliases: &[(String, String)], path: &FieldPath) -> StructuralResult<()> {
    let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
    for (i, (from, to)) in aliases.iter().enumerate() {
        if let Some(first) = targets.insert(from.as_str(), to.as_str()) {
            if first != to.as_str() {
                return Err(StructuralError::ConflictingAlias {
                    path: path.index(i).to_string(),
                    from: from.clone(),
                    first: first.to_string(),
                    second: to.clone(),
                });
            }
        }
    }
    for (i, (from, to)) in aliases.iter().enumerate() {
        if from == to {
            continue;
        }
        if let Some(&next) = targets.get(to.as_str()) {
            if next != to.as_str() {
                return Err(StructuralError::AliasChain {
                    path: path.index(i).to_string(),
                    target: to.clone(),
                    next: next.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Dimension aliases must not rename onto a fixed output column, and must
/// not fold two dimensions of one area onto the same name.
fn check_dimension_aliases(
    aliases: &[(String, String)],
    areas: &[Area],
    fields: &Fields,
) -> StructuralResult<()> {
    let path = fields.at("dimension_aliases");
    for (i, (_, to)) in aliases.iter().enumerate() {
        if is_reserved_column(to) {
            return Err(invalid(
                &path.index(i),
                format!("alias target '{}' is a reserved output column", to),
            ));
        }
    }
    for (a, area) in areas.iter().enumerate() {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (d, dimension) in area.dimensions.iter().enumerate() {
            let canonical = resolve_alias(aliases, &dimension.name);
            if let Some(first) = seen.insert(canonical, dimension.name.as_str()) {
                return Err(invalid(
                    &fields.at("areas").index(a).key("dimensions").index(d).key("name"),
                    format!(
                        "dimensions '{}' and '{}' both map to '{}'",
                        first, dimension.name, canonical
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn resolve_alias<'a>(aliases: &'a [(String, String)], name: &'a str) -> &'a str {
    aliases
        .iter()
        .find(|(from, _)| from == name)
        .map(|(_, to)| to.as_str())
        .unwrap_or(name)
}

impl ParserDefinition {
    /// Decode a rule document from JSON text.
    pub fn from_json(json: &str) -> StructuralResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| StructuralError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> StructuralResult<Self> {
        Self::decode(value, &FieldPath::root())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Metric name after `metric_aliases`.
    pub fn canonical_metric<'a>(&'a self, name: &'a str) -> &'a str {
        resolve_alias(&self.metric_aliases, name)
    }

    /// Dimension name after `dimension_aliases`.
    pub fn canonical_dimension<'a>(&'a self, name: &'a str) -> &'a str {
        resolve_alias(&self.dimension_aliases, name)
    }
}

impl Decode for ParserDefinition {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(
            value,
            path,
            &[
                "parser_name",
                "data_format",
                "platforms",
                "metrics_to_skip",
                "titles_to_skip",
                "available_metrics",
                "on_metric_check_failed",
                "areas",
                "metric_aliases",
                "dimension_aliases",
                "heuristics",
                "kind",
            ],
        )?;
        fields.literal("kind", NON_COUNTER_GENERIC, false)?;

        let areas: Vec<Area> = fields.decode_list("areas")?;
        if areas.is_empty() {
            return Err(StructuralError::NoAreas);
        }

        let metric_aliases: Vec<(String, String)> =
            fields.parse("metric_aliases")?.unwrap_or_default();
        check_aliases(&metric_aliases, &fields.at("metric_aliases"))?;
        let dimension_aliases: Vec<(String, String)> =
            fields.parse("dimension_aliases")?.unwrap_or_default();
        check_aliases(&dimension_aliases, &fields.at("dimension_aliases"))?;
        check_dimension_aliases(&dimension_aliases, &areas, &fields)?;

        Ok(Self {
            parser_name: fields.parse_required("parser_name")?,
            data_format: fields.decode("data_format")?.unwrap_or_default(),
            platforms: fields.parse("platforms")?.unwrap_or_default(),
            metrics_to_skip: fields.parse("metrics_to_skip")?.unwrap_or_default(),
            titles_to_skip: fields.parse("titles_to_skip")?.unwrap_or_default(),
            available_metrics: fields.parse("available_metrics")?,
            on_metric_check_failed: fields
                .parse("on_metric_check_failed")?
                .unwrap_or(Action::Skip),
            areas,
            metric_aliases,
            dimension_aliases,
            heuristics: fields.decode("heuristics")?.unwrap_or_default(),
            kind: NonCounterGenericKind,
        })
    }
}

impl<'de> Deserialize<'de> for ParserDefinition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// A small definition for a month-per-column report:
///
/// ```text
///        | Jan-21 | Feb-21
/// Views  |   4    |   5
/// Clicks |   1    |   0
/// ```
pub fn example_definition() -> Value {
    serde_json::json!({
        "parser_name": "example_monthly_columns",
        "platforms": ["Example Platform"],
        "metrics_to_skip": [],
        "titles_to_skip": [],
        "available_metrics": ["Views", "Link Clicks"],
        "on_metric_check_failed": "skip",
        "metric_aliases": [["Clicks", "Link Clicks"]],
        "dimension_aliases": [],
        "areas": [{
            "data_headers": {
                "roles": [{
                    "source": {"coord": {"row": 0, "col": 1}, "direction": "right"},
                    "extract_params": {"on_validation_error": "fail"},
                    "date_pattern": "%b-%y",
                    "role": "date"
                }],
                "data_cells": {"coord": {"row": 1, "col": 1}, "direction": "right"},
                "data_direction": "down"
            },
            "metrics": {
                "source": {"coord": {"row": 1, "col": 0}, "direction": "down"},
                "role": "metric"
            },
            "dimensions": [{
                "name": "Platform",
                "source": {"value": "Example Platform"},
                "role": "dimension"
            }],
            "kind": "non_counter.generic"
        }],
        "heuristics": {"conds": [], "kind": "and"},
        "kind": "non_counter.generic"
    })
}

/// Reference of the rule document grammar, handed to proposers and printed
/// by the CLI.
pub fn grammar_description() -> &'static str {
    r#"
RULE DOCUMENT GRAMMAR (JSON):

Cells are addressed zero-based as {"row": R, "col": C}.

SOURCES (exactly one shape per object):
  {"row": 0, "col": 3}                                   single cell
  {"coord": {"row": 0, "col": 1}, "direction": "right",
   "max_count": 12}                                      walk from coord; max_count null/absent = to the edge
  {"value": "Views"}                                     literal, ignores the grid
  directions: "left" | "right" | "up" | "down"

EXTRACT PARAMS (optional on every extractor):
  {"regex": "...", "default": ..., "last_value_as_default": false,
   "on_validation_error": "fail" | "skip" | "stop" | "pass"}
  regex keeps the first capture group, or the whole match without groups.
  On failure: default, then last value (if enabled), then the action.

EXTRACTORS ({"source", "extract_params", "role"}):
  metric        {"role": "metric"}
  date          {"role": "date", "date_pattern": "%b-%y"}  or
                {"role": "date", "composed": {"year": <date>, "month": <date>}}
  title         {"role": "title"}
  title_id      {"role": "title_id", "name": "ISBN" | "Print_ISSN" | "Online_ISSN" |
                                             "Proprietary" | "DOI" | "URI"}
  dimension     {"role": "dimension", "name": "Platform"}
                names must not be organization, title, metric, date, value
                or a title_id name
  organization  {"role": "organization"}

AREA:
  {"data_headers": {
      "roles": [<metric or date extractors read from the header cells>],
      "data_cells": <range over the first value of each lane, one lane per cell>,
      "data_direction": <direction in which each lane continues>},
   "metrics": <metric>?, "dates": <date>?, "titles": <title>?,
   "title_ids": [...], "dimensions": [...], "organizations": <organization>?,
   "kind": "non_counter.generic"}
  metric and date must each come from exactly one place: a header role or
  the area field. data_cells.direction must be perpendicular to
  data_direction. A range running along data_direction is read per value;
  any other range is read per header cell; cells and literals repeat.

DOCUMENT:
  {"parser_name": "...", "platforms": [...],
   "metrics_to_skip": [...], "titles_to_skip": [...],
   "available_metrics": [...] | null, "on_metric_check_failed": "skip",
   "areas": [<area>, ...],
   "metric_aliases": [["from", "to"], ...], "dimension_aliases": [...],
   "heuristics": {"conds": [], "kind": "and"},
   "data_format": {"name": "format"}, "kind": "non_counter.generic"}

Dates are normalized to YYYY-MM-01. Blank value cells produce no record.
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn area_with(metrics: Value) -> Value {
        json!({
            "data_headers": {
                "roles": [{"source": {"coord": {"row": 0, "col": 1}, "direction": "right"}, "role": "date"}],
                "data_cells": {"coord": {"row": 1, "col": 1}, "direction": "right"},
                "data_direction": "down"
            },
            "metrics": metrics
        })
    }

    fn document(areas: Value) -> Value {
        json!({"parser_name": "test", "areas": areas})
    }

    #[test]
    fn test_example_definition_is_valid() {
        let definition = ParserDefinition::from_value(&example_definition()).unwrap();
        assert_eq!(definition.areas.len(), 1);
        assert_eq!(definition.on_metric_check_failed, Action::Skip);
        assert_eq!(definition.canonical_metric("Clicks"), "Link Clicks");
        assert_eq!(definition.canonical_metric("Views"), "Views");
    }

    #[test]
    fn test_defaults() {
        let definition = ParserDefinition::from_value(&document(json!([area_with(
            json!({"source": {"coord": {"row": 1, "col": 0}, "direction": "down"}, "role": "metric"})
        )])))
        .unwrap();
        assert_eq!(definition.data_format, DataFormat::default());
        assert!(definition.platforms.is_empty());
        assert!(definition.available_metrics.is_none());
        assert_eq!(definition.on_metric_check_failed, Action::Skip);
        assert_eq!(definition.heuristics, Heuristics::default());
    }

    #[test]
    fn test_round_trip_through_wire_shape() {
        let definition = ParserDefinition::from_value(&example_definition()).unwrap();
        let json = definition.to_json().unwrap();
        let again = ParserDefinition::from_json(&json).unwrap();
        assert_eq!(definition, again);
        let reparsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed["kind"], json!("non_counter.generic"));
        assert_eq!(reparsed["metric_aliases"], json!([["Clicks", "Link Clicks"]]));
    }

    #[test]
    fn test_no_areas() {
        let err = ParserDefinition::from_value(&document(json!([]))).unwrap_err();
        assert_eq!(err, StructuralError::NoAreas);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ParserDefinition::from_json("{not json"),
            Err(StructuralError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_error_path_reaches_header_role_source() {
        let mut doc = document(json!([area_with(json!(null))]));
        doc["areas"][0]["data_headers"]["roles"] = json!([
            {"source": {"coord": {"row": 1, "col": 0}, "direction": "down"}, "role": "metric"},
            {"source": {"row": 0, "col": 1, "value": "x"}, "role": "date"}
        ]);
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            StructuralError::AmbiguousSource { ref path, .. } if path == "areas[0].data_headers.roles[1].source"
        ));
    }

    #[test]
    fn test_metric_sourced_twice_or_never() {
        let mut doc = document(json!([area_with(
            json!({"source": {"value": "Views"}, "role": "metric"})
        )]));
        doc["areas"][0]["data_headers"]["roles"]
            .as_array_mut()
            .unwrap()
            .push(json!({"source": {"coord": {"row": 0, "col": 1}, "direction": "right"}, "role": "metric"}));
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert_eq!(
            err,
            StructuralError::DuplicateRole {
                path: "areas[0]".into(),
                role: Role::Metric
            }
        );

        let doc = document(json!([area_with(json!(null))]));
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert_eq!(
            err,
            StructuralError::MissingRole {
                path: "areas[0]".into(),
                role: Role::Metric
            }
        );
    }

    #[test]
    fn test_parallel_data_cells_rejected() {
        let mut doc = document(json!([area_with(
            json!({"source": {"value": "Views"}, "role": "metric"})
        )]));
        doc["areas"][0]["data_headers"]["data_direction"] = json!("left");
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::NotPerpendicular { ref path, .. }
            if path == "areas[0].data_headers.data_cells.direction"));
    }

    #[test]
    fn test_alias_conflicts_and_chains() {
        let area = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        let mut doc = document(json!([area]));

        doc["metric_aliases"] = json!([["Hits", "Views"], ["Hits", "Clicks"]]);
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::ConflictingAlias { ref path, .. } if path == "metric_aliases[1]"));

        doc["metric_aliases"] = json!([["Hits", "Views"], ["Views", "Total Views"]]);
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::AliasChain { ref target, .. } if target == "Views"));

        doc["metric_aliases"] = json!([["Hits", "Views"], ["Hits", "Views"], ["Views", "Views"]]);
        assert!(ParserDefinition::from_value(&doc).is_ok());
    }

    #[test]
    fn test_alias_idempotent() {
        let area = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        let mut doc = document(json!([area]));
        doc["metric_aliases"] = json!([["Hits", "Views"], ["Visits", "Views"]]);
        let definition = ParserDefinition::from_value(&doc).unwrap();
        for name in ["Hits", "Visits", "Views", "Other"] {
            let once = definition.canonical_metric(name).to_string();
            assert_eq!(definition.canonical_metric(&once), once);
        }
    }

    #[test]
    fn test_unknown_top_level_field() {
        let mut doc = document(json!([area_with(
            json!({"source": {"value": "Views"}, "role": "metric"})
        )]));
        doc["parser"] = json!("typo");
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert_eq!(err, StructuralError::UnknownField { path: "parser".into() });
    }

    #[test]
    fn test_kind_literal() {
        let mut doc = document(json!([area_with(
            json!({"source": {"value": "Views"}, "role": "metric"})
        )]));
        doc["areas"][0]["kind"] = json!("counter.tr");
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(err.to_string().starts_with("areas[0].kind"));
    }

    #[test]
    fn test_dimension_alias_onto_fixed_column() {
        let mut area = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        area["dimensions"] = json!([{"name": "Plat", "source": {"value": "A"}, "role": "dimension"}]);
        let mut doc = document(json!([area]));
        doc["dimension_aliases"] = json!([["Plat", "Title"]]);
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::InvalidField { ref path, .. } if path == "dimension_aliases[0]"));
    }

    #[test]
    fn test_dimension_aliases_folding_one_area() {
        let mut area = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        area["dimensions"] = json!([
            {"name": "Plat", "source": {"value": "A"}, "role": "dimension"},
            {"name": "Platform", "source": {"value": "B"}, "role": "dimension"}
        ]);
        let mut doc = document(json!([area.clone(), area_with(json!({"source": {"value": "Views"}, "role": "metric"}))]));
        doc["dimension_aliases"] = json!([["Plat", "Platform"]]);
        let err = ParserDefinition::from_value(&doc).unwrap_err();
        assert!(matches!(err, StructuralError::InvalidField { ref path, ref message }
            if path == "areas[0].dimensions[1].name" && message.contains("'Plat' and 'Platform'")));

        // the same alias is fine when each area only has one of them
        area["dimensions"] = json!([{"name": "Plat", "source": {"value": "A"}, "role": "dimension"}]);
        let mut other = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        other["dimensions"] = json!([{"name": "Platform", "source": {"value": "B"}, "role": "dimension"}]);
        let mut doc = document(json!([area, other]));
        doc["dimension_aliases"] = json!([["Plat", "Platform"]]);
        assert!(ParserDefinition::from_value(&doc).is_ok());
    }

    #[test]
    fn test_duplicate_dimension_names() {
        let mut area = area_with(json!({"source": {"value": "Views"}, "role": "metric"}));
        area["dimensions"] = json!([
            {"name": "Platform", "source": {"value": "A"}, "role": "dimension"},
            {"name": "Platform", "source": {"value": "B"}, "role": "dimension"}
        ]);
        let err = ParserDefinition::from_value(&document(json!([area]))).unwrap_err();
        assert!(err.to_string().starts_with("areas[0].dimensions[1].name"));
    }

    #[test]
    fn test_deserialize_goes_through_decoder() {
        let result: Result<ParserDefinition, _> = serde_json::from_value(document(json!([])));
        assert!(result.unwrap_err().to_string().contains("at least one area"));
    }
}
