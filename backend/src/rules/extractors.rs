//! Role-specific extractors.
//!
//! Every extractor is `{source, extract_params, role}` with a fixed role
//! literal; dimensions and title ids add a `name`, dates add `composed` and
//! `date_pattern`.

use std::fmt;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::decode::{invalid, json_type, Decode, FieldPath, Fields};
use super::params::ExtractParams;
use super::source::Source;
use crate::error::{StructuralError, StructuralResult};

/// The column a value ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Value,
    Date,
    Title,
    TitleId,
    Dimension,
    Metric,
    Organization,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Value => "value",
            Role::Date => "date",
            Role::Title => "title",
            Role::TitleId => "title_id",
            Role::Dimension => "dimension",
            Role::Metric => "metric",
            Role::Organization => "organization",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of title identifier. Declaration order is output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TitleIdKind {
    #[serde(rename = "ISBN")]
    Isbn,
    #[serde(rename = "Print_ISSN")]
    PrintIssn,
    #[serde(rename = "Online_ISSN")]
    OnlineIssn,
    #[serde(rename = "Proprietary")]
    Proprietary,
    #[serde(rename = "DOI")]
    Doi,
    #[serde(rename = "URI")]
    Uri,
}

impl TitleIdKind {
    pub const ALL: [TitleIdKind; 6] = [
        TitleIdKind::Isbn,
        TitleIdKind::PrintIssn,
        TitleIdKind::OnlineIssn,
        TitleIdKind::Proprietary,
        TitleIdKind::Doi,
        TitleIdKind::Uri,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TitleIdKind::Isbn => "ISBN",
            TitleIdKind::PrintIssn => "Print_ISSN",
            TitleIdKind::OnlineIssn => "Online_ISSN",
            TitleIdKind::Proprietary => "Proprietary",
            TitleIdKind::Doi => "DOI",
            TitleIdKind::Uri => "URI",
        }
    }
}

/// Output columns every table may carry besides dimensions.
const FIXED_COLUMNS: &[&str] = &["organization", "title", "metric", "date", "value"];

/// Whether `name` would collide with a fixed output column. Compared
/// case-insensitively since the CSV headers are capitalized.
pub fn is_reserved_column(name: &str) -> bool {
    let name = name.trim();
    FIXED_COLUMNS.iter().any(|c| c.eq_ignore_ascii_case(name))
        || TitleIdKind::ALL.iter().any(|k| k.as_str().eq_ignore_ascii_case(name))
}

impl fmt::Display for TitleIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_role(fields: &Fields, expected: Role) -> StructuralResult<()> {
    let value = fields.required("role")?;
    let found = value.as_str().ok_or_else(|| {
        invalid(
            &fields.at("role"),
            format!("expected a role string, found {}", json_type(value)),
        )
    })?;
    if found != expected.as_str() {
        return Err(StructuralError::RoleMismatch {
            path: fields.at("role").to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

fn extract_params(fields: &Fields) -> StructuralResult<ExtractParams> {
    Ok(fields.decode("extract_params")?.unwrap_or_default())
}

macro_rules! role_marker {
    ($(#[$doc:meta])* $name:ident => $role:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl $name {
            pub const ROLE: Role = $role;
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                Self::ROLE.serialize(serializer)
            }
        }
    };
}

role_marker!(MetricRole => Role::Metric);
role_marker!(DateRole => Role::Date);
role_marker!(TitleRole => Role::Title);
role_marker!(TitleIdRole => Role::TitleId);
role_marker!(DimensionRole => Role::Dimension);
role_marker!(OrganizationRole => Role::Organization);

/// Extractors made of nothing but `{source, extract_params, role}`.
macro_rules! plain_extractor {
    ($(#[$doc:meta])* $name:ident, $marker:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub struct $name {
            pub source: Source,
            pub extract_params: ExtractParams,
            pub role: $marker,
        }

        impl $name {
            pub fn new(source: Source) -> Self {
                Self {
                    source,
                    extract_params: ExtractParams::default(),
                    role: $marker,
                }
            }

            pub fn with_params(mut self, extract_params: ExtractParams) -> Self {
                self.extract_params = extract_params;
                self
            }
        }

        impl Decode for $name {
            fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
                let fields = Fields::new(value, path, &["source", "extract_params", "role"])?;
                check_role(&fields, $marker::ROLE)?;
                Ok(Self {
                    source: fields.decode_required("source")?,
                    extract_params: extract_params(&fields)?,
                    role: $marker,
                })
            }
        }
    };
}

plain_extractor!(MetricSource, MetricRole);
plain_extractor!(TitleSource, TitleRole);
plain_extractor!(OrganizationSource, OrganizationRole);

/// A named free-form dimension such as "Platform" or "Access Type".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSource {
    pub name: String,
    pub source: Source,
    pub extract_params: ExtractParams,
    pub role: DimensionRole,
}

impl DimensionSource {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Self {
            name: name.into(),
            source,
            extract_params: ExtractParams::default(),
            role: DimensionRole,
        }
    }
}

impl Decode for DimensionSource {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["name", "source", "extract_params", "role"])?;
        check_role(&fields, Role::Dimension)?;
        let name: String = fields.parse_required("name")?;
        if name.trim().is_empty() {
            return Err(invalid(&fields.at("name"), "dimension name must not be empty"));
        }
        if is_reserved_column(&name) {
            return Err(invalid(
                &fields.at("name"),
                format!("dimension name '{}' is a reserved output column", name),
            ));
        }
        Ok(Self {
            name,
            source: fields.decode_required("source")?,
            extract_params: extract_params(&fields)?,
            role: DimensionRole,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleIdSource {
    pub name: TitleIdKind,
    pub source: Source,
    pub extract_params: ExtractParams,
    pub role: TitleIdRole,
}

impl TitleIdSource {
    pub fn new(name: TitleIdKind, source: Source) -> Self {
        Self {
            name,
            source,
            extract_params: ExtractParams::default(),
            role: TitleIdRole,
        }
    }
}

impl Decode for TitleIdSource {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["name", "source", "extract_params", "role"])?;
        check_role(&fields, Role::TitleId)?;
        Ok(Self {
            name: fields.parse_required("name")?,
            source: fields.decode_required("source")?,
            extract_params: extract_params(&fields)?,
            role: TitleIdRole,
        })
    }
}

const DATE_FIELDS: &[&str] = &["source", "composed", "extract_params", "date_pattern", "role"];

fn date_pattern(fields: &Fields) -> StructuralResult<Option<String>> {
    let pattern: Option<String> = fields.parse("date_pattern")?;
    if let Some(pattern) = &pattern {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(invalid(
                &fields.at("date_pattern"),
                format!("invalid strftime pattern '{}'", pattern),
            ));
        }
    }
    Ok(pattern)
}

/// Year or month half of a composed date. Always reads a plain source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatePart {
    pub source: Source,
    pub extract_params: ExtractParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_pattern: Option<String>,
    pub role: DateRole,
}

impl DatePart {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            extract_params: ExtractParams::default(),
            date_pattern: None,
            role: DateRole,
        }
    }

    pub fn with_params(mut self, extract_params: ExtractParams) -> Self {
        self.extract_params = extract_params;
        self
    }
}

impl Decode for DatePart {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, DATE_FIELDS)?;
        check_role(&fields, Role::Date)?;
        if fields.has("composed") {
            return Err(invalid(
                &fields.at("composed"),
                "a composed date part must read a plain 'source'",
            ));
        }
        Ok(Self {
            source: fields.decode_required("source")?,
            extract_params: extract_params(&fields)?,
            date_pattern: date_pattern(&fields)?,
            role: DateRole,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposedDate {
    pub year: DatePart,
    pub month: DatePart,
}

impl Decode for ComposedDate {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, &["year", "month"])?;
        Ok(Self {
            year: fields.decode_required("year")?,
            month: fields.decode_required("month")?,
        })
    }
}

/// Where a date comes from: one source, or a year and a month read apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DateOrigin {
    #[serde(rename = "source")]
    Direct(Source),
    #[serde(rename = "composed")]
    Composed(Box<ComposedDate>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSource {
    #[serde(flatten)]
    pub origin: DateOrigin,
    pub extract_params: ExtractParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_pattern: Option<String>,
    pub role: DateRole,
}

impl DateSource {
    pub fn new(source: Source) -> Self {
        Self {
            origin: DateOrigin::Direct(source),
            extract_params: ExtractParams::default(),
            date_pattern: None,
            role: DateRole,
        }
    }

    pub fn composed(year: DatePart, month: DatePart) -> Self {
        Self {
            origin: DateOrigin::Composed(Box::new(ComposedDate { year, month })),
            extract_params: ExtractParams::default(),
            date_pattern: None,
            role: DateRole,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_pattern = Some(pattern.into());
        self
    }

    pub fn with_params(mut self, extract_params: ExtractParams) -> Self {
        self.extract_params = extract_params;
        self
    }

    /// Sources read by this date, including composed parts.
    pub fn sources(&self) -> Vec<&Source> {
        match &self.origin {
            DateOrigin::Direct(source) => vec![source],
            DateOrigin::Composed(parts) => vec![&parts.year.source, &parts.month.source],
        }
    }
}

impl Decode for DateSource {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(value, path, DATE_FIELDS)?;
        check_role(&fields, Role::Date)?;

        let origin = match (fields.has("source"), fields.has("composed")) {
            (true, false) => DateOrigin::Direct(fields.decode_required("source")?),
            (false, true) => DateOrigin::Composed(Box::new(fields.decode_required("composed")?)),
            (true, true) => {
                return Err(invalid(
                    fields.path(),
                    "'source' and 'composed' are mutually exclusive",
                ))
            }
            (false, false) => {
                return Err(invalid(
                    fields.path(),
                    "one of 'source' or 'composed' is required",
                ))
            }
        };

        Ok(Self {
            origin,
            extract_params: extract_params(&fields)?,
            date_pattern: date_pattern(&fields)?,
            role: DateRole,
        })
    }
}

/// A `data_headers.roles` entry, chosen by its `role` literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderRole {
    Metric(MetricSource),
    Date(DateSource),
}

impl HeaderRole {
    pub fn role(&self) -> Role {
        match self {
            HeaderRole::Metric(_) => Role::Metric,
            HeaderRole::Date(_) => Role::Date,
        }
    }

    pub fn sources(&self) -> Vec<&Source> {
        match self {
            HeaderRole::Metric(metric) => vec![&metric.source],
            HeaderRole::Date(date) => date.sources(),
        }
    }
}

impl Decode for HeaderRole {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let role = value
            .get("role")
            .filter(|v| !v.is_null())
            .ok_or_else(|| StructuralError::MissingField {
                path: path.key("role").to_string(),
            })?;
        match role.as_str() {
            Some("metric") => MetricSource::decode(value, path).map(HeaderRole::Metric),
            Some("date") => DateSource::decode(value, path).map(HeaderRole::Date),
            Some(other) => Err(StructuralError::RoleMismatch {
                path: path.key("role").to_string(),
                expected: "metric' or 'date".to_string(),
                found: other.to_string(),
            }),
            None => Err(invalid(
                &path.key("role"),
                format!("expected a role string, found {}", json_type(role)),
            )),
        }
    }
}
