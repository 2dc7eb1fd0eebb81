//! Per-source cleanup and failure policy.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::decode::{invalid, Decode, FieldPath, Fields};
use super::source::Scalar;
use crate::error::StructuralResult;

/// What to do with a value that could not be extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Abort the whole definition.
    #[default]
    Fail,
    /// Drop this cell's contribution.
    Skip,
    /// Abort, like `Fail`.
    Stop,
    /// Keep the raw value as-is.
    Pass,
}

impl Action {
    pub fn is_fatal(self) -> bool {
        matches!(self, Action::Fail | Action::Stop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Fail => "fail",
            Action::Skip => "skip",
            Action::Stop => "stop",
            Action::Pass => "pass",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled regex that serializes back to its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// First capture group if the pattern has one that matched, otherwise
    /// the whole match.
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.0.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim().to_string())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractParams {
    pub regex: Option<Pattern>,
    pub default: Option<Scalar>,
    pub last_value_as_default: bool,
    pub on_validation_error: Action,
}

impl ExtractParams {
    pub fn with_action(mut self, action: Action) -> Self {
        self.on_validation_error = action;
        self
    }

    pub fn with_default(mut self, default: impl Into<Scalar>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_last_value_as_default(mut self) -> Self {
        self.last_value_as_default = true;
        self
    }

    pub fn with_regex(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.regex = Some(Pattern::new(pattern)?);
        Ok(self)
    }
}

impl Decode for ExtractParams {
    fn decode(value: &Value, path: &FieldPath) -> StructuralResult<Self> {
        let fields = Fields::new(
            value,
            path,
            &["regex", "default", "last_value_as_default", "on_validation_error"],
        )?;
        let regex = fields
            .parse::<String>("regex")?
            .map(|source| {
                Pattern::new(&source)
                    .map_err(|e| invalid(&fields.at("regex"), format!("invalid regex: {}", e)))
            })
            .transpose()?;
        Ok(ExtractParams {
            regex,
            default: fields.parse("default")?,
            last_value_as_default: fields.parse("last_value_as_default")?.unwrap_or(false),
            on_validation_error: fields.parse("on_validation_error")?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> StructuralResult<ExtractParams> {
        ExtractParams::decode(&value, &FieldPath::root().key("extract_params"))
    }

    #[test]
    fn test_defaults() {
        let params = decode(json!({})).unwrap();
        assert_eq!(params, ExtractParams::default());
        assert_eq!(params.on_validation_error, Action::Fail);
    }

    #[test]
    fn test_full_params() {
        let params = decode(json!({
            "regex": "^(\\w+) total$",
            "default": "Unknown",
            "last_value_as_default": true,
            "on_validation_error": "skip"
        }))
        .unwrap();
        assert_eq!(params.on_validation_error, Action::Skip);
        assert_eq!(params.default, Some(Scalar::Text("Unknown".into())));
        assert_eq!(params.regex.unwrap().extract("Views total"), Some("Views".into()));
    }

    #[test]
    fn test_invalid_regex() {
        let err = decode(json!({"regex": "([a-z"})).unwrap_err();
        assert!(err.to_string().starts_with("extract_params.regex: invalid regex"));
    }

    #[test]
    fn test_unknown_action() {
        let err = decode(json!({"on_validation_error": "ignore"})).unwrap_err();
        assert!(err.to_string().starts_with("extract_params.on_validation_error"));
    }

    #[test]
    fn test_whole_match_without_group() {
        let pattern = Pattern::new(r"\d{4}").unwrap();
        assert_eq!(pattern.extract("FY 2021 total"), Some("2021".into()));
        assert_eq!(pattern.extract("none"), None);
    }
}
