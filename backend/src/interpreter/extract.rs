//! Applying `extract_params` to resolved raw values.

use super::dates;
use super::resolve::RawValue;
use crate::error::{ExtractionError, ExtractionResult};
use crate::rules::{Action, ExtractParams};

/// Role-specific conversion of an extracted string.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Text,
    Date { pattern: Option<String> },
    Year { pattern: Option<String> },
    Month { pattern: Option<String> },
}

impl Conversion {
    pub fn apply(&self, text: &str) -> Result<String, String> {
        match self {
            Conversion::Text => Ok(text.to_string()),
            Conversion::Date { pattern } => dates::parse_date(text, pattern.as_deref()),
            Conversion::Year { pattern } => {
                dates::parse_year(text, pattern.as_deref()).map(|y| format!("{:04}", y))
            }
            Conversion::Month { pattern } => {
                dates::parse_month(text, pattern.as_deref()).map(|m| format!("{:02}", m))
            }
        }
    }
}

/// Result of extracting one raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(String),
    /// `on_validation_error: skip`
    Skip,
}

/// Stateful extractor for the values of one source, fed in walking order so
/// `last_value_as_default` sees the previous success.
pub struct Extractor<'a> {
    area: usize,
    role: String,
    params: &'a ExtractParams,
    conversion: Conversion,
    last: Option<String>,
}

impl<'a> Extractor<'a> {
    pub fn new(area: usize, role: impl Into<String>, params: &'a ExtractParams, conversion: Conversion) -> Self {
        Self {
            area,
            role: role.into(),
            params,
            conversion,
            last: None,
        }
    }

    fn attempt(&self, raw: &RawValue) -> Result<String, String> {
        let text = raw.text.as_deref().ok_or_else(|| "blank cell".to_string())?;
        let text = match &self.params.regex {
            Some(pattern) => pattern
                .extract(text)
                .ok_or_else(|| format!("does not match regex '{}'", pattern.as_str()))?,
            None => text.to_string(),
        };
        if text.is_empty() {
            return Err("nothing left after regex".to_string());
        }
        self.conversion.apply(&text)
    }

    pub fn extract(&mut self, raw: &RawValue) -> ExtractionResult<Outcome> {
        let reason = match self.attempt(raw) {
            Ok(value) => {
                self.last = Some(value.clone());
                return Ok(Outcome::Value(value));
            }
            Err(reason) => reason,
        };

        if let Some(default) = &self.params.default {
            let default = default.to_string();
            return self
                .conversion
                .apply(&default)
                .map(Outcome::Value)
                .map_err(|reason| ExtractionError::InvalidDefault {
                    area: self.area,
                    role: self.role.clone(),
                    default,
                    reason,
                });
        }

        if self.params.last_value_as_default {
            if let Some(last) = &self.last {
                return Ok(Outcome::Value(last.clone()));
            }
        }

        match self.params.on_validation_error {
            Action::Skip => Ok(Outcome::Skip),
            Action::Pass => Ok(Outcome::Value(raw.text.clone().unwrap_or_default())),
            action @ (Action::Fail | Action::Stop) => Err(ExtractionError::Cell {
                area: self.area,
                role: self.role.clone(),
                location: raw.location_label(),
                content: raw.text.clone().unwrap_or_default(),
                reason,
                action,
            }),
        }
    }

    pub fn extract_all(&mut self, raws: &[RawValue]) -> ExtractionResult<Vec<Outcome>> {
        raws.iter().map(|raw| self.extract(raw)).collect()
    }
}
