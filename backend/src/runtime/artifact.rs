//! Typed artifacts exchanged between workers.
//!
//! Every artifact has a kind and a logical name. The name defaults to the
//! kind's name, which is how the store keys it; two artifacts are never
//! compared for equality by name.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{GridResult, RuntimeError, RuntimeResult};
use crate::grid::{self, Grid};
use crate::interpreter::NormalizedTable;
use crate::rules::{ParserDefinition, TitleIdKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    DataDescription,
    Platform,
    ParserDefinition,
    Parsed,
    UserInfo,
    Translation,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::File,
        ArtifactKind::DataDescription,
        ArtifactKind::Platform,
        ArtifactKind::ParserDefinition,
        ArtifactKind::Parsed,
        ArtifactKind::UserInfo,
        ArtifactKind::Translation,
    ];

    /// Logical name used when an artifact is stored without an explicit one.
    pub fn default_name(self) -> &'static str {
        match self {
            ArtifactKind::File => "file_data",
            ArtifactKind::DataDescription => "data_description_data",
            ArtifactKind::Platform => "platform_data",
            ArtifactKind::ParserDefinition => "parser_definition_data",
            ArtifactKind::Parsed => "parsed_data",
            ArtifactKind::UserInfo => "user_info_data",
            ArtifactKind::Translation => "translation_data",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.default_name() == name)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Handle to the uploaded grid file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub filename: PathBuf,
}

impl FileData {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn load_grid(&self) -> GridResult<Grid> {
        grid::load_path(&self.filename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Monthly,
    Daily,
    Other,
}

/// Accepts `true`/`false` as well as `1`/`0`.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean or 0/1, found {}",
            other
        ))),
    }
}

/// What the report contains, as described ahead of extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDescriptionData {
    pub begin_month_year: String,
    pub end_month_year: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub english: bool,
    #[serde(deserialize_with = "flexible_bool")]
    pub title_report: bool,
    pub granularity: Granularity,
    #[serde(default)]
    pub title_identifiers: Vec<TitleIdKind>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformData {
    pub platform_name: String,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub parser_names: Vec<String>,
}

impl PlatformData {
    pub fn new(platform_name: impl Into<String>) -> Self {
        Self {
            platform_name: platform_name.into(),
            exists: false,
            parser_names: Vec::new(),
        }
    }
}

/// Free-text note from whoever uploaded the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoData {
    pub user_comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationData {
    pub metrics_translations: Vec<String>,
    pub dimensions_translations: Vec<String>,
}

/// The value held by an artifact slot.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    File(FileData),
    DataDescription(DataDescriptionData),
    Platform(PlatformData),
    ParserDefinition(ParserDefinition),
    Parsed(NormalizedTable),
    UserInfo(UserInfoData),
    Translation(TranslationData),
}

impl Payload {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Payload::File(_) => ArtifactKind::File,
            Payload::DataDescription(_) => ArtifactKind::DataDescription,
            Payload::Platform(_) => ArtifactKind::Platform,
            Payload::ParserDefinition(_) => ArtifactKind::ParserDefinition,
            Payload::Parsed(_) => ArtifactKind::Parsed,
            Payload::UserInfo(_) => ArtifactKind::UserInfo,
            Payload::Translation(_) => ArtifactKind::Translation,
        }
    }

    /// Deserialize a JSON value as the payload of `kind`.
    pub fn from_value(kind: ArtifactKind, value: Value) -> RuntimeResult<Self> {
        fn parse<T: serde::de::DeserializeOwned>(kind: ArtifactKind, value: Value) -> RuntimeResult<T> {
            serde_json::from_value(value).map_err(|e| RuntimeError::InvalidPayload {
                kind,
                message: e.to_string(),
            })
        }
        Ok(match kind {
            ArtifactKind::File => Payload::File(parse(kind, value)?),
            ArtifactKind::DataDescription => Payload::DataDescription(parse(kind, value)?),
            ArtifactKind::Platform => Payload::Platform(parse(kind, value)?),
            ArtifactKind::ParserDefinition => Payload::ParserDefinition(parse(kind, value)?),
            ArtifactKind::Parsed => Payload::Parsed(parse(kind, value)?),
            ArtifactKind::UserInfo => Payload::UserInfo(parse(kind, value)?),
            ArtifactKind::Translation => Payload::Translation(parse(kind, value)?),
        })
    }
}

/// A named payload.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub payload: Payload,
}

impl Artifact {
    /// Artifact stored under its kind's default name.
    pub fn new(payload: impl Into<Payload>) -> Self {
        let payload = payload.into();
        Self {
            name: payload.kind().default_name().to_string(),
            payload,
        }
    }

    pub fn named(name: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.payload.kind()
    }
}

/// Payload types addressable by kind.
pub trait ArtifactData: Sized + Into<Payload> {
    const KIND: ArtifactKind;

    fn from_payload(payload: &Payload) -> Option<&Self>;
}

macro_rules! artifact_data {
    ($ty:ty, $variant:ident) => {
        impl ArtifactData for $ty {
            const KIND: ArtifactKind = ArtifactKind::$variant;

            fn from_payload(payload: &Payload) -> Option<&Self> {
                match payload {
                    Payload::$variant(data) => Some(data),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Payload {
            fn from(data: $ty) -> Self {
                Payload::$variant(data)
            }
        }
    };
}

artifact_data!(FileData, File);
artifact_data!(DataDescriptionData, DataDescription);
artifact_data!(PlatformData, Platform);
artifact_data!(ParserDefinition, ParserDefinition);
artifact_data!(NormalizedTable, Parsed);
artifact_data!(UserInfoData, UserInfo);
artifact_data!(TranslationData, Translation);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_names() {
        let artifact = Artifact::new(FileData::new("report.csv"));
        assert_eq!(artifact.name, "file_data");
        assert_eq!(artifact.kind(), ArtifactKind::File);
        assert_eq!(ArtifactKind::from_name("parsed_data"), Some(ArtifactKind::Parsed));
        assert_eq!(ArtifactKind::from_name("nope"), None);
    }

    #[test]
    fn test_data_description_accepts_numeric_flags() {
        let payload = Payload::from_value(
            ArtifactKind::DataDescription,
            json!({
                "begin_month_year": "01-2021",
                "end_month_year": "12-2021",
                "english": 1,
                "title_report": false,
                "granularity": "monthly",
                "title_identifiers": ["ISBN", "DOI"],
                "metrics": ["Views"],
                "dimensions": []
            }),
        )
        .unwrap();
        let description = DataDescriptionData::from_payload(&payload).unwrap();
        assert!(description.english);
        assert!(!description.title_report);
        assert_eq!(description.title_identifiers, vec![TitleIdKind::Isbn, TitleIdKind::Doi]);
    }

    #[test]
    fn test_invalid_payload() {
        let err = Payload::from_value(ArtifactKind::UserInfo, json!({"comment": "x"})).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPayload { kind: ArtifactKind::UserInfo, .. }));
    }

    #[test]
    fn test_parser_definition_payload_is_validated() {
        let err = Payload::from_value(
            ArtifactKind::ParserDefinition,
            json!({"parser_name": "x", "areas": []}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one area"));
    }

    #[test]
    fn test_from_payload_checks_kind() {
        let payload: Payload = PlatformData::new("JSTOR").into();
        assert!(PlatformData::from_payload(&payload).is_some());
        assert!(FileData::from_payload(&payload).is_none());
    }
}
