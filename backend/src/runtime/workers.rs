//! Workers shipped with the runtime.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::artifact::{Artifact, ArtifactKind, DataDescriptionData, FileData, PlatformData, UserInfoData};
use super::worker::{Inputs, Worker};
use crate::cache::DefinitionRegistry;
use crate::error::WorkerError;
use crate::interpreter::execute_table;
use crate::repair::{Proposer, RepairLoop, RepairOptions};
use crate::rules::ParserDefinition;

/// Runs the stored parser definition on the uploaded file.
pub struct ExtractionWorker;

impl ExtractionWorker {
    pub const NAME: &'static str = "extraction_worker";
}

impl Worker for ExtractionWorker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn inputs(&self) -> &[ArtifactKind] {
        &[ArtifactKind::File, ArtifactKind::ParserDefinition]
    }

    fn outputs(&self) -> &[ArtifactKind] {
        &[ArtifactKind::Parsed]
    }

    fn run<'a>(&'a self, inputs: Inputs) -> BoxFuture<'a, Result<Vec<Artifact>, WorkerError>> {
        Box::pin(async move {
            let file: &FileData = inputs.get()?;
            let definition: &ParserDefinition = inputs.get()?;
            let grid = file.load_grid()?;
            let table = execute_table(definition, &grid)?;
            Ok(vec![Artifact::new(table)])
        })
    }
}

/// Obtains a parser definition from a proposer and runs it.
pub struct ParsingRulesWorker {
    proposer: Arc<dyn Proposer>,
    options: RepairOptions,
    inputs: Vec<ArtifactKind>,
}

impl ParsingRulesWorker {
    pub const NAME: &'static str = "parsing_rules_worker";

    pub fn new(proposer: Arc<dyn Proposer>, options: RepairOptions) -> Self {
        Self {
            proposer,
            options,
            inputs: vec![ArtifactKind::DataDescription, ArtifactKind::File],
        }
    }

    /// Also require the user note and pass it to the proposer. A blank note
    /// counts as none.
    pub fn with_user_note(mut self) -> Self {
        if !self.inputs.contains(&ArtifactKind::UserInfo) {
            self.inputs.push(ArtifactKind::UserInfo);
        }
        self
    }
}

impl Worker for ParsingRulesWorker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn inputs(&self) -> &[ArtifactKind] {
        &self.inputs
    }

    fn outputs(&self) -> &[ArtifactKind] {
        &[ArtifactKind::ParserDefinition, ArtifactKind::Parsed]
    }

    fn run<'a>(&'a self, inputs: Inputs) -> BoxFuture<'a, Result<Vec<Artifact>, WorkerError>> {
        Box::pin(async move {
            let description: &DataDescriptionData = inputs.get()?;
            let file: &FileData = inputs.get()?;
            let note = inputs
                .find::<UserInfoData>()
                .map(|n| n.user_comment.as_str())
                .filter(|n| !n.trim().is_empty());
            let grid = file.load_grid()?;

            let outcome = RepairLoop::new(self.proposer.clone(), self.options.clone())
                .run(description, &grid, note)
                .await?;
            Ok(vec![Artifact::new(outcome.definition), Artifact::new(outcome.table)])
        })
    }
}

/// Fills in whether the platform is known and which definitions serve it.
pub struct PlatformWorker {
    registry_dir: PathBuf,
}

impl PlatformWorker {
    pub const NAME: &'static str = "platform_worker";

    pub fn new(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
        }
    }
}

impl Worker for PlatformWorker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn inputs(&self) -> &[ArtifactKind] {
        &[ArtifactKind::Platform]
    }

    fn outputs(&self) -> &[ArtifactKind] {
        &[ArtifactKind::Platform]
    }

    fn run<'a>(&'a self, inputs: Inputs) -> BoxFuture<'a, Result<Vec<Artifact>, WorkerError>> {
        Box::pin(async move {
            let platform: &PlatformData = inputs.get()?;
            // reopened per run so definitions saved meanwhile are seen
            let registry = DefinitionRegistry::new(&self.registry_dir);
            let mut seen = HashSet::new();
            let parser_names: Vec<String> = registry
                .find_for_platform(&platform.platform_name)
                .into_iter()
                .filter(|d| seen.insert(d.name.as_str()))
                .map(|d| d.name.clone())
                .collect();

            Ok(vec![Artifact::new(PlatformData {
                platform_name: platform.platform_name.clone(),
                exists: !parser_names.is_empty(),
                parser_names,
            })])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProposerError, RuntimeError};
    use crate::interpreter::NormalizedTable;
    use crate::repair::ProposalRequest;
    use crate::rules::example_definition;
    use crate::runtime::{Granularity, Runtime, WorkerRegistry};
    use tempfile::tempdir;

    const REPORT: &str = ",Jan-21,Feb-21\nViews,4,5\nClicks,1,0\n";

    struct FixedProposer;

    impl Proposer for FixedProposer {
        fn propose<'a>(&'a self, request: &'a ProposalRequest) -> BoxFuture<'a, Result<String, ProposerError>> {
            let answer = match request.user_note.as_deref() {
                Some("broken") => "{}".to_string(),
                _ => format!("```json\n{}\n```", example_definition()),
            };
            Box::pin(async move { Ok(answer) })
        }
    }

    fn description() -> DataDescriptionData {
        DataDescriptionData {
            begin_month_year: "01-2021".into(),
            end_month_year: "02-2021".into(),
            english: true,
            title_report: false,
            granularity: Granularity::Monthly,
            title_identifiers: vec![],
            metrics: vec!["Views".into()],
            dimensions: vec![],
        }
    }

    fn registry(dir: &std::path::Path) -> WorkerRegistry {
        let workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(ExtractionWorker),
            Arc::new(ParsingRulesWorker::new(Arc::new(FixedProposer), RepairOptions::default()).with_user_note()),
            Arc::new(PlatformWorker::new(dir)),
        ];
        WorkerRegistry::new(
            workers,
            &[
                ArtifactKind::File,
                ArtifactKind::DataDescription,
                ArtifactKind::UserInfo,
                ArtifactKind::Platform,
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_propose_then_extract() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.csv");
        std::fs::write(&report, REPORT).unwrap();
        let workers = registry(dir.path());

        let mut runtime = Runtime::new();
        runtime.set(Artifact::new(FileData::new(&report)));
        runtime.set(Artifact::new(description()));
        runtime.set(Artifact::new(UserInfoData {
            user_comment: "monthly".into(),
        }));

        let written = runtime
            .run(workers.get("parsing_rules_worker").unwrap().as_ref())
            .await
            .unwrap();
        assert_eq!(written, vec!["parser_definition_data", "parsed_data"]);
        let proposed: NormalizedTable = runtime.get::<NormalizedTable>("parsed_data").unwrap().clone();
        assert_eq!(proposed.len(), 4);

        runtime
            .run(workers.get("extraction_worker").unwrap().as_ref())
            .await
            .unwrap();
        let extracted: &NormalizedTable = runtime.get("parsed_data").unwrap();
        assert_eq!(extracted, &proposed);
    }

    #[tokio::test]
    async fn test_failed_repair_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let report = dir.path().join("report.csv");
        std::fs::write(&report, REPORT).unwrap();
        let worker = ParsingRulesWorker::new(
            Arc::new(FixedProposer),
            RepairOptions {
                max_attempts: 2,
                ..RepairOptions::default()
            },
        )
        .with_user_note();

        let mut runtime = Runtime::new();
        runtime.set(Artifact::new(FileData::new(&report)));
        runtime.set(Artifact::new(description()));
        runtime.set(Artifact::new(UserInfoData {
            user_comment: "broken".into(),
        }));
        let err = runtime.run(&worker).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Worker {
                source: WorkerError::Repair(_),
                ..
            }
        ));
        assert_eq!(runtime.store().len(), 3);
    }

    #[tokio::test]
    async fn test_platform_worker_reports_stored_parsers() {
        let dir = tempdir().unwrap();
        let mut definitions = DefinitionRegistry::new(dir.path());
        definitions
            .save(ParserDefinition::from_value(&example_definition()).unwrap(), vec!["JSTOR".into()])
            .unwrap();

        let mut runtime = Runtime::new();
        runtime.set(Artifact::new(PlatformData::new("jstor")));
        runtime.run(&PlatformWorker::new(dir.path())).await.unwrap();
        let platform: &PlatformData = runtime.get("platform_data").unwrap();
        assert!(platform.exists);
        assert_eq!(platform.parser_names, vec!["example_monthly_columns"]);

        runtime.set(Artifact::new(PlatformData::new("Scopus")));
        runtime.run(&PlatformWorker::new(dir.path())).await.unwrap();
        let platform: &PlatformData = runtime.get("platform_data").unwrap();
        assert!(!platform.exists);
    }

    #[tokio::test]
    async fn test_platform_worker_lists_each_parser_once() {
        let dir = tempdir().unwrap();
        let mut definitions = DefinitionRegistry::new(dir.path());
        let mut named = |name: &str| {
            let mut doc = example_definition();
            doc["parser_name"] = serde_json::json!(name);
            definitions
                .save(ParserDefinition::from_value(&doc).unwrap(), vec!["JSTOR".into()])
                .unwrap()
        };
        let _first = named("shared");
        let other = named("other");
        let second = named("shared");
        definitions.update_stats(&other, false).unwrap();
        definitions.update_stats(&second, false).unwrap();
        definitions.update_stats(&second, false).unwrap();

        let mut runtime = Runtime::new();
        runtime.set(Artifact::new(PlatformData::new("JSTOR")));
        runtime.run(&PlatformWorker::new(dir.path())).await.unwrap();
        let platform: &PlatformData = runtime.get("platform_data").unwrap();
        assert_eq!(platform.parser_names, vec!["shared", "other"]);
    }

    #[tokio::test]
    async fn test_extraction_needs_a_definition() {
        let mut runtime = Runtime::new();
        runtime.set(Artifact::new(FileData::new("missing.csv")));
        let err = runtime.run(&ExtractionWorker).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::AmbiguousOrMissingInput {
                kind: ArtifactKind::ParserDefinition,
                count: 0,
                ..
            }
        ));
    }
}
