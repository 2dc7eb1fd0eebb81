//! High-level entry points.
//!
//! [`validate_and_execute`] is the boundary the repair loop talks to: one rule
//! document in, one table or one error string out. [`Pipeline`] is the full
//! flow used by the CLI. It runs the shipped workers in a session runtime,
//! taking the definition from the first source that works:
//!
//! 1. a rule document given explicitly, used as is
//! 2. otherwise stored definitions for the platform, best success rate first
//! 3. otherwise a new document from the proposer, saved on success
//!
//! Output rows are then checked against the row schema.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::DefinitionRegistry;
use crate::error::{PipelineError, PipelineResult};
use crate::grid::Grid;
use crate::interpreter::{execute_table, NormalizedTable};
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::repair::{Proposer, RepairOptions};
use crate::rules::ParserDefinition;
use crate::runtime::{
    Artifact, ArtifactKind, DataDescriptionData, ExtractionWorker, FileData, ParsingRulesWorker,
    PlatformData, PlatformWorker, Runtime, Sessions, UserInfoData, Worker, WorkerRegistry,
};
use crate::validation::{validate_table, RowError};

/// Decode `rule_json` and run it on `grid`.
///
/// Every failure, structural or during evaluation, collapses into one
/// message suitable for feeding back to a proposer.
pub fn validate_and_execute(rule_json: &str, grid: &Grid) -> Result<NormalizedTable, String> {
    check_and_execute(rule_json, grid).map(|(_, table)| table)
}

/// [`validate_and_execute`], also returning the decoded definition.
pub fn check_and_execute(rule_json: &str, grid: &Grid) -> Result<(ParserDefinition, NormalizedTable), String> {
    let definition =
        ParserDefinition::from_json(rule_json).map_err(|e| format!("rule document rejected: {}", e))?;
    let table = execute_table(&definition, grid).map_err(|e| format!("evaluation failed: {}", e))?;
    Ok((definition, table))
}

/// Artifact kinds the pipeline stores itself instead of getting them from a worker.
const EXTERNAL_KINDS: &[ArtifactKind] = &[
    ArtifactKind::File,
    ArtifactKind::DataDescription,
    ArtifactKind::UserInfo,
    ArtifactKind::Platform,
    ArtifactKind::ParserDefinition,
];

/// Options for [`Pipeline::extract_file`]
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Use this rule document instead of the registry or the proposer
    pub rules_path: Option<PathBuf>,

    /// Platform whose stored definitions are tried first
    pub platform: Option<String>,

    /// Free-text note passed to the proposer
    pub user_note: Option<String>,

    /// Skip row schema validation
    pub skip_validation: bool,

    /// Don't try stored definitions
    pub no_cache: bool,

    /// Don't save a newly proposed definition
    pub no_save: bool,
}

/// Where the definition that produced the table came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum DefinitionOrigin {
    Provided { path: PathBuf },
    Registry { id: String },
    Proposed { saved_as: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub table: NormalizedTable,
    pub definition: ParserDefinition,
    pub origin: DefinitionOrigin,
    /// Rows failing the row schema
    #[serde(skip)]
    pub row_errors: Vec<RowError>,
    pub grid_height: usize,
    pub grid_width: usize,
}

impl ExtractionReport {
    pub fn invalid_rows(&self) -> usize {
        self.row_errors.len()
    }
}

/// The shipped workers plus the sessions they run in.
pub struct Pipeline {
    workers: WorkerRegistry,
    sessions: Sessions,
}

impl Pipeline {
    /// Register the workers. Without a proposer there is no
    /// `parsing_rules_worker`, so only provided or stored definitions are
    /// used. `registry` is the registry later passed to [`Self::extract_file`].
    pub fn new(
        proposer: Option<Arc<dyn Proposer>>,
        repair: RepairOptions,
        registry: &DefinitionRegistry,
    ) -> PipelineResult<Self> {
        let mut workers: Vec<Arc<dyn Worker>> = vec![
            Arc::new(ExtractionWorker),
            Arc::new(PlatformWorker::new(registry.dir())),
        ];
        if let Some(proposer) = proposer {
            workers.push(Arc::new(ParsingRulesWorker::new(proposer, repair).with_user_note()));
        }
        Ok(Self {
            workers: WorkerRegistry::new(workers, EXTERNAL_KINDS)?,
            sessions: Sessions::new(),
        })
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Run [`Self::extract_in`] in a new session, dropped once done.
    pub async fn extract_file(
        &self,
        path: &Path,
        description: Option<&DataDescriptionData>,
        registry: &mut DefinitionRegistry,
        options: &PipelineOptions,
    ) -> PipelineResult<ExtractionReport> {
        let id = self.sessions.create().await;
        let result = self.extract_in_session(id, path, description, registry, options).await;
        self.sessions.remove(id).await;
        result
    }

    /// Run [`Self::extract_in`] in an existing session. Its artifacts stay
    /// in the session afterwards.
    pub async fn extract_in_session(
        &self,
        session: Uuid,
        path: &Path,
        description: Option<&DataDescriptionData>,
        registry: &mut DefinitionRegistry,
        options: &PipelineOptions,
    ) -> PipelineResult<ExtractionReport> {
        let runtime = self.sessions.get(session).await?;
        let mut runtime = runtime.lock().await;
        self.extract_in(&mut runtime, path, description, registry, options)
            .await
    }

    /// Store the inputs in `runtime`, obtain a definition and a table, and
    /// read both back from the runtime.
    pub async fn extract_in(
        &self,
        runtime: &mut Runtime,
        path: &Path,
        description: Option<&DataDescriptionData>,
        registry: &mut DefinitionRegistry,
        options: &PipelineOptions,
    ) -> PipelineResult<ExtractionReport> {
        log_info(format!("Reading {}", path.display()));
        let file = FileData::new(path);
        let grid = file.load_grid()?;
        log_success(format!("Grid: {} rows x {} columns", grid.height(), grid.width()));

        runtime.set(Artifact::new(file));
        if let Some(description) = description {
            runtime.set(Artifact::new(description.clone()));
        }
        runtime.set(Artifact::new(UserInfoData {
            user_comment: options.user_note.clone().unwrap_or_default(),
        }));

        let origin = self.find_definition(runtime, registry, options).await?;
        let definition: ParserDefinition = runtime
            .get::<ParserDefinition>(ArtifactKind::ParserDefinition.default_name())?
            .clone();
        let table: NormalizedTable = runtime
            .get::<NormalizedTable>(ArtifactKind::Parsed.default_name())?
            .clone();

        let row_errors = if options.skip_validation {
            Vec::new()
        } else {
            let errors = validate_table(&table);
            if errors.is_empty() {
                log_success(format!("All {} rows valid", table.len()));
            } else {
                log_warning(format!("{} of {} rows failed validation", errors.len(), table.len()));
                for failure in errors.iter().take(3) {
                    log_error(format!("Row {}: {}", failure.row, failure.errors.join(", ")));
                }
            }
            errors
        };

        Ok(ExtractionReport {
            table,
            definition,
            origin,
            row_errors,
            grid_height: grid.height(),
            grid_width: grid.width(),
        })
    }

    /// Leaves the chosen definition and its table in `runtime`.
    async fn find_definition(
        &self,
        runtime: &mut Runtime,
        registry: &mut DefinitionRegistry,
        options: &PipelineOptions,
    ) -> PipelineResult<DefinitionOrigin> {
        if let Some(path) = &options.rules_path {
            log_info(format!("Using rule document {}", path.display()));
            let definition = ParserDefinition::from_json(&std::fs::read_to_string(path)?)?;
            runtime.set(Artifact::new(definition));
            runtime.run(self.workers.get(ExtractionWorker::NAME)?.as_ref()).await?;
            return Ok(DefinitionOrigin::Provided { path: path.clone() });
        }

        if let (false, Some(platform)) = (options.no_cache, &options.platform) {
            if let Some(id) = self.try_stored(runtime, platform, registry).await? {
                return Ok(DefinitionOrigin::Registry { id });
            }
        }

        let Ok(worker) = self.workers.get(ParsingRulesWorker::NAME) else {
            return Err(PipelineError::NoDefinition(
                "no stored definition matched and no proposer is configured".to_string(),
            ));
        };
        if runtime.store().of_kind(ArtifactKind::DataDescription).is_empty() {
            return Err(PipelineError::NoDefinition(
                "no stored definition matched and proposing one needs a data description".to_string(),
            ));
        }

        log_info("Asking the proposer for a new rule document...");
        runtime.run(worker.as_ref()).await?;

        let saved_as = if options.no_save {
            None
        } else {
            let definition = runtime
                .get::<ParserDefinition>(ArtifactKind::ParserDefinition.default_name())?
                .clone();
            let platforms = options.platform.iter().cloned().collect();
            match registry.save(definition, platforms) {
                Ok(id) => {
                    registry.update_stats(&id, true)?;
                    log_success(format!("Saved as: {}", id));
                    Some(id)
                }
                Err(e) => {
                    log_warning(format!("Could not save definition: {}", e));
                    None
                }
            }
        };
        Ok(DefinitionOrigin::Proposed { saved_as })
    }

    /// Try every stored definition for `platform`; the first one producing
    /// records wins. Each try updates the definition's stats.
    async fn try_stored(
        &self,
        runtime: &mut Runtime,
        platform: &str,
        registry: &mut DefinitionRegistry,
    ) -> PipelineResult<Option<String>> {
        runtime.set(Artifact::new(PlatformData::new(platform)));
        runtime.run(self.workers.get(PlatformWorker::NAME)?.as_ref()).await?;
        let known: &PlatformData = runtime.get(ArtifactKind::Platform.default_name())?;
        if !known.exists {
            log_warning(format!("No stored definitions for '{}'", platform));
            return Ok(None);
        }
        log_success(format!("Stored parsers for '{}': {}", platform, known.parser_names.join(", ")));

        let candidates: Vec<(String, ParserDefinition, f64)> = registry
            .find_for_platform(platform)
            .into_iter()
            .map(|d| (d.id.clone(), d.definition.clone(), d.success_rate))
            .collect();
        let extraction = self.workers.get(ExtractionWorker::NAME)?;

        let total = candidates.len();
        for (i, (id, definition, success_rate)) in candidates.into_iter().enumerate() {
            log_info(format!(
                "Trying {}/{}: {} (success rate: {:.0}%)",
                i + 1,
                total,
                id,
                success_rate * 100.0
            ));
            let name = definition.parser_name.clone();
            runtime.set(Artifact::new(definition));
            match runtime.run(extraction.as_ref()).await {
                Ok(_) => {
                    let records = runtime
                        .get::<NormalizedTable>(ArtifactKind::Parsed.default_name())?
                        .len();
                    if records > 0 {
                        registry.update_stats(&id, true)?;
                        log_success(format!("'{}' worked, {} records", name, records));
                        return Ok(Some(id));
                    }
                    registry.update_stats(&id, false)?;
                    log_warning(format!("'{}' produced no records", name));
                }
                Err(e) => {
                    registry.update_stats(&id, false)?;
                    log_warning(format!("'{}' failed: {}", name, e));
                }
            }
        }

        log_warning(format!("All {} stored definitions failed", total));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProposerError, RuntimeError};
    use crate::repair::ProposalRequest;
    use crate::rules::example_definition;
    use crate::runtime::Granularity;
    use futures::future::BoxFuture;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    const REPORT: &str = ",Jan-21,Feb-21\nViews,4,5\nClicks,1,0\n";

    fn grid() -> Grid {
        Grid::from_rows(vec![
            vec!["", "Jan-21", "Feb-21"],
            vec!["Views", "4", "5"],
            vec!["Clicks", "1", "0"],
        ])
    }

    fn write_report(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("report.csv");
        std::fs::write(&path, REPORT).unwrap();
        path
    }

    fn description() -> DataDescriptionData {
        DataDescriptionData {
            begin_month_year: "01-2021".into(),
            end_month_year: "02-2021".into(),
            english: true,
            title_report: false,
            granularity: Granularity::Monthly,
            title_identifiers: vec![],
            metrics: vec![],
            dimensions: vec![],
        }
    }

    /// Always answers with the example document.
    struct FixedProposer;

    impl Proposer for FixedProposer {
        fn propose<'a>(&'a self, _request: &'a ProposalRequest) -> BoxFuture<'a, Result<String, ProposerError>> {
            Box::pin(async { Ok(example_definition().to_string()) })
        }
    }

    fn with_proposer(registry: &DefinitionRegistry) -> Pipeline {
        let proposer: Arc<dyn Proposer> = Arc::new(FixedProposer);
        Pipeline::new(Some(proposer), RepairOptions::default(), registry).unwrap()
    }

    #[test]
    fn test_validate_and_execute() {
        let table = validate_and_execute(&example_definition().to_string(), &grid()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.rows[2]["metric"], json!("Link Clicks"));
    }

    #[test]
    fn test_errors_collapse_to_strings() {
        let err = validate_and_execute("{", &grid()).unwrap_err();
        assert!(err.contains("invalid JSON"));

        let mut document = example_definition();
        document["areas"][0]["data_headers"]["roles"][0]["date_pattern"] = json!("%d.%m.%Y");
        let err = validate_and_execute(&document.to_string(), &grid()).unwrap_err();
        assert!(err.starts_with("evaluation failed"));
        assert!(err.contains("Jan-21"));
    }

    #[test]
    fn test_workers_without_proposer() {
        let dir = tempdir().unwrap();
        let registry = DefinitionRegistry::new(dir.path());
        let pipeline = Pipeline::new(None, RepairOptions::default(), &registry).unwrap();
        let mut names: Vec<&str> = pipeline.workers().names().collect();
        names.sort();
        assert_eq!(names, vec!["extraction_worker", "platform_worker"]);
        assert_eq!(with_proposer(&registry).workers().len(), 3);
    }

    #[tokio::test]
    async fn test_proposes_then_reuses_stored_definition() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let pipeline = with_proposer(&registry);
        let options = PipelineOptions {
            platform: Some("JSTOR".into()),
            ..PipelineOptions::default()
        };

        let first = pipeline
            .extract_file(&path, Some(&description()), &mut registry, &options)
            .await
            .unwrap();
        let saved = match &first.origin {
            DefinitionOrigin::Proposed { saved_as: Some(id) } => id.clone(),
            other => panic!("unexpected origin: {:?}", other),
        };
        assert!(first.row_errors.is_empty());
        assert_eq!((first.grid_height, first.grid_width), (3, 3));

        let second = pipeline
            .extract_file(&path, None, &mut registry, &options)
            .await
            .unwrap();
        assert_eq!(second.origin, DefinitionOrigin::Registry { id: saved });
        assert_eq!(second.table, first.table);
        assert!(pipeline.sessions().ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_keeps_artifacts() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let pipeline = with_proposer(&registry);
        let options = PipelineOptions {
            user_note: Some("monthly export".into()),
            no_save: true,
            ..PipelineOptions::default()
        };

        let session = pipeline.sessions().create().await;
        let report = pipeline
            .extract_in_session(session, &path, Some(&description()), &mut registry, &options)
            .await
            .unwrap();
        assert_eq!(report.origin, DefinitionOrigin::Proposed { saved_as: None });
        assert!(registry.is_empty());

        let runtime = pipeline.sessions().get(session).await.unwrap();
        let runtime = runtime.lock().await;
        let parsed: &NormalizedTable = runtime.get("parsed_data").unwrap();
        assert_eq!(parsed, &report.table);
        let definition: &ParserDefinition = runtime.get("parser_definition_data").unwrap();
        assert_eq!(definition.parser_name, "example_monthly_columns");
        let note: &UserInfoData = runtime.get("user_info_data").unwrap();
        assert_eq!(note.user_comment, "monthly export");
    }

    #[tokio::test]
    async fn test_failing_stored_definition_falls_back_to_proposer() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let mut broken = example_definition();
        broken["parser_name"] = json!("day_first");
        broken["areas"][0]["data_headers"]["roles"][0]["date_pattern"] = json!("%d.%m.%Y");
        let stale = registry
            .save(ParserDefinition::from_value(&broken).unwrap(), vec!["JSTOR".into()])
            .unwrap();

        let pipeline = with_proposer(&registry);
        let options = PipelineOptions {
            platform: Some("JSTOR".into()),
            no_save: true,
            ..PipelineOptions::default()
        };
        let report = pipeline
            .extract_file(&path, Some(&description()), &mut registry, &options)
            .await
            .unwrap();
        assert_eq!(report.origin, DefinitionOrigin::Proposed { saved_as: None });
        assert_eq!(report.table.len(), 4);

        let stored = registry.get(&stale).unwrap();
        assert_eq!(stored.use_count, 1);
        assert!(stored.success_rate < 1.0);
    }

    #[tokio::test]
    async fn test_no_definition_without_proposer() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let pipeline = Pipeline::new(None, RepairOptions::default(), &registry).unwrap();
        let err = pipeline
            .extract_file(&path, Some(&description()), &mut registry, &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoDefinition(_)));

        let err = with_proposer(&registry)
            .extract_file(&path, None, &mut registry, &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoDefinition(ref m) if m.contains("data description")));
    }

    #[tokio::test]
    async fn test_provided_rules_and_row_validation() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let rules = dir.path().join("rules.json");
        let mut document = example_definition();
        // raw header text passes through instead of failing
        document["areas"][0]["data_headers"]["roles"][0]["extract_params"] = json!({"on_validation_error": "pass"});
        document["areas"][0]["data_headers"]["roles"][0]["date_pattern"] = json!("%Y");
        std::fs::write(&rules, document.to_string()).unwrap();

        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let pipeline = Pipeline::new(None, RepairOptions::default(), &registry).unwrap();
        let options = PipelineOptions {
            rules_path: Some(rules.clone()),
            ..PipelineOptions::default()
        };
        let report = pipeline
            .extract_file(&path, None, &mut registry, &options)
            .await
            .unwrap();
        assert_eq!(report.origin, DefinitionOrigin::Provided { path: rules });
        assert_eq!(report.table.rows[0]["date"], json!("Jan-21"));
        assert_eq!(report.invalid_rows(), 4);
    }

    #[tokio::test]
    async fn test_provided_rules_failure_is_a_worker_error() {
        let dir = tempdir().unwrap();
        let path = write_report(&dir);
        let rules = dir.path().join("rules.json");
        let mut document = example_definition();
        document["areas"][0]["data_headers"]["roles"][0]["date_pattern"] = json!("%d.%m.%Y");
        std::fs::write(&rules, document.to_string()).unwrap();

        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));
        let pipeline = Pipeline::new(None, RepairOptions::default(), &registry).unwrap();
        let options = PipelineOptions {
            rules_path: Some(rules),
            ..PipelineOptions::default()
        };
        let err = pipeline
            .extract_file(&path, None, &mut registry, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Runtime(RuntimeError::Worker { ref worker, .. }) if worker == "extraction_worker"
        ));
    }
}
