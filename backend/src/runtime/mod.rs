//! Typed dataflow runtime.
//!
//! A [`Runtime`] owns an [`ArtifactStore`] and runs [`Worker`]s against it.
//! Running a worker is all-or-nothing: inputs are resolved by kind, the
//! worker is awaited, outputs are checked against its declaration, and only
//! then written back.

pub mod artifact;
pub mod session;
pub mod store;
pub mod worker;
pub mod workers;

use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};
use crate::logs::{log_info, log_info_indent, log_success};

pub use artifact::{
    Artifact, ArtifactData, ArtifactKind, DataDescriptionData, FileData, Granularity, Payload,
    PlatformData, TranslationData, UserInfoData,
};
pub use session::Sessions;
pub use store::ArtifactStore;
pub use worker::{Inputs, Worker, WorkerRegistry};
pub use workers::{ExtractionWorker, ParsingRulesWorker, PlatformWorker};

#[derive(Debug, Clone)]
pub struct Runtime {
    id: Uuid,
    store: ArtifactStore,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            store: ArtifactStore::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Overwrite the slot named by `artifact`.
    pub fn set(&mut self, artifact: Artifact) {
        self.store.set(artifact);
    }

    pub fn get<T: ArtifactData>(&self, name: &str) -> RuntimeResult<&T> {
        self.store.get(name)
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run `worker` and store its outputs. Returns the names written.
    ///
    /// Each declared input kind must match exactly one stored artifact. If
    /// resolution, the worker, or the output check fails, nothing is written.
    pub async fn run(&mut self, worker: &dyn Worker) -> RuntimeResult<Vec<String>> {
        let mut payloads = Vec::with_capacity(worker.inputs().len());
        for kind in worker.inputs() {
            let candidates = self.store.of_kind(*kind);
            match candidates.as_slice() {
                [(_, payload)] => payloads.push((*payload).clone()),
                _ => {
                    return Err(RuntimeError::AmbiguousOrMissingInput {
                        worker: worker.name().to_string(),
                        kind: *kind,
                        count: candidates.len(),
                    })
                }
            }
        }

        log_info(format!("Running {} [{}]", worker.name(), self.id));
        let outputs = worker
            .run(Inputs::new(payloads))
            .await
            .map_err(|source| RuntimeError::Worker {
                worker: worker.name().to_string(),
                source,
            })?;

        if let Some(artifact) = outputs.iter().find(|a| !worker.outputs().contains(&a.kind())) {
            return Err(RuntimeError::UndeclaredOutput {
                worker: worker.name().to_string(),
                kind: artifact.kind(),
            });
        }

        let mut written = Vec::with_capacity(outputs.len());
        for artifact in outputs {
            log_info_indent(format!("{} <- {}", artifact.name, worker.name()), 1);
            written.push(artifact.name.clone());
            self.store.set(artifact);
        }
        log_success(format!("{} wrote {} artifact(s)", worker.name(), written.len()));
        Ok(written)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
