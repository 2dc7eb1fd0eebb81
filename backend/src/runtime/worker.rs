//! Worker contract and the startup registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::artifact::{Artifact, ArtifactData, ArtifactKind, Payload};
use crate::error::{RuntimeError, RuntimeResult, WorkerError};

/// Inputs handed to a worker, one payload per declared kind.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    payloads: Vec<Payload>,
}

impl Inputs {
    pub fn new(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }

    pub fn get<T: ArtifactData>(&self) -> Result<&T, WorkerError> {
        self.find::<T>()
            .ok_or_else(|| WorkerError::UnexpectedInput(format!("no {} input", T::KIND)))
    }

    pub fn find<T: ArtifactData>(&self) -> Option<&T> {
        self.payloads.iter().find_map(T::from_payload)
    }
}

/// A unit of work with explicit input and output kinds.
///
/// The runtime resolves every kind in [`Worker::inputs`] to the single
/// artifact of that kind before calling [`Worker::run`], and rejects outputs
/// whose kind is not listed in [`Worker::outputs`].
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    fn inputs(&self) -> &[ArtifactKind];

    fn outputs(&self) -> &[ArtifactKind];

    fn run<'a>(&'a self, inputs: Inputs) -> BoxFuture<'a, Result<Vec<Artifact>, WorkerError>>;
}

/// The workers available to a process, checked once at startup.
pub struct WorkerRegistry {
    workers: Vec<Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Register `workers`. Every declared input kind must be either in
    /// `external` (supplied from outside, e.g. uploads) or produced by some
    /// registered worker.
    pub fn new(workers: Vec<Arc<dyn Worker>>, external: &[ArtifactKind]) -> RuntimeResult<Self> {
        let mut names = BTreeSet::new();
        for worker in &workers {
            if !names.insert(worker.name().to_string()) {
                return Err(RuntimeError::DuplicateWorker(worker.name().to_string()));
            }
        }

        let producible: BTreeSet<ArtifactKind> = external
            .iter()
            .copied()
            .chain(workers.iter().flat_map(|w| w.outputs().iter().copied()))
            .collect();
        for worker in &workers {
            if let Some(kind) = worker.inputs().iter().find(|k| !producible.contains(k)) {
                return Err(RuntimeError::UncoveredInput {
                    worker: worker.name().to_string(),
                    kind: *kind,
                });
            }
        }

        Ok(Self { workers })
    }

    pub fn get(&self, name: &str) -> RuntimeResult<Arc<dyn Worker>> {
        self.workers
            .iter()
            .find(|w| w.name() == name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownWorker(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|w| w.name())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
