//! Keyed artifact store: one current value per logical name.

use std::collections::BTreeMap;

use super::artifact::{Artifact, ArtifactData, ArtifactKind, Payload};
use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    slots: BTreeMap<String, Payload>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `artifact` under its name, returning what it replaced.
    pub fn set(&mut self, artifact: Artifact) -> Option<Payload> {
        self.slots.insert(artifact.name, artifact.payload)
    }

    pub fn get<T: ArtifactData>(&self, name: &str) -> RuntimeResult<&T> {
        let payload = self
            .slots
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        T::from_payload(payload).ok_or_else(|| RuntimeError::TypeMismatch {
            name: name.to_string(),
            expected: T::KIND,
            found: payload.kind(),
        })
    }

    pub fn payload(&self, name: &str) -> Option<&Payload> {
        self.slots.get(name)
    }

    /// All slots currently holding `kind`, in name order.
    pub fn of_kind(&self, kind: ArtifactKind) -> Vec<(&str, &Payload)> {
        self.slots
            .iter()
            .filter(|(_, payload)| payload.kind() == kind)
            .map(|(name, payload)| (name.as_str(), payload))
            .collect()
    }

    pub fn remove(&mut self, name: &str) -> Option<Payload> {
        self.slots.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
