//! Definition registry - store and reuse validated parser definitions
//!
//! Definitions are saved as JSON files and looked up by platform name, best
//! success rate first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::logs::log_warning;
use crate::rules::ParserDefinition;

/// Directory where definitions are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".statsflow/definitions";

pub const REGISTRY_DIR_VAR: &str = "STATSFLOW_REGISTRY_DIR";

/// A stored definition with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDefinition {
    pub id: String,
    pub name: String,
    /// Platforms the definition was accepted for
    pub platforms: Vec<String>,
    pub definition: ParserDefinition,
    pub created_at: String,
    pub last_used: Option<String>,
    /// 0.0 to 1.0, exponential moving average
    pub success_rate: f64,
    pub use_count: u32,
}

impl StoredDefinition {
    fn serves(&self, platform: &str) -> bool {
        self.platforms
            .iter()
            .chain(self.definition.platforms.iter())
            .any(|p| p.eq_ignore_ascii_case(platform))
    }
}

pub struct DefinitionRegistry {
    registry_dir: PathBuf,
    definitions: HashMap<String, StoredDefinition>,
}

impl DefinitionRegistry {
    /// Open the registry in `dir`, loading every readable definition.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            definitions: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    /// Open the registry named by `STATSFLOW_REGISTRY_DIR`, or the default.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let dir = env::var(REGISTRY_DIR_VAR).unwrap_or_else(|_| DEFAULT_REGISTRY_DIR.to_string());
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let loaded = fs::read_to_string(&path)
                .map_err(RegistryError::from)
                .and_then(|content| Ok(serde_json::from_str::<StoredDefinition>(&content)?));
            match loaded {
                Ok(stored) => {
                    self.definitions.insert(stored.id.clone(), stored);
                }
                Err(e) => log_warning(format!("Skipping {}: {}", path.display(), e)),
            }
        }
    }

    /// All definitions, by id.
    pub fn list(&self) -> Vec<&StoredDefinition> {
        let mut all: Vec<_> = self.definitions.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn get(&self, id: &str) -> RegistryResult<&StoredDefinition> {
        self.definitions
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Definitions for `platform` (case-insensitive), best success rate
    /// first, then most used.
    pub fn find_for_platform(&self, platform: &str) -> Vec<&StoredDefinition> {
        let mut found: Vec<_> = self
            .definitions
            .values()
            .filter(|d| d.serves(platform))
            .collect();
        found.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.use_count.cmp(&a.use_count))
                .then(a.id.cmp(&b.id))
        });
        found
    }

    /// Store a definition and return its new id.
    pub fn save(&mut self, definition: ParserDefinition, platforms: Vec<String>) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(&definition.parser_name);
        let stored = StoredDefinition {
            id: id.clone(),
            name: definition.parser_name.clone(),
            platforms,
            definition,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            success_rate: 1.0,
            use_count: 0,
        };
        self.write(&stored)?;
        self.definitions.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a rule document file. It must pass structural validation.
    pub fn import(&mut self, path: &Path, platforms: Vec<String>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let definition = ParserDefinition::from_json(&content)?;
        self.save(definition, platforms)
    }

    /// Record one use of `id`.
    pub fn update_stats(&mut self, id: &str, success: bool) -> RegistryResult<()> {
        let stored = self
            .definitions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        stored.success_rate = if success {
            stored.success_rate * 0.9 + 0.1
        } else {
            stored.success_rate * 0.9
        };
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let stored = stored.clone();
        self.write(&stored)
    }

    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.definitions.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_of(id))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn path_of(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredDefinition) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_of(&stored.id), content)?;
        Ok(())
    }

    /// Slug of `name` plus a millisecond timestamp, suffixed if taken.
    fn generate_id(&self, name: &str) -> String {
        let slug = name
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let slug = if slug.is_empty() { "definition".to_string() } else { slug };

        let base = format!("{}-{}", slug, chrono::Utc::now().timestamp_millis());
        let mut id = base.clone();
        let mut n = 1;
        while self.definitions.contains_key(&id) || self.path_of(&id).exists() {
            n += 1;
            id = format!("{}-{}", base, n);
        }
        id
    }
}

impl Default for DefinitionRegistry {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::example_definition;
    use tempfile::tempdir;

    fn definition() -> ParserDefinition {
        ParserDefinition::from_value(&example_definition()).unwrap()
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let id = {
            let mut registry = DefinitionRegistry::new(dir.path());
            registry.save(definition(), vec!["JSTOR".into()]).unwrap()
        };
        assert!(id.starts_with("example-monthly-columns-"));

        let registry = DefinitionRegistry::new(dir.path());
        let stored = registry.get(&id).unwrap();
        assert_eq!(stored.definition, definition());
        assert_eq!(stored.success_rate, 1.0);
    }

    #[test]
    fn test_find_for_platform_orders_by_success() {
        let dir = tempdir().unwrap();
        let mut registry = DefinitionRegistry::new(dir.path());
        let first = registry.save(definition(), vec!["JSTOR".into()]).unwrap();
        let second = registry.save(definition(), vec!["jstor".into()]).unwrap();
        assert_ne!(first, second);
        registry.update_stats(&first, false).unwrap();

        let found: Vec<&str> = registry
            .find_for_platform("Jstor")
            .into_iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(found, vec![second.as_str(), first.as_str()]);

        // platforms listed inside the definition count too
        assert_eq!(registry.find_for_platform("Example Platform").len(), 2);
        assert!(registry.find_for_platform("Scopus").is_empty());
    }

    #[test]
    fn test_update_stats_is_persisted() {
        let dir = tempdir().unwrap();
        let mut registry = DefinitionRegistry::new(dir.path());
        let id = registry.save(definition(), vec![]).unwrap();
        registry.update_stats(&id, false).unwrap();
        registry.update_stats(&id, true).unwrap();

        let reloaded = DefinitionRegistry::new(dir.path());
        let stored = reloaded.get(&id).unwrap();
        assert_eq!(stored.use_count, 2);
        assert!((stored.success_rate - 0.91).abs() < 1e-9);
        assert!(stored.last_used.is_some());
    }

    #[test]
    fn test_import_validates() {
        let dir = tempdir().unwrap();
        let mut registry = DefinitionRegistry::new(dir.path().join("registry"));

        let good = dir.path().join("good.json");
        fs::write(&good, example_definition().to_string()).unwrap();
        assert!(registry.import(&good, vec![]).is_ok());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"parser_name": "x", "areas": []}"#).unwrap();
        assert!(matches!(
            registry.import(&bad, vec![]),
            Err(RegistryError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut registry = DefinitionRegistry::new(dir.path());
        let id = registry.save(definition(), vec![]).unwrap();
        registry.delete(&id).unwrap();
        assert!(registry.is_empty());
        assert!(matches!(registry.delete(&id), Err(RegistryError::NotFound(_))));
        assert!(DefinitionRegistry::new(dir.path()).is_empty());
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("junk.json"), "{ nope").unwrap();
        let registry = DefinitionRegistry::new(dir.path());
        assert!(registry.is_empty());
    }
}
