//! Project registry: which roots are enabled, and which one is active.
//!
//! Persisted as `projects.json` in the data directory so external
//! installers and hooks can discover project ids.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub uuid: String,
    pub root_path: PathBuf,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    pub projects: Vec<ProjectEntry>,
    /// Uuid of the project bound to the CWD at enablement time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
}

impl ProjectRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("corrupt registry {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).with_context(|| format!("cannot write {}", path.display()))
    }

    /// Register a root (idempotent per canonical path), enable it, and
    /// make it active.
    pub fn enable(&mut self, root: &Path) -> ProjectEntry {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        if let Some(entry) = self
            .projects
            .iter_mut()
            .find(|p| p.root_path == canonical)
        {
            entry.enabled = true;
            let entry = entry.clone();
            self.active = Some(entry.uuid.clone());
            return entry;
        }
        let entry = ProjectEntry {
            uuid: uuid::Uuid::new_v4().to_string(),
            root_path: canonical,
            enabled: true,
        };
        self.projects.push(entry.clone());
        self.active = Some(entry.uuid.clone());
        entry
    }

    /// Remove a project from the registry entirely.
    pub fn remove(&mut self, uuid: &str) -> Option<ProjectEntry> {
        let index = self.projects.iter().position(|p| p.uuid == uuid)?;
        if self.active.as_deref() == Some(uuid) {
            self.active = None;
        }
        Some(self.projects.remove(index))
    }

    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<&ProjectEntry> {
        self.projects.iter().find(|p| p.uuid == uuid)
    }

    #[must_use]
    pub fn active_entry(&self) -> Option<&ProjectEntry> {
        let uuid = self.active.as_deref()?;
        self.get(uuid)
    }
}
