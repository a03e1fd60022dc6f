//! Read-only reference catalogs.
//!
//! The hazard catalog maps a GES name to its legally-mandated
//! consequences and controls. The exam catalog maps exam codes to
//! display metadata and is used for presentation only.

use crate::{hazard::fold, types::Months};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub consequences: String,
    #[serde(default)]
    pub worst_consequence: String,
    /// Exam code -> required. Codes mapped to `false` are advisory only.
    #[serde(default)]
    pub exams: BTreeMap<String, bool>,
    #[serde(default)]
    pub ppe: Vec<String>,
    #[serde(default)]
    pub aptitudes: Vec<String>,
    #[serde(default)]
    pub disqualifying_conditions: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn required_exams(&self) -> impl Iterator<Item = &String> {
        self.exams
            .iter()
            .filter(|(_, required)| **required)
            .map(|(code, _)| code)
    }
}

/// Outcome of a catalog lookup. "Found but empty" is a `Found` entry
/// with empty lists, never `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLookup<'a> {
    Found(&'a CatalogEntry),
    NotFound,
}

/// Catalog collaborator consumed by the hazard resolver.
pub trait HazardCatalog: Send + Sync {
    fn lookup(&self, name: &str) -> CatalogLookup<'_>;
}

#[derive(Debug, Clone, Deserialize)]
struct HazardCatalogFile {
    hazards: Vec<CatalogEntry>,
}

/// In-memory catalog: exact folded name first, then known synonyms.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_alias = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_name.entry(fold(&entry.name)).or_insert(idx);
            for alias in &entry.aliases {
                by_alias.entry(fold(alias)).or_insert(idx);
            }
        }
        Self {
            entries,
            by_name,
            by_alias,
        }
    }

    /// Load from `{data_dir}/catalog/hazard_catalog.json`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/catalog/hazard_catalog.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: HazardCatalogFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(Self::new(file.hazards))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HazardCatalog for StaticCatalog {
    fn lookup(&self, name: &str) -> CatalogLookup<'_> {
        let key = fold(name);
        self.by_name
            .get(&key)
            .or_else(|| self.by_alias.get(&key))
            .and_then(|idx| self.entries.get(*idx))
            .map_or(CatalogLookup::NotFound, CatalogLookup::Found)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamInfo {
    pub code: String,
    pub name: String,
    pub default_periodicity_months: Months,
}

#[derive(Debug, Clone, Deserialize)]
struct ExamCatalogFile {
    exams: Vec<ExamInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct ExamCatalog {
    exams: BTreeMap<String, ExamInfo>,
}

impl ExamCatalog {
    pub fn new(exams: Vec<ExamInfo>) -> Self {
        Self {
            exams: exams.into_iter().map(|e| (e.code.clone(), e)).collect(),
        }
    }

    /// Load from `{data_dir}/catalog/exam_catalog.json`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/catalog/exam_catalog.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: ExamCatalogFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(Self::new(file.exams))
    }

    pub fn get(&self, code: &str) -> Option<&ExamInfo> {
        self.exams.get(code)
    }
}
