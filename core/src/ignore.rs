//! Equality grouping for batch ignore, and the persisted ignored-rule list.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::problem::Problem;

/// Two problems are the same issue when category and flagged text match.
pub fn is_equal(a: &Problem, b: &Problem) -> bool {
    a.category == b.category && a.original_content == b.original_content
}

/// Every problem in `problems` that is the same issue as `target`.
pub fn equality_class<'a>(problems: &'a [Problem], target: &Problem) -> Vec<&'a Problem> {
    problems.iter().filter(|p| is_equal(p, target)).collect()
}

/// A user-level suppression of a checker rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IgnoredFile {
    #[serde(default)]
    ignored: Vec<IgnoredRule>,
}

/// Ignored rules backed by a YAML file (`ignored: [{id, description}]`).
#[derive(Debug, Clone, Default)]
pub struct IgnoredRules {
    path: Option<PathBuf>,
    rules: Vec<IgnoredRule>,
}

impl IgnoredRules {
    /// Rules not tied to any file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads `path`; a missing file is an empty list.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let rules = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if text.trim().is_empty() {
                Vec::new()
            } else {
                let file: IgnoredFile =
                    serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                        path: path.to_path_buf(),
                        source,
                    })?;
                file.ignored
            }
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            rules,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = IgnoredFile {
            ignored: self.rules.clone(),
        };
        let text = serde_yaml::to_string(&file).map_err(|source| ConfigError::Yaml {
            path: path.clone(),
            source,
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })
    }

    pub fn rules(&self) -> &[IgnoredRule] {
        &self.rules
    }

    pub fn ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.id.clone()).collect()
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.iter().any(|r| r.id == rule_id)
    }

    /// Returns false if the rule was already present.
    pub fn add(&mut self, rule: IgnoredRule) -> bool {
        if self.contains(&rule.id) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Returns false if the rule was absent.
    pub fn remove(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() != before
    }
}
