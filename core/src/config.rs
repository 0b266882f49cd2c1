//! User settings and the ignored-scope filter built from them.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::editor::Editor;
use crate::error::ConfigError;

pub const DEFAULT_SERVER: &str = "https://api.languagetool.org/v2/check";

/// Per-document setting holding a language override.
pub const LANGUAGE_SETTING: &str = "proofline.language";

/// Top-level settings, read from `proofline.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: String,
    pub language: String,
    pub user_agent: String,
    pub debug: bool,
    pub highlight_scope: String,
    pub ignored_scopes: Vec<String>,
    pub ignored_rules_path: PathBuf,
    pub max_popup_replacements: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.into(),
            language: "auto".into(),
            user_agent: "proofline".into(),
            debug: false,
            highlight_scope: "comment".into(),
            ignored_scopes: vec![
                "comment.*".into(),
                "markup.raw.*".into(),
                "meta.link.*".into(),
            ],
            ignored_rules_path: PathBuf::from("proofline-user.yml"),
            max_popup_replacements: 3,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Language for a document: its own override, else the configured one.
    pub fn language_for(&self, editor: &dyn Editor) -> String {
        editor
            .setting(LANGUAGE_SETTING)
            .filter(|code| !code.trim().is_empty())
            .unwrap_or_else(|| self.language.clone())
    }

    /// Resolves `ignored_rules_path` against `root` when it is relative.
    pub fn ignored_rules_file(&self, root: &Path) -> PathBuf {
        if self.ignored_rules_path.is_absolute() {
            self.ignored_rules_path.clone()
        } else {
            root.join(&self.ignored_rules_path)
        }
    }
}

/// Compiled `ignored_scopes` patterns.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    set: Option<GlobSet>,
}

impl ScopeFilter {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns: Vec<&String> = patterns.iter().filter(|p| !p.trim().is_empty()).collect();
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::Glob {
            pattern: "<set>".into(),
            source,
        })?;
        Ok(Self { set: Some(set) })
    }

    pub fn none() -> Self {
        Self { set: None }
    }

    /// True if any scope at `point` matches an ignored pattern.
    pub fn is_ignored(&self, editor: &dyn Editor, point: usize) -> bool {
        let Some(set) = &self.set else {
            return false;
        };
        editor
            .scope_names(point)
            .iter()
            .any(|scope| set.is_match(scope))
    }
}
