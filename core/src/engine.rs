//! The engine: a problem registry plus the check cycle and edit tracking
//! that keep it consistent with each open document.
//!
//! Every operation takes the host [`Editor`] for the document it acts on
//! and returns what happened; sequencing follow-up commands (for example
//! jumping to the next problem after a fix) is left to the caller.

use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, info, warn};

use crate::config::{ScopeFilter, Settings};
use crate::editor::{Editor, MarkerStyle};
use crate::error::{CheckError, ConfigError};
use crate::ignore::IgnoredRules;
use crate::problem::{Finding, Problem, ProblemId, RawMatch};
use crate::region::{Region, TextChange};
use crate::registry::ProblemRegistry;
use crate::tracker;

/// Implicit per-document state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Idle,
    HasProblems { active: usize },
}

/// Everything needed to send one check request, captured before the
/// request suspends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPlan {
    /// Part of the document being checked.
    pub region: Region,
    pub text: String,
    pub language: String,
    pub disabled_rules: Vec<String>,
}

pub struct Engine<D> {
    pub(crate) registry: ProblemRegistry<D>,
    pub(crate) scopes: ScopeFilter,
    pub(crate) marker: MarkerStyle,
    pub(crate) max_popup_replacements: usize,
}

impl<D: Eq + Hash + Clone + Debug> Engine<D> {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            registry: ProblemRegistry::new(),
            scopes: ScopeFilter::new(&settings.ignored_scopes)?,
            marker: MarkerStyle::squiggly(settings.highlight_scope.clone()),
            max_popup_replacements: settings.max_popup_replacements.max(1),
        })
    }

    pub fn registry(&self) -> &ProblemRegistry<D> {
        &self.registry
    }

    pub fn problems(&self, document: &D) -> &[Problem] {
        self.registry.get(document)
    }

    pub fn state(&self, document: &D) -> DocumentState {
        match self.registry.get(document).len() {
            0 => DocumentState::Idle,
            active => DocumentState::HasProblems { active },
        }
    }

    /// Captures the text to check: the selection when it is non-empty,
    /// otherwise the whole document.
    pub fn prepare_check(
        &self,
        editor: &dyn Editor,
        settings: &Settings,
        ignored: &IgnoredRules,
    ) -> CheckPlan {
        let region = match editor.selection() {
            Some(selection) if !selection.is_empty() => selection,
            _ => Region::new(0, editor.size()),
        };
        CheckPlan {
            region,
            text: editor.substr(region),
            language: settings.language_for(editor),
            disabled_rules: ignored.ids(),
        }
    }

    /// Installs the result of a check. On failure nothing already tracked
    /// is touched; the failure is surfaced as a status message and returned.
    ///
    /// Returns the number of problems now active.
    pub fn complete_check(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
        plan: &CheckPlan,
        result: Result<Vec<RawMatch>, CheckError>,
    ) -> Result<usize, CheckError> {
        let findings = result.and_then(|matches| self.findings(&*editor, plan, &matches));
        let findings = match findings {
            Ok(findings) => findings,
            Err(err) => {
                warn!(?document, error = %err, "check failed");
                editor.set_status(&format!("Could not check document: {err}"));
                return Err(err);
            }
        };

        self.clear_all(editor, document);
        let problems = findings
            .into_iter()
            .enumerate()
            .map(|(index, finding)| {
                let original = editor.substr(finding.region());
                Problem::new(ProblemId(index), finding, original)
            })
            .collect();
        self.registry.replace_all(document, problems);
        self.on_modified(editor, document);

        let active = self.registry.get(document).len();
        info!(?document, active, "check complete");
        Ok(active)
    }

    fn findings(
        &self,
        editor: &dyn Editor,
        plan: &CheckPlan,
        matches: &[RawMatch],
    ) -> Result<Vec<Finding>, CheckError> {
        let size = editor.size();
        let mut findings = Vec::with_capacity(matches.len());
        for (index, raw) in matches.iter().enumerate() {
            let mut finding = Finding::try_from(raw)
                .map_err(|source| CheckError::InvalidMatch { index, source })?;
            if plan.disabled_rules.contains(&finding.rule) {
                continue;
            }
            if !finding.rebase_utf16(&plan.text) {
                debug!(index, "discarding match past the checked text");
                continue;
            }
            finding.shift_offset(plan.region.start as isize);
            let region = finding.region();
            if !plan.region.contains(region) || region.end > size {
                debug!(%region, "discarding match outside checked region");
                continue;
            }
            if self.scopes.is_ignored(editor, finding.offset) {
                debug!(%region, "discarding match in ignored scope");
                continue;
            }
            findings.push(finding);
        }
        findings.sort_by_key(|f| f.offset);
        Ok(findings)
    }

    /// Rebases cached offsets for an edit. Must run for every edit before
    /// the next command on the same document is served.
    pub fn on_text_changed(&mut self, document: &D, change: &TextChange) {
        tracker::shift_after(self.registry.get_mut(document), change);
    }

    /// Recomputes resolution after the document was modified, dropping
    /// resolved problems. Returns the ids removed.
    pub fn on_modified(&mut self, editor: &mut dyn Editor, document: &D) -> Vec<ProblemId> {
        let problems = self.registry.evict(document);
        if problems.is_empty() {
            return Vec::new();
        }
        let (kept, removed) = tracker::recompute(editor, problems, &self.marker);
        self.registry.replace_all(document, kept);
        removed
    }

    /// Removes every problem and marker of the document.
    pub fn clear_all(&mut self, editor: &mut dyn Editor, document: &D) -> usize {
        let problems = self.registry.evict(document);
        debug!(?document, count = problems.len(), "clearing problems");
        for problem in &problems {
            editor.erase_region(&problem.region_key);
        }
        problems.len()
    }

    /// Forgets a closed document.
    pub fn close_document(&mut self, document: &D) {
        self.registry.evict(document);
    }

    /// Removes one problem and its marker.
    pub(crate) fn discard(&mut self, editor: &mut dyn Editor, document: &D, id: ProblemId) {
        if let Some(problem) = self.registry.remove(document, id) {
            editor.erase_region(&problem.region_key);
        }
    }
}
