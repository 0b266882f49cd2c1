//! User commands: navigation, fixes, ignoring, rule deactivation and the
//! hover card.

use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, warn};

use crate::config::LANGUAGE_SETTING;
use crate::editor::Editor;
use crate::engine::Engine;
use crate::error::CommandError;
use crate::ignore::{equality_class, IgnoredRule, IgnoredRules};
use crate::languages::{canonical_code, AUTODETECT, LANGUAGES};
use crate::link::{LinkAction, PopupLink};
use crate::problem::{Problem, ProblemId};
use crate::region::{char_len, Region};
use crate::tracker::{is_resolved, live_region};

pub const NO_FURTHER_PROBLEMS: &str = "no further language problems to fix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Selected(ProblemId),
    /// Nothing unresolved in that direction; the results panel was closed.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// The replacement was written and the caret placed after it.
    Applied { problem: ProblemId, caret: usize },
    /// Several replacements: the caller must ask the user and answer with
    /// [`Engine::choose_replacement`].
    Choose {
        problem: ProblemId,
        replacements: Vec<String>,
    },
    /// The choice was cancelled and the problem re-selected.
    Cancelled { problem: ProblemId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreOutcome {
    pub ignored: Vec<ProblemId>,
    pub caret: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Applied { problem: ProblemId, caret: usize },
    Expanded(HoverCard),
}

/// What a hover over a problem shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverCard {
    pub problem: ProblemId,
    pub region: Region,
    pub category: String,
    pub message: String,
    pub replacements: Vec<(String, PopupLink)>,
    /// Present when some replacements were left out.
    pub show_all: Option<PopupLink>,
    pub urls: Vec<String>,
}

impl HoverCard {
    /// Markdown rendering; `target` turns a popup link into a link target
    /// the host can route back to [`Engine::follow_link`].
    pub fn render_markdown(&self, target: impl Fn(&PopupLink) -> String) -> String {
        let mut out = format!("**{}**: {}", self.category, self.message);
        if !self.replacements.is_empty() {
            let choices: Vec<String> = self
                .replacements
                .iter()
                .map(|(text, link)| format!("[{}]({})", escape_markdown(text), target(link)))
                .collect();
            out.push_str("\n\nSuggestion(s): ");
            out.push_str(&choices.join(", "));
            if let Some(link) = &self.show_all {
                out.push_str(&format!(" [show all]({})", target(link)));
            }
        }
        if !self.urls.is_empty() {
            out.push_str("\n\nMore Info: ");
            out.push_str(&self.urls.join("\n"));
        }
        out
    }
}

fn escape_markdown(text: &str) -> String {
    if text.is_empty() {
        return "(remove)".to_string();
    }
    text.chars()
        .flat_map(|c| match c {
            '[' | ']' | '(' | ')' | '*' | '_' | '`' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}

fn reject<T>(editor: &mut dyn Editor, err: CommandError) -> Result<T, CommandError> {
    warn!(error = %err, "command rejected");
    editor.set_status(&err.to_string());
    Err(err)
}

impl<D: Eq + Hash + Clone + Debug> Engine<D> {
    /// The active problem whose live region is exactly the selection.
    pub fn selected(&self, editor: &dyn Editor, document: &D) -> Option<&Problem> {
        let selection = editor.selection()?;
        self.registry
            .get(document)
            .iter()
            .find(|p| live_region(editor, p) == selection)
    }

    /// Selects the nearest unresolved problem strictly after (or before) the
    /// start of the selection.
    pub fn goto_next(&self, editor: &mut dyn Editor, document: &D, forward: bool) -> Navigation {
        let cursor = editor.selection().map(|s| s.start);
        let problems = self.registry.get(document);
        let view: &dyn Editor = &*editor;
        let open = |p: &&Problem| !is_resolved(view, p);

        let found = if forward {
            problems
                .iter()
                .filter(open)
                .find(|p| cursor.map_or(true, |c| c < live_region(view, p).start))
        } else {
            problems
                .iter()
                .rev()
                .filter(open)
                .find(|p| cursor.map_or(true, |c| live_region(view, p).start < c))
        };

        match found {
            Some(problem) => {
                debug!(id = %problem.id, forward, "selecting problem");
                let problem = problem.clone();
                select_problem(editor, &problem);
                Navigation::Selected(problem.id)
            }
            None => {
                editor.set_status(NO_FURTHER_PROBLEMS);
                editor.hide_panel();
                Navigation::Exhausted
            }
        }
    }

    /// Selects a problem by id, surfacing its description.
    pub fn select(
        &self,
        editor: &mut dyn Editor,
        document: &D,
        id: ProblemId,
    ) -> Result<(), CommandError> {
        match self.registry.find(document, id).cloned() {
            Some(problem) => {
                select_problem(editor, &problem);
                Ok(())
            }
            None => reject(editor, CommandError::UnknownProblem(id)),
        }
    }

    /// Fixes the selected problem. A single replacement is applied at once;
    /// several are handed back for the user to choose from.
    pub fn apply_fix(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
    ) -> Result<FixOutcome, CommandError> {
        let Some(problem) = self.selected(&*editor, document).cloned() else {
            return reject(editor, CommandError::NoProblemSelected);
        };
        match problem.replacements.len() {
            0 => reject(editor, CommandError::NoReplacements(problem.id)),
            1 => {
                let caret = self.substitute(editor, document, &problem, 0);
                Ok(FixOutcome::Applied {
                    problem: problem.id,
                    caret,
                })
            }
            _ => Ok(FixOutcome::Choose {
                problem: problem.id,
                replacements: problem.replacements.clone(),
            }),
        }
    }

    /// Answers a [`FixOutcome::Choose`]: `None` means the user cancelled.
    pub fn choose_replacement(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
        id: ProblemId,
        choice: Option<usize>,
    ) -> Result<FixOutcome, CommandError> {
        let Some(problem) = self.registry.find(document, id).cloned() else {
            return reject(editor, CommandError::UnknownProblem(id));
        };
        match choice {
            None => {
                select_problem(editor, &problem);
                Ok(FixOutcome::Cancelled { problem: id })
            }
            Some(index) if index >= problem.replacements.len() => reject(
                editor,
                CommandError::ReplacementOutOfRange {
                    problem: id,
                    index,
                    available: problem.replacements.len(),
                },
            ),
            Some(index) => {
                let caret = self.substitute(editor, document, &problem, index);
                Ok(FixOutcome::Applied { problem: id, caret })
            }
        }
    }

    /// Writes replacement `index` over the problem, clears its marker and
    /// returns the caret position after the inserted text.
    fn substitute(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
        problem: &Problem,
        index: usize,
    ) -> usize {
        let region = live_region(&*editor, problem);
        let text = &problem.replacements[index];
        debug!(id = %problem.id, %region, replacement = %text, "applying fix");
        editor.replace(region, text);
        self.discard(editor, document, problem.id);

        let caret = region.start + char_len(text);
        editor.set_selection(Region::caret(caret));
        caret
    }

    /// Ignores the selected problem and every active problem equal to it.
    /// Document text is left alone.
    pub fn ignore(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
    ) -> Result<IgnoreOutcome, CommandError> {
        let Some(target) = self.selected(&*editor, document).cloned() else {
            return reject(editor, CommandError::NoProblemSelected);
        };
        let caret = live_region(&*editor, &target).start;
        let ignored: Vec<ProblemId> = equality_class(self.registry.get(document), &target)
            .iter()
            .map(|p| p.id)
            .collect();
        for id in &ignored {
            self.discard(editor, document, *id);
        }
        debug!(count = ignored.len(), "ignored problems");
        editor.set_selection(Region::caret(caret));
        Ok(IgnoreOutcome { ignored, caret })
    }

    /// Adds the rule of the one problem inside the selection to `rules` and
    /// drops every active problem raised by it. Persisting `rules` is left
    /// to the caller.
    pub fn deactivate_rule(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
        rules: &mut IgnoredRules,
    ) -> Result<IgnoredRule, CommandError> {
        let Some(selection) = editor.selection() else {
            return reject(editor, CommandError::NoProblemSelected);
        };
        let view: &dyn Editor = &*editor;
        let selected: Vec<&Problem> = self
            .registry
            .get(document)
            .iter()
            .filter(|p| selection.contains(live_region(view, p)))
            .collect();
        let problem = match selected.as_slice() {
            [] => return reject(editor, CommandError::NoProblemSelected),
            [problem] => (*problem).clone(),
            _ => return reject(editor, CommandError::MultipleProblemsSelected),
        };

        let rule = IgnoredRule {
            id: problem.rule.clone(),
            description: problem.message.clone(),
        };
        rules.add(rule.clone());
        let dropped: Vec<ProblemId> = self
            .registry
            .get(document)
            .iter()
            .filter(|p| p.rule == rule.id)
            .map(|p| p.id)
            .collect();
        for id in dropped {
            self.discard(editor, document, id);
        }
        editor.set_status(&format!("deactivated rule {}", rule.id));
        Ok(rule)
    }

    /// Hover card for the first unresolved problem under `point`.
    pub fn hover(&self, editor: &dyn Editor, document: &D, point: usize) -> Option<HoverCard> {
        if self.scopes.is_ignored(editor, point) {
            return None;
        }
        self.registry
            .get(document)
            .iter()
            .filter(|p| !is_resolved(editor, p))
            .find(|p| live_region(editor, p).contains_point(point))
            .map(|p| self.card(editor, p, false))
    }

    fn card(&self, editor: &dyn Editor, problem: &Problem, expanded: bool) -> HoverCard {
        let limit = if expanded {
            problem.replacements.len()
        } else {
            self.max_popup_replacements
        };
        let replacements = problem
            .replacements
            .iter()
            .take(limit)
            .enumerate()
            .map(|(index, text)| (text.clone(), PopupLink::replace(problem.id, index)))
            .collect();
        let show_all =
            (problem.replacements.len() > limit).then(|| PopupLink::show_all(problem.id));
        HoverCard {
            problem: problem.id,
            region: live_region(editor, problem),
            category: problem.category.clone(),
            message: problem.message.clone(),
            replacements,
            show_all,
            urls: problem.urls.clone(),
        }
    }

    /// Carries out a popup link. The link's view target is resolved by the
    /// caller, which passes the matching editor.
    pub fn follow_link(
        &mut self,
        editor: &mut dyn Editor,
        document: &D,
        link: &PopupLink,
    ) -> Result<LinkOutcome, CommandError> {
        let id = link.problem();
        let Some(problem) = self.registry.find(document, id).cloned() else {
            return reject(editor, CommandError::UnknownProblem(id));
        };
        match link.action {
            LinkAction::Replace { index, .. } => {
                if index >= problem.replacements.len() {
                    return reject(
                        editor,
                        CommandError::ReplacementOutOfRange {
                            problem: id,
                            index,
                            available: problem.replacements.len(),
                        },
                    );
                }
                editor.hide_popup();
                let caret = self.substitute(editor, document, &problem, index);
                Ok(LinkOutcome::Applied { problem: id, caret })
            }
            LinkAction::ShowAll { .. } => {
                let card = self.card(&*editor, &problem, true);
                editor.show_popup(&card.render_markdown(|link| link.to_string()));
                Ok(LinkOutcome::Expanded(card))
            }
        }
    }
}

/// Moves the selection onto the problem and surfaces its description.
fn select_problem(editor: &mut dyn Editor, problem: &Problem) {
    let region = live_region(&*editor, problem);
    editor.set_selection(region);
    editor.show_popup(&problem.describe());
}

/// Removes a rule from the ignored list. Persisting is left to the caller.
pub fn activate_rule(
    editor: &mut dyn Editor,
    rules: &mut IgnoredRules,
    rule_id: &str,
) -> Result<IgnoredRule, CommandError> {
    let Some(rule) = rules.rules().iter().find(|r| r.id == rule_id).cloned() else {
        return reject(editor, CommandError::UnknownRule(rule_id.to_string()));
    };
    rules.remove(rule_id);
    editor.set_status(&format!("activated rule {}", rule.id));
    Ok(rule)
}

/// Applies entry `index` of the language table to the document; the
/// autodetect entry removes the override.
pub fn change_language(
    editor: &mut dyn Editor,
    index: usize,
) -> Result<Option<&'static str>, CommandError> {
    match LANGUAGES.get(index) {
        Some((_, code)) => set_language(editor, code),
        None => reject(editor, CommandError::UnknownLanguage(index.to_string())),
    }
}

/// Sets the document's language override by code.
pub fn set_language(
    editor: &mut dyn Editor,
    code: &str,
) -> Result<Option<&'static str>, CommandError> {
    if code.eq_ignore_ascii_case(AUTODETECT) {
        editor.erase_setting(LANGUAGE_SETTING);
        return Ok(None);
    }
    match canonical_code(code) {
        Some(code) => {
            editor.set_setting(LANGUAGE_SETTING, code);
            Ok(Some(code))
        }
        None => reject(editor, CommandError::UnknownLanguage(code.to_string())),
    }
}
