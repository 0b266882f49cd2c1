//! Keeping problem positions current while the document changes, and
//! deciding when a problem has been resolved.

use tracing::debug;

use crate::editor::{Editor, MarkerStyle};
use crate::problem::{Problem, ProblemId};
use crate::region::{Region, TextChange};

/// The problem's region as the host currently tracks it, falling back to
/// the cached offsets when the host has no live region for it.
pub fn live_region(editor: &dyn Editor, problem: &Problem) -> Region {
    editor
        .get_region(&problem.region_key)
        .unwrap_or_else(|| problem.region())
}

/// A problem is resolved once its region has collapsed, no longer fits the
/// document, or no longer holds the text it was reported for.
pub fn is_resolved(editor: &dyn Editor, problem: &Problem) -> bool {
    let region = live_region(editor, problem);
    if region.is_empty() || region.end > editor.size() {
        return true;
    }
    editor.substr(region) != problem.original_content
}

/// Shifts every problem starting at or after the edit by its net length
/// change. Position comparison only: an edit inside a problem moves its
/// start and leaves the length alone, which content comparison later
/// turns into a resolution.
pub fn shift_after(problems: &mut [Problem], change: &TextChange) {
    let delta = change.delta();
    if delta == 0 {
        return;
    }
    for problem in problems.iter_mut().filter(|p| p.offset >= change.position) {
        problem.shift_offset(delta);
    }
}

/// Drops resolved problems (erasing their markers), resynchronises cached
/// offsets of the rest from their live regions and redraws them.
///
/// Running it twice without an edit in between changes nothing.
pub fn recompute(
    editor: &mut dyn Editor,
    problems: Vec<Problem>,
    marker: &MarkerStyle,
) -> (Vec<Problem>, Vec<ProblemId>) {
    let mut kept = Vec::with_capacity(problems.len());
    let mut removed = Vec::new();

    for mut problem in problems {
        if is_resolved(editor, &problem) {
            debug!(id = %problem.id, "removing solved problem");
            editor.erase_region(&problem.region_key);
            removed.push(problem.id);
            continue;
        }
        let region = live_region(editor, &problem);
        problem.offset = region.start;
        problem.length = region.len();
        editor.add_region(&problem.region_key, region, marker);
        kept.push(problem);
    }

    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEditor;
    use crate::problem::Finding;

    fn problem(id: usize, offset: usize, content: &str) -> Problem {
        let finding = Finding {
            offset,
            length: content.chars().count(),
            message: "m".into(),
            category: "TYPOS".into(),
            rule: "R".into(),
            replacements: vec![],
            urls: vec![],
        };
        Problem::new(ProblemId(id), finding, content.into())
    }

    #[test]
    fn unchanged_text_is_not_resolved() {
        let editor = MemoryEditor::new("Teh cat sat.");
        assert!(!is_resolved(&editor, &problem(0, 0, "Teh")));
    }

    #[test]
    fn changed_or_collapsed_text_is_resolved() {
        let mut editor = MemoryEditor::new("Teh cat sat.");
        let p = problem(0, 0, "Teh");
        let style = MarkerStyle::squiggly("text");
        editor.add_region(&p.region_key, p.region(), &style);

        editor.edit(Region::new(1, 3), "he");
        assert!(is_resolved(&editor, &p));

        editor.edit(Region::new(0, 3), "");
        assert_eq!(editor.get_region(&p.region_key), Some(Region::caret(0)));
        assert!(is_resolved(&editor, &p));
    }

    #[test]
    fn region_past_document_end_is_resolved() {
        let editor = MemoryEditor::new("Teh");
        assert!(is_resolved(&editor, &problem(0, 2, "eh!")));
    }

    #[test]
    fn shifts_only_problems_at_or_after_edit() {
        let mut problems = vec![problem(0, 0, "a"), problem(1, 5, "b"), problem(2, 9, "c")];
        shift_after(&mut problems, &TextChange::new(5, 1, 4));
        let offsets: Vec<_> = problems.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 8, 12]);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut editor = MemoryEditor::new("Teh cat sat on teh mat.");
        let style = MarkerStyle::squiggly("text");
        let problems = vec![problem(0, 0, "Teh"), problem(1, 15, "teh")];

        let (first, removed) = recompute(&mut editor, problems, &style);
        assert!(removed.is_empty());
        editor.edit(Region::new(15, 18), "the");
        let (second, removed) = recompute(&mut editor, first, &style);
        assert_eq!(removed, vec![ProblemId(1)]);
        let (third, removed) = recompute(&mut editor, second.clone(), &style);
        assert!(removed.is_empty());
        assert_eq!(second, third);
        assert_eq!(editor.marker_count(), 1);
    }
}
