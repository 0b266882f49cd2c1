//! Coarse scope names for Markdown-ish text, so `ignored_scopes` has
//! something to match against in clients that do not report scopes.

use once_cell::sync::Lazy;
use proofline_core::Region;
use regex::Regex;

static SCOPE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?ms)^[ \t]*```.*?^[ \t]*```[^\n]*$", "markup.raw.block.markdown"),
        (r"(?ms)^[ \t]*~~~.*?^[ \t]*~~~[^\n]*$", "markup.raw.block.markdown"),
        (r"`[^`\n]+`", "markup.raw.inline.markdown"),
        (r"(?s)<!--.*?-->", "comment.block.html"),
        (r"\]\([^)\s]*\)", "meta.link.inline.markdown"),
        (r"https?://[^\s)>\]]+", "meta.link.url"),
    ]
    .into_iter()
    .map(|(pattern, scope)| (Regex::new(pattern).expect("valid scope regex"), scope))
    .collect()
});

/// Scoped regions of `text` in character offsets.
pub fn scan(text: &str) -> Vec<(Region, &'static str)> {
    let char_starts: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
    let to_char = |byte: usize| char_starts.partition_point(|&start| start < byte);

    SCOPE_PATTERNS
        .iter()
        .flat_map(|(re, scope)| {
            re.find_iter(text)
                .map(|m| (Region::new(to_char(m.start()), to_char(m.end())), *scope))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes_at(text: &str, point: usize) -> Vec<&'static str> {
        scan(text)
            .into_iter()
            .filter(|(region, _)| region.start <= point && point < region.end)
            .map(|(_, scope)| scope)
            .collect()
    }

    #[test]
    fn fenced_code_is_raw() {
        let text = "Intro teh.\n```\nlet teh = 1;\n```\nOutro.";
        assert_eq!(scopes_at(text, 19), vec!["markup.raw.block.markdown"]);
        assert!(scopes_at(text, 6).is_empty());
        assert!(scopes_at(text, 34).is_empty());
    }

    #[test]
    fn inline_code_comments_and_links() {
        let text = "Use `teh` <!-- teh --> [docs](https://example.org/teh) é";
        assert_eq!(scopes_at(text, 5), vec!["markup.raw.inline.markdown"]);
        assert_eq!(scopes_at(text, 15), vec!["comment.block.html"]);
        assert!(scopes_at(text, 35).contains(&"meta.link.inline.markdown"));
        assert!(scopes_at(text, 35).contains(&"meta.link.url"));
        assert!(scopes_at(text, 24).is_empty());
    }

    #[test]
    fn offsets_are_in_characters() {
        let text = "héllo `x`";
        assert_eq!(scan(text), vec![(Region::new(6, 9), "markup.raw.inline.markdown")]);
    }
}
