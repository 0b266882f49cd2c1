//! Problems: flagged spans reported by the checker, tracked in a document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProblemError;
use crate::region::{char_offset_of_utf16, shift, Region};

/// Identifier of a problem within one document's active set. Assigned in
/// ascending offset order at check time and only stable for that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(pub usize);

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProblemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ProblemId)
    }
}

/// Key under which the host editor tracks a problem's live region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionKey(String);

impl RegionKey {
    pub fn for_problem(id: ProblemId) -> Self {
        Self(format!("proofline-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Match record as the checking service sends it. Every field is optional
/// here so that validation in [`Finding::try_from`] can name what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMatch {
    pub offset: Option<i64>,
    pub length: Option<i64>,
    pub message: Option<String>,
    #[serde(default)]
    pub replacements: Vec<ValueEntry>,
    pub rule: Option<RawRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRule {
    pub id: Option<String>,
    pub category: Option<RawCategory>,
    #[serde(default)]
    pub urls: Vec<ValueEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCategory {
    pub name: Option<String>,
}

/// `{ "value": ... }` wrapper used for replacements and rule URLs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueEntry {
    pub value: Option<String>,
}

/// A validated match, positioned but not yet registered in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub category: String,
    pub rule: String,
    pub replacements: Vec<String>,
    pub urls: Vec<String>,
}

impl Finding {
    pub fn region(&self) -> Region {
        Region::new(self.offset, self.offset + self.length)
    }

    /// Reinterprets `offset` and `length`, reported in UTF-16 code units
    /// of `text`, as character offsets. Returns false, leaving the finding
    /// untouched, when the span runs past the end of `text`.
    pub fn rebase_utf16(&mut self, text: &str) -> bool {
        let end_units = self.offset.saturating_add(self.length);
        if end_units > text.encode_utf16().count() {
            return false;
        }
        let start = char_offset_of_utf16(text, self.offset);
        let end = char_offset_of_utf16(text, end_units);
        self.offset = start;
        self.length = end.saturating_sub(start);
        true
    }

    /// Moves the finding from check-text coordinates into document ones.
    pub fn shift_offset(&mut self, delta: isize) {
        self.offset = shift(self.offset, delta);
    }
}

impl TryFrom<&RawMatch> for Finding {
    type Error = ProblemError;

    fn try_from(raw: &RawMatch) -> Result<Self, Self::Error> {
        let offset = non_negative("offset", raw.offset)?;
        let length = non_negative("length", raw.length)?;
        let message = raw
            .message
            .clone()
            .ok_or(ProblemError::MissingField("message"))?;
        let rule = raw.rule.as_ref().ok_or(ProblemError::MissingField("rule"))?;
        let rule_id = rule
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ProblemError::MissingField("rule.id"))?;
        let category = rule
            .category
            .as_ref()
            .and_then(|c| c.name.clone())
            .ok_or(ProblemError::MissingField("rule.category.name"))?;

        Ok(Self {
            offset,
            length,
            message,
            category,
            rule: rule_id,
            replacements: values(&raw.replacements),
            urls: values(&rule.urls),
        })
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<usize, ProblemError> {
    let value = value.ok_or(ProblemError::MissingField(field))?;
    usize::try_from(value).map_err(|_| ProblemError::InvalidField {
        field,
        reason: format!("expected a non-negative integer, got {value}"),
    })
}

fn values(entries: &[ValueEntry]) -> Vec<String> {
    entries.iter().filter_map(|e| e.value.clone()).collect()
}

/// A flagged span tracked in a live document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub offset: usize,
    pub length: usize,
    /// Text under the region when the problem was registered.
    pub original_content: String,
    pub category: String,
    pub rule: String,
    pub message: String,
    pub replacements: Vec<String>,
    pub urls: Vec<String>,
    pub region_key: RegionKey,
}

impl Problem {
    pub fn new(id: ProblemId, finding: Finding, original_content: String) -> Self {
        Self {
            id,
            offset: finding.offset,
            length: finding.length,
            original_content,
            category: finding.category,
            rule: finding.rule,
            message: finding.message,
            replacements: finding.replacements,
            urls: finding.urls,
            region_key: RegionKey::for_problem(id),
        }
    }

    /// Logical region `[offset, offset + length)`.
    pub fn region(&self) -> Region {
        Region::new(self.offset, self.offset + self.length)
    }

    pub fn shift_offset(&mut self, delta: isize) {
        self.offset = shift(self.offset, delta);
    }

    /// Message followed by suggestions and reference links, as surfaced
    /// when the problem is selected.
    pub fn describe(&self) -> String {
        let mut text = self.message.clone();
        if !self.replacements.is_empty() {
            text.push_str("\n\nSuggestion(s): ");
            text.push_str(&self.replacements.join(", "));
        }
        if !self.urls.is_empty() {
            text.push_str("\n\nMore Info: ");
            text.push_str(&self.urls.join("\n"));
        }
        text
    }
}
