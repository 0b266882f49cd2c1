//! An open LSP document acting as the engine's host editor.
//!
//! Text and live regions are kept locally and follow every
//! `didChange`. Anything that must reach the client (edits, selection
//! moves, messages) is queued as a [`HostEffect`] and sent by the backend
//! once the engine lock is released.

use std::collections::HashMap;

use proofline_core::region::{byte_index, char_len, char_offset_of_utf16, slice};
use proofline_core::{Editor, MarkerStyle, Region, RegionKey, TextChange};
use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent, TextEdit};

use crate::scopes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    Edit(TextEdit),
    Select(Range),
    Popup(String),
    Status(String),
}

#[derive(Debug, Default)]
pub struct LspDocument {
    text: String,
    pub version: i32,
    selection: Option<Region>,
    regions: HashMap<RegionKey, Region>,
    scopes: Vec<(Region, &'static str)>,
    settings: HashMap<String, String>,
    effects: Vec<HostEffect>,
    /// Text as it will read once queued edits are applied by the client.
    projected: Option<String>,
}

impl LspDocument {
    pub fn new(text: String, version: i32) -> Self {
        let scopes = scopes::scan(&text);
        Self {
            text,
            version,
            scopes,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Applies one `didChange` content change. A change without a range
    /// replaces the whole text.
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent) -> TextChange {
        let region = match change.range {
            Some(range) => self.region_of(range),
            None => Region::new(0, self.size()),
        };
        let start = byte_index(&self.text, region.start);
        let end = byte_index(&self.text, region.end);
        self.text.replace_range(start..end, &change.text);

        let edit = TextChange::new(region.start, region.len(), char_len(&change.text));
        for live in self.regions.values_mut() {
            *live = live.map_through(&edit);
        }
        self.selection = self.selection.map(|s| s.map_through(&edit));
        self.scopes = scopes::scan(&self.text);
        edit
    }

    /// Sets the selection the next command acts on without moving the
    /// client's cursor.
    pub fn select_range(&mut self, range: Option<Range>) {
        self.selection = range.map(|r| self.region_of(r));
    }

    pub fn select_at(&mut self, position: Position) {
        self.selection = Some(Region::caret(self.offset_at(position)));
    }

    pub fn take_effects(&mut self) -> Vec<HostEffect> {
        self.projected = None;
        std::mem::take(&mut self.effects)
    }

    pub fn clear_markers(&mut self) {
        self.regions.clear();
    }

    pub fn offset_at(&self, position: Position) -> usize {
        offset_at(&self.text, position)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        position_at(&self.text, offset)
    }

    pub fn region_of(&self, range: Range) -> Region {
        Region::new(self.offset_at(range.start), self.offset_at(range.end))
    }

    pub fn range_of(&self, region: Region) -> Range {
        Range {
            start: self.position_at(region.start),
            end: self.position_at(region.end),
        }
    }
}

/// Character offset of a UTF-16 based LSP position, clamped to the text.
pub fn offset_at(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    let mut rest = text;
    for _ in 0..position.line {
        match rest.find('\n') {
            Some(idx) => {
                line_start += char_len(&rest[..=idx]);
                rest = &rest[idx + 1..];
            }
            None => return char_len(text),
        }
    }
    let line = rest.find('\n').map_or(rest, |idx| &rest[..idx]);
    line_start + char_offset_of_utf16(line, position.character as usize)
}

pub fn position_at(text: &str, offset: usize) -> Position {
    let mut line = 0;
    let mut character = 0;
    for ch in text.chars().take(offset) {
        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += ch.len_utf16() as u32;
        }
    }
    Position { line, character }
}

impl Editor for LspDocument {
    fn size(&self) -> usize {
        char_len(&self.text)
    }

    fn substr(&self, region: Region) -> String {
        slice(&self.text, region).to_string()
    }

    fn selection(&self) -> Option<Region> {
        self.selection
    }

    fn set_selection(&mut self, region: Region) {
        let text = self.projected.as_deref().unwrap_or(&self.text);
        let range = Range {
            start: position_at(text, region.start),
            end: position_at(text, region.end),
        };
        self.selection = Some(region);
        self.effects.push(HostEffect::Select(range));
    }

    // The client applies the edit and echoes it back through didChange,
    // which is when local text and live regions move.
    fn replace(&mut self, region: Region, text: &str) {
        let mut projected = self.projected.take().unwrap_or_else(|| self.text.clone());
        let range = Range {
            start: position_at(&projected, region.start),
            end: position_at(&projected, region.end),
        };
        let start = byte_index(&projected, region.start);
        let end = byte_index(&projected, region.end);
        projected.replace_range(start..end, text);
        self.projected = Some(projected);

        self.effects.push(HostEffect::Edit(TextEdit {
            range,
            new_text: text.to_string(),
        }));
    }

    fn add_region(&mut self, key: &RegionKey, region: Region, _style: &MarkerStyle) {
        self.regions.insert(key.clone(), region);
    }

    fn get_region(&self, key: &RegionKey) -> Option<Region> {
        self.regions.get(key).copied()
    }

    fn erase_region(&mut self, key: &RegionKey) {
        self.regions.remove(key);
    }

    fn scope_names(&self, point: usize) -> Vec<String> {
        self.scopes
            .iter()
            .filter(|(region, _)| region.start <= point && point < region.end)
            .map(|(_, name)| name.to_string())
            .collect()
    }

    fn show_popup(&mut self, text: &str) {
        self.effects.push(HostEffect::Popup(text.to_string()));
    }

    fn hide_popup(&mut self) {}

    fn set_status(&mut self, message: &str) {
        self.effects.push(HostEffect::Status(message.to_string()));
    }

    // LSP clients have no results panel.
    fn hide_panel(&mut self) {}

    fn setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned()
    }

    fn set_setting(&mut self, key: &str, value: &str) {
        self.settings.insert(key.to_string(), value.to_string());
    }

    fn erase_setting(&mut self, key: &str) {
        self.settings.remove(key);
    }
}
