//! In-memory [`Editor`] host used by the command-line shell and tests.

use std::collections::HashMap;

use crate::editor::{Editor, MarkerStyle};
use crate::problem::RegionKey;
use crate::region::{byte_index, char_len, slice, Region, TextChange};

/// A single document held in memory, with live regions that follow edits.
#[derive(Debug, Default)]
pub struct MemoryEditor {
    text: String,
    selection: Option<Region>,
    regions: HashMap<RegionKey, (Region, MarkerStyle)>,
    scopes: Vec<(Region, String)>,
    settings: HashMap<String, String>,
    popup: Option<String>,
    panel_visible: bool,
    statuses: Vec<String>,
    pending: Vec<TextChange>,
}

impl MemoryEditor {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Edits the buffer as a user would, recording the change.
    pub fn edit(&mut self, region: Region, text: &str) {
        let region = Region::new(region.start.min(self.size()), region.end.min(self.size()));
        let start = byte_index(&self.text, region.start);
        let end = byte_index(&self.text, region.end);
        self.text.replace_range(start..end, text);

        let change = TextChange::new(region.start, region.len(), char_len(text));
        for (live, _) in self.regions.values_mut() {
            *live = live.map_through(&change);
        }
        if let Some(selection) = self.selection.as_mut() {
            *selection = selection.map_through(&change);
        }
        self.pending.push(change);
    }

    pub fn insert(&mut self, point: usize, text: &str) {
        self.edit(Region::caret(point), text);
    }

    /// Changes made since the last call, oldest first.
    pub fn take_changes(&mut self) -> Vec<TextChange> {
        std::mem::take(&mut self.pending)
    }

    /// Tags `region` with a scope name reported by [`Editor::scope_names`].
    pub fn add_scope(&mut self, region: Region, name: impl Into<String>) {
        self.scopes.push((region, name.into()));
    }

    pub fn popup(&self) -> Option<&str> {
        self.popup.as_deref()
    }

    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }

    pub fn show_panel(&mut self) {
        self.panel_visible = true;
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    pub fn marker_count(&self) -> usize {
        self.regions.len()
    }
}

impl Editor for MemoryEditor {
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
        let size = self.size();
        self.selection = Some(Region::new(region.start.min(size), region.end.min(size)));
    }

    fn replace(&mut self, region: Region, text: &str) {
        self.edit(region, text);
    }

    fn add_region(&mut self, key: &RegionKey, region: Region, style: &MarkerStyle) {
        self.regions.insert(key.clone(), (region, style.clone()));
    }

    fn get_region(&self, key: &RegionKey) -> Option<Region> {
        self.regions.get(key).map(|(region, _)| *region)
    }

    fn erase_region(&mut self, key: &RegionKey) {
        self.regions.remove(key);
    }

    fn scope_names(&self, point: usize) -> Vec<String> {
        self.scopes
            .iter()
            .filter(|(region, _)| region.start <= point && point < region.end)
            .map(|(_, name)| name.clone())
            .collect()
    }

    fn show_popup(&mut self, text: &str) {
        self.popup = Some(text.to_string());
    }

    fn hide_popup(&mut self) {
        self.popup = None;
    }

    fn set_status(&mut self, message: &str) {
        self.statuses.push(message.to_string());
    }

    fn hide_panel(&mut self) {
        self.panel_visible = false;
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_regions_follow_edits() {
        let mut editor = MemoryEditor::new("Teh cat sat.");
        let key = RegionKey::for_problem(crate::ProblemId(0));
        editor.add_region(&key, Region::new(4, 7), &MarkerStyle::squiggly("text"));

        editor.insert(0, "Oh, ");
        assert_eq!(editor.text(), "Oh, Teh cat sat.");
        assert_eq!(editor.get_region(&key), Some(Region::new(8, 11)));
        assert_eq!(editor.substr(Region::new(8, 11)), "cat");
        assert_eq!(editor.take_changes(), vec![TextChange::insert(0, 4)]);
        assert!(editor.take_changes().is_empty());
    }

    #[test]
    fn edits_are_clamped_to_the_buffer() {
        let mut editor = MemoryEditor::new("abc");
        editor.edit(Region::new(2, 99), "Z");
        assert_eq!(editor.text(), "abZ");
        assert_eq!(editor.take_changes(), vec![TextChange::new(2, 1, 1)]);
    }
}
