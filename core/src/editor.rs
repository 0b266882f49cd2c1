//! The surface a host editor exposes to the engine.
//!
//! The engine never owns document text or highlights; it asks the host
//! through this trait and the host reports edits back as
//! [`crate::TextChange`] records.

use crate::problem::RegionKey;
use crate::region::Region;

/// How a live problem region is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerStyle {
    /// Host scope name used to colour the marker.
    pub scope: String,
    pub squiggly: bool,
}

impl MarkerStyle {
    pub fn squiggly(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            squiggly: true,
        }
    }
}

/// Host operations for a single open document. All offsets are in
/// characters.
pub trait Editor {
    /// Document length.
    fn size(&self) -> usize;

    fn substr(&self, region: Region) -> String;

    /// Primary selection, if the host has one.
    fn selection(&self) -> Option<Region>;

    fn set_selection(&mut self, region: Region);

    /// Replaces `region` with `text`. The host applies the edit (now or
    /// later) and reports the resulting change like any other edit.
    fn replace(&mut self, region: Region, text: &str);

    /// Creates or moves the live region stored under `key`.
    fn add_region(&mut self, key: &RegionKey, region: Region, style: &MarkerStyle);

    /// Current position of the live region under `key`.
    fn get_region(&self, key: &RegionKey) -> Option<Region>;

    fn erase_region(&mut self, key: &RegionKey);

    /// Scope names at `point`, outermost first. Hosts without scopes
    /// report none.
    fn scope_names(&self, _point: usize) -> Vec<String> {
        Vec::new()
    }

    fn show_popup(&mut self, text: &str);

    fn hide_popup(&mut self);

    fn set_status(&mut self, message: &str);

    /// Closes the results panel, if open.
    fn hide_panel(&mut self);

    /// Per-document key-value setting.
    fn setting(&self, key: &str) -> Option<String>;

    fn set_setting(&mut self, key: &str, value: &str);

    fn erase_setting(&mut self, key: &str);
}
