//! Proofline core: tracks grammar problems reported by a remote checker
//! against live, continuously edited documents.
//!
//! The engine keeps one problem set per document, rebases it as the host
//! reports edits, drops problems whose text was changed away, and drives
//! navigation, fixing and ignoring. The host editor is reached only
//! through the [`Editor`] trait.

pub mod client;
pub mod commands;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod ignore;
pub mod languages;
pub mod link;
pub mod memory;
pub mod problem;
pub mod region;
pub mod registry;
pub mod tracker;

pub use client::{parse_response, CheckClient};
pub use commands::{
    activate_rule, change_language, set_language, FixOutcome, HoverCard, IgnoreOutcome,
    LinkOutcome, Navigation, NO_FURTHER_PROBLEMS,
};
pub use config::{ScopeFilter, Settings, LANGUAGE_SETTING};
pub use editor::{Editor, MarkerStyle};
pub use engine::{CheckPlan, DocumentState, Engine};
pub use error::{CheckError, CommandError, ConfigError, ProblemError};
pub use ignore::{equality_class, IgnoredRule, IgnoredRules};
pub use link::{LinkAction, LinkError, PopupLink, ViewTarget};
pub use memory::MemoryEditor;
pub use problem::{Finding, Problem, ProblemId, RawMatch, RegionKey};
pub use region::{Region, TextChange};
pub use registry::ProblemRegistry;
