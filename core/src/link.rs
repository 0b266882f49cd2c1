//! Popup links: the actions a hover card offers, encoded as strings.
//!
//! Grammar: `[view:<window>/<view>,](replace:<problem>/<index> | showall:<problem>)`.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::problem::ProblemId;

static VIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^view:(\d+)/(\d+),(.*)$").expect("valid view link regex"));
static REPLACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^replace:(\d+)/(\d+)$").expect("valid replace link regex"));
static SHOW_ALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^showall:(\d+)$").expect("valid showall link regex"));

/// Host view a link is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTarget {
    pub window: u64,
    pub view: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Substitute replacement `index` of `problem`.
    Replace { problem: ProblemId, index: usize },
    /// Re-render the card with every replacement listed.
    ShowAll { problem: ProblemId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupLink {
    pub target: Option<ViewTarget>,
    pub action: LinkAction,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("invalid view path in link `{0}`")]
    InvalidView(String),

    #[error("invalid link `{0}`")]
    Unrecognized(String),

    #[error("number out of range in link `{0}`")]
    Overflow(String),
}

impl PopupLink {
    pub fn replace(problem: ProblemId, index: usize) -> Self {
        Self {
            target: None,
            action: LinkAction::Replace { problem, index },
        }
    }

    pub fn show_all(problem: ProblemId) -> Self {
        Self {
            target: None,
            action: LinkAction::ShowAll { problem },
        }
    }

    pub fn problem(&self) -> ProblemId {
        match self.action {
            LinkAction::Replace { problem, .. } | LinkAction::ShowAll { problem } => problem,
        }
    }
}

impl FromStr for PopupLink {
    type Err = LinkError;

    fn from_str(link: &str) -> Result<Self, Self::Err> {
        let link = link.trim();
        let (target, rest) = if link.starts_with("view:") {
            let caps = VIEW_RE
                .captures(link)
                .ok_or_else(|| LinkError::InvalidView(link.to_string()))?;
            let target = ViewTarget {
                window: number(link, &caps[1])?,
                view: number(link, &caps[2])?,
            };
            (Some(target), caps.get(3).map_or("", |m| m.as_str()))
        } else {
            (None, link)
        };

        let action = if let Some(caps) = REPLACE_RE.captures(rest) {
            LinkAction::Replace {
                problem: ProblemId(number(link, &caps[1])?),
                index: number(link, &caps[2])?,
            }
        } else if let Some(caps) = SHOW_ALL_RE.captures(rest) {
            LinkAction::ShowAll {
                problem: ProblemId(number(link, &caps[1])?),
            }
        } else {
            return Err(LinkError::Unrecognized(link.to_string()));
        };

        Ok(Self { target, action })
    }
}

fn number<T: FromStr>(link: &str, digits: &str) -> Result<T, LinkError> {
    digits
        .parse()
        .map_err(|_| LinkError::Overflow(link.to_string()))
}

impl fmt::Display for PopupLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(target) = self.target {
            write!(f, "view:{}/{},", target.window, target.view)?;
        }
        match self.action {
            LinkAction::Replace { problem, index } => write!(f, "replace:{problem}/{index}"),
            LinkAction::ShowAll { problem } => write!(f, "showall:{problem}"),
        }
    }
}
