//! Error types for the checker client, problem construction and commands.

use std::path::PathBuf;

use thiserror::Error;

use crate::problem::ProblemId;

/// The remote check could not complete. Distinct from "no problems found".
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("could not reach checker: {0}")]
    Http(#[from] reqwest::Error),

    #[error("checker answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not parse server response: {0}")]
    Decode(String),

    #[error("server match #{index} is malformed: {source}")]
    InvalidMatch {
        index: usize,
        #[source]
        source: ProblemError,
    },
}

/// A raw match that cannot become a [`crate::Problem`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProblemError {
    #[error("match is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("match field `{field}` has invalid value: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A command invoked without the context it needs. Never fatal; reported
/// as a status message and left for the user to re-issue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("no language problem selected")]
    NoProblemSelected,

    #[error("problem {0} has no replacements")]
    NoReplacements(ProblemId),

    #[error("replacement {index} out of range for problem {problem} ({available} available)")]
    ReplacementOutOfRange {
        problem: ProblemId,
        index: usize,
        available: usize,
    },

    #[error("no active problem with id {0}")]
    UnknownProblem(ProblemId),

    #[error("there are multiple selected problems; select only one to deactivate")]
    MultipleProblemsSelected,

    #[error("rule `{0}` is not deactivated")]
    UnknownRule(String),

    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid ignored scope pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
