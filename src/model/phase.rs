//! Phase enumeration and the command enumeration that drives the PSM.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PSM phase. Initial: `Design`. Terminal: `Commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Design,
    TestRed,
    CodeGreen,
    Refactor,
    Commit,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Commit)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Design => "design",
            Phase::TestRed => "test_red",
            Phase::CodeGreen => "code_green",
            Phase::Refactor => "refactor",
            Phase::Commit => "commit",
        };
        write!(f, "{s}")
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Design
    }
}

/// Closed command enumeration. Replaces the source's string-keyed dispatch
/// (spec.md §9 "Dynamic command dispatch").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Design,
    Test,
    Code,
    Refactor,
    Commit,
    CommitTests,
    CommitCode,
    CommitRefactor,
    Next,
    Start,
    Status,
    Abort,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Design => "design",
            Command::Test => "test",
            Command::Code => "code",
            Command::Refactor => "refactor",
            Command::Commit => "commit",
            Command::CommitTests => "commit-tests",
            Command::CommitCode => "commit-code",
            Command::CommitRefactor => "commit-refactor",
            Command::Next => "next",
            Command::Start => "start",
            Command::Status => "status",
            Command::Abort => "abort",
        };
        write!(f, "{s}")
    }
}
