//! Append-only file modification log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CycleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationKind {
    Create,
    Modify,
    Delete,
    Rename,
}

/// An inclusive line range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn overlaps(&self, other: &LineRange) -> bool {
        !(self.end < other.start || other.end < self.start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModification {
    pub file_path: String,
    pub cycle_id: CycleId,
    pub story_id: String,
    pub kind: ModificationKind,
    pub content_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub line_ranges: Vec<LineRange>,
    pub functions_touched: Vec<String>,
    pub classes_touched: Vec<String>,
    pub imports_touched: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_ranges_overlap_correctly() {
        let a = LineRange { start: 10, end: 20 };
        let b = LineRange { start: 20, end: 30 };
        let c = LineRange { start: 21, end: 30 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
