//! File-modification conflict detection (spec.md §4.3): severity
//! assignment and the pairwise overlap rules over line ranges, touched
//! functions/classes, and touched imports.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::{FileModification, Severity};

/// `HIGH` if the path contains `__init__`, `main`, or `setup`; `MEDIUM` if
/// it's a `.py` file or the path has been modified more than 5 times;
/// `LOW` otherwise (spec.md §4.3).
pub fn assign_severity(path: &str, modification_count_for_path: usize) -> Severity {
    if path.contains("__init__") || path.contains("main") || path.contains("setup") {
        Severity::High
    } else if path.ends_with(".py") || modification_count_for_path > 5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Cheap, non-cryptographic content hash — the spec only requires change
/// detection, not tamper-evidence.
pub fn content_hash(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Prefix-scan semantic analysis for Python-like sources (spec.md §4.3):
/// `def`, `class`, `import`, `from` lines, matching the original's simple
/// scan rather than an AST parse.
pub fn semantic_scan(content: &str) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut imports = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("def ") {
            if let Some(name) = rest.split(['(', ':']).next() {
                functions.push(name.trim().to_string());
            }
        } else if let Some(rest) = trimmed.strip_prefix("class ") {
            if let Some(name) = rest.split(['(', ':']).next() {
                classes.push(name.trim().to_string());
            }
        } else if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
            imports.push(trimmed.to_string());
        }
    }

    (functions, classes, imports)
}

pub fn is_python_like(path: &str) -> bool {
    path.ends_with(".py")
}

/// Whether two modifications of the same file conflict, per spec.md §4.3:
/// overlapping line ranges, or shared touched functions/classes, or shared
/// touched import lines.
pub fn modifications_conflict(a: &FileModification, b: &FileModification) -> bool {
    let lines_overlap = a
        .line_ranges
        .iter()
        .any(|ra| b.line_ranges.iter().any(|rb| ra.overlaps(rb)));
    let functions_overlap = a.functions_touched.iter().any(|f| b.functions_touched.contains(f));
    let classes_overlap = a.classes_touched.iter().any(|c| b.classes_touched.contains(c));
    let imports_overlap = a.imports_touched.iter().any(|i| b.imports_touched.contains(i));
    lines_overlap || functions_overlap || classes_overlap || imports_overlap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_high_for_init_files() {
        assert_eq!(assign_severity("pkg/__init__.py", 1), Severity::High);
    }

    #[test]
    fn severity_medium_for_python_files() {
        assert_eq!(assign_severity("src/util.py", 1), Severity::Medium);
    }

    #[test]
    fn severity_medium_for_heavily_modified_paths() {
        assert_eq!(assign_severity("src/util.rs", 6), Severity::Medium);
    }

    #[test]
    fn severity_low_otherwise() {
        assert_eq!(assign_severity("src/util.rs", 1), Severity::Low);
    }

    #[test]
    fn semantic_scan_extracts_defs_and_imports() {
        let src = "import os\nfrom foo import bar\nclass Widget:\n    def run(self):\n        pass\n";
        let (functions, classes, imports) = semantic_scan(src);
        assert_eq!(functions, vec!["run".to_string()]);
        assert_eq!(classes, vec!["Widget".to_string()]);
        assert_eq!(imports, vec!["import os".to_string(), "from foo import bar".to_string()]);
    }
}
