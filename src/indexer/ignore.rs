// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Custom ignore rules
//!
//! Gitignore-style rules read once from `.caretforgeignore` at the index
//! root: exact relative paths, `dir/` directory prefixes, `*.ext` suffixes
//! and plain basename matches.

use std::path::Path;

/// One parsed rule
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    /// Exact relative path
    Exact(String),
    /// Directory prefix (rule ended with `/`)
    Directory(String),
    /// Extension suffix (rule shaped `*.ext`)
    Suffix(String),
    /// Basename anywhere in the tree
    Basename(String),
}

/// The rule set for one root
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Load rules from an ignore file; missing file means no rules.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse ignore file content.
    pub fn parse(content: &str) -> Self {
        let rules = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                if let Some(dir) = line.strip_suffix('/') {
                    Rule::Directory(dir.to_string())
                } else if let Some(ext) = line.strip_prefix("*.") {
                    Rule::Suffix(ext.to_string())
                } else if line.contains('/') {
                    Rule::Exact(line.to_string())
                } else {
                    Rule::Basename(line.to_string())
                }
            })
            .collect();
        Self { rules }
    }

    /// Whether a relative path is ignored.
    pub fn matches(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        self.rules.iter().any(|rule| match rule {
            Rule::Exact(exact) => path_str == *exact,
            Rule::Directory(dir) => {
                path_str.starts_with(&format!("{}/", dir))
                    || path_str.contains(&format!("/{}/", dir))
            }
            Rule::Suffix(ext) => path_str.ends_with(&format!(".{}", ext)),
            Rule::Basename(name) => basename == *name,
        })
    }

    /// Number of parsed rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rule set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rules(content: &str) -> IgnoreRules {
        IgnoreRules::parse(content)
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let r = rules("# comment\n\n*.log\n  \n");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_suffix_rule() {
        let r = rules("*.log");
        assert!(r.matches(&PathBuf::from("debug.log")));
        assert!(r.matches(&PathBuf::from("deep/nested/trace.log")));
        assert!(!r.matches(&PathBuf::from("log.txt")));
    }

    #[test]
    fn test_directory_rule() {
        let r = rules("generated/");
        assert!(r.matches(&PathBuf::from("generated/out.rs")));
        assert!(r.matches(&PathBuf::from("src/generated/out.rs")));
        assert!(!r.matches(&PathBuf::from("generated.rs")));
    }

    #[test]
    fn test_exact_rule() {
        let r = rules("src/secrets.rs");
        assert!(r.matches(&PathBuf::from("src/secrets.rs")));
        assert!(!r.matches(&PathBuf::from("other/src/secrets.rs")));
    }

    #[test]
    fn test_basename_rule() {
        let r = rules("TODO.md");
        assert!(r.matches(&PathBuf::from("TODO.md")));
        assert!(r.matches(&PathBuf::from("docs/TODO.md")));
        assert!(!r.matches(&PathBuf::from("TODO.txt")));
    }

    #[test]
    fn test_load_missing_file() {
        let r = IgnoreRules::load(&PathBuf::from("/no/such/ignore/file"));
        assert!(r.is_empty());
        assert!(!r.matches(&PathBuf::from("anything")));
    }

    #[test]
    fn test_combined_rules() {
        let r = rules("*.tmp\ncache/\nnotes.txt\nsrc/gen.rs\n");
        assert!(r.matches(&PathBuf::from("a.tmp")));
        assert!(r.matches(&PathBuf::from("cache/x")));
        assert!(r.matches(&PathBuf::from("sub/notes.txt")));
        assert!(r.matches(&PathBuf::from("src/gen.rs")));
        assert!(!r.matches(&PathBuf::from("src/main.rs")));
    }
}
