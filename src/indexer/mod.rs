// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Working-directory file index
//!
//! Bounded discovery of likely-text files, used to resolve `@path`
//! references in prompts and to drive tab completion. Discovery prefers
//! `git ls-files` (which honors .gitignore transitively) and falls back to a
//! depth-limited directory walk. The index is built once per session and
//! read-only afterwards.

pub mod expand;
pub mod ignore;

pub use expand::{expand_references, ExpandedPrompt, FileReference};
pub use ignore::IgnoreRules;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Maximum size of an indexed file.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Maximum number of indexed files.
pub const MAX_FILES: usize = 5000;
/// Maximum walk depth in fallback mode.
pub const MAX_DEPTH: usize = 4;
/// Total indexing deadline.
pub const INDEX_DEADLINE: Duration = Duration::from_secs(10);
/// Ceiling for the `git ls-files` child process.
const GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the per-project ignore file.
pub const IGNORE_FILE: &str = ".caretforgeignore";

/// Extensions considered likely-text.
const TEXT_EXTENSIONS: &[&str] = &[
    "rs", "toml", "md", "txt", "json", "jsonc", "json5", "yaml", "yml", "xml", "html", "htm",
    "css", "scss", "sass", "less", "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "py",
    "pyi", "rb", "go", "java", "kt", "kts", "scala", "c", "h", "cpp", "cc", "cxx", "hpp", "hh",
    "cs", "fs", "fsx", "swift", "m", "mm", "php", "pl", "pm", "lua", "r", "jl", "ex", "exs",
    "erl", "hrl", "hs", "elm", "clj", "cljs", "edn", "ml", "mli", "nim", "zig", "d", "dart",
    "groovy", "gradle", "sql", "graphql", "gql", "proto", "thrift", "avsc", "sh", "bash", "zsh",
    "fish", "ps1", "psm1", "bat", "cmd", "awk", "sed", "ini", "cfg", "conf", "config",
    "properties", "env", "envrc", "editorconfig", "gitignore", "gitattributes", "dockerignore",
    "tf", "tfvars", "hcl", "nix", "bzl", "bazel", "cmake", "mk", "make", "am", "in", "m4", "asm",
    "s", "vim", "el", "lisp", "scm", "rkt", "tex", "bib", "rst", "adoc", "org", "csv", "tsv",
    "svg", "lock", "log", "diff", "patch", "pem", "crt", "tpl", "tmpl", "j2", "hbs", "mustache",
    "ejs", "erb", "haml", "slim", "pug", "njk", "liquid", "feature", "robot",
];

/// Basenames considered text regardless of extension.
const TEXT_FILENAMES: &[&str] = &[
    "Makefile",
    "makefile",
    "GNUmakefile",
    "Dockerfile",
    "Containerfile",
    "Vagrantfile",
    "Jenkinsfile",
    "Rakefile",
    "Gemfile",
    "Procfile",
    "Brewfile",
    "Justfile",
    "justfile",
    "LICENSE",
    "LICENCE",
    "COPYING",
    "NOTICE",
    "README",
    "CHANGELOG",
    "AUTHORS",
    "CONTRIBUTORS",
    "CODEOWNERS",
    "TODO",
    "VERSION",
    "Cargo.lock",
    "go.mod",
    "go.sum",
    "CMakeLists.txt",
];

/// Directories skipped in walk mode.
const SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "dist",
    "build",
    "out",
    "target",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".idea",
    ".vscode",
    "vendor",
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
];

/// How the index was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// `git ls-files` listing
    Git,
    /// Directory walk
    Walk,
}

/// Counters reported alongside the index
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub skipped_binary: usize,
    pub skipped_large: usize,
    pub skipped_ignored: usize,
    pub timed_out: bool,
}

/// A working-directory-relative file plus its byte size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// The built index
#[derive(Debug)]
pub struct FileIndex {
    root: PathBuf,
    files: Vec<IndexedFile>,
    stats: IndexStats,
    method: DiscoveryMethod,
}

impl FileIndex {
    /// Build the index for a root directory.
    pub async fn build(root: &Path) -> Self {
        let deadline = Instant::now() + INDEX_DEADLINE;

        match git_ls_files(root).await {
            Some(listing) => {
                tracing::debug!("indexing via git ls-files ({} candidates)", listing.len());
                Self::from_candidates(root, listing, DiscoveryMethod::Git, deadline)
            }
            None => {
                tracing::debug!("git unavailable, walking {}", root.display());
                Self::walk(root, deadline)
            }
        }
    }

    /// Build from an explicit candidate list (git mode).
    fn from_candidates(
        root: &Path,
        candidates: Vec<PathBuf>,
        method: DiscoveryMethod,
        deadline: Instant,
    ) -> Self {
        let ignore = IgnoreRules::load(&root.join(IGNORE_FILE));
        let mut files = Vec::new();
        let mut stats = IndexStats::default();

        for relative in candidates {
            if Instant::now() > deadline {
                stats.timed_out = true;
                break;
            }
            if files.len() >= MAX_FILES {
                break;
            }
            let absolute = root.join(&relative);
            let Ok(metadata) = absolute.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            if let Some(file) = filter_candidate(&relative, metadata.len(), &ignore, &mut stats) {
                files.push(file);
            }
        }

        Self {
            root: root.to_path_buf(),
            files,
            stats,
            method,
        }
    }

    /// Depth-first walk fallback.
    fn walk(root: &Path, deadline: Instant) -> Self {
        let ignore = IgnoreRules::load(&root.join(IGNORE_FILE));
        let mut files = Vec::new();
        let mut stats = IndexStats::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root)
            .max_depth(MAX_DEPTH)
            .follow_links(true)
            .into_iter()
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.file_type().is_dir() {
                    let name = entry.file_name().to_string_lossy();
                    if name.starts_with('.') || SKIP_DIRECTORIES.contains(&name.as_ref()) {
                        return false;
                    }
                    // Visit each resolved directory once so aliased symlinks
                    // cannot loop.
                    if let Ok(real) = entry.path().canonicalize() {
                        if !visited.insert(real) {
                            return false;
                        }
                    }
                }
                true
            });

        for entry in walker {
            if Instant::now() > deadline {
                stats.timed_out = true;
                break;
            }
            if files.len() >= MAX_FILES {
                break;
            }
            // Symlink loops also surface as errors from the walker; skip.
            let Ok(entry) = entry else {
                continue;
            };
            if entry.file_type().is_dir() {
                continue;
            }
            // Only regular files: FIFOs, sockets and devices fail this test.
            let Ok(metadata) = entry.path().metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if let Some(file) =
                filter_candidate(&relative.to_path_buf(), metadata.len(), &ignore, &mut stats)
            {
                files.push(file);
            }
        }

        Self {
            root: root.to_path_buf(),
            files,
            stats,
            method: DiscoveryMethod::Walk,
        }
    }

    /// An empty index (used when no session root is available).
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: Vec::new(),
            stats: IndexStats::default(),
            method: DiscoveryMethod::Walk,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[IndexedFile] {
        &self.files
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    pub fn method(&self) -> DiscoveryMethod {
        self.method
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up an indexed file by exact relative path.
    pub fn get(&self, path: &str) -> Option<&IndexedFile> {
        self.files.iter().find(|f| f.path == Path::new(path))
    }

    /// Tab completion: when the line ends in `@prefix`, every indexed path
    /// starting with the prefix, re-prefixed with `@`.
    pub fn complete(&self, line: &str) -> Vec<String> {
        let Some(at) = line.rfind('@') else {
            return Vec::new();
        };
        let prefix = &line[at + 1..];
        if prefix.contains(char::is_whitespace) {
            return Vec::new();
        }
        self.files
            .iter()
            .filter(|f| f.path.to_string_lossy().starts_with(prefix))
            .map(|f| format!("@{}", f.path.to_string_lossy()))
            .collect()
    }
}

/// Apply the size, text-likeness and ignore filters to one candidate.
fn filter_candidate(
    relative: &PathBuf,
    size: u64,
    ignore: &IgnoreRules,
    stats: &mut IndexStats,
) -> Option<IndexedFile> {
    if size > MAX_FILE_SIZE {
        stats.skipped_large += 1;
        return None;
    }
    if !is_text_path(relative) {
        stats.skipped_binary += 1;
        return None;
    }
    if ignore.matches(relative) {
        stats.skipped_ignored += 1;
        return None;
    }
    Some(IndexedFile {
        path: relative.clone(),
        size,
    })
}

/// Whether a path looks like a text file by extension or basename.
pub fn is_text_path(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return true;
        }
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if TEXT_FILENAMES.contains(&name) {
            return true;
        }
        // Dotfiles like .gitignore carry their "extension" in the name.
        if let Some(stripped) = name.strip_prefix('.') {
            if TEXT_EXTENSIONS.contains(&stripped.to_lowercase().as_str()) {
                return true;
            }
        }
    }
    false
}

/// Run `git ls-files --cached --others --exclude-standard`, honoring the
/// child-process ceiling. None on any failure or non-git root.
async fn git_ls_files(root: &Path) -> Option<Vec<PathBuf>> {
    let output = tokio::time::timeout(
        GIT_TIMEOUT,
        tokio::process::Command::new("git")
            .args(["ls-files", "--cached", "--others", "--exclude-standard"])
            .current_dir(root)
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }

    let listing = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    Some(listing)
}
