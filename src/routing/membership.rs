//! Membership sets: the files one build unit's rule set applies to.
//!
//! # Responsibilities
//! - Expand target/exclude globs under a build unit directory
//! - Answer "does this absolute path belong to the set"
//!
//! # Design Decisions
//! - Globs are matched against paths relative to the unit directory
//! - `*` never crosses a directory separator; `**/` does
//! - The set is materialized once at startup and never refreshed

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::routing::RoutingError;

/// Directories never descended into while collecting members.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

/// A set of absolute, normalized file paths.
#[derive(Debug, Clone, Default)]
pub struct MembershipSet {
    files: HashSet<PathBuf>,
}

impl MembershipSet {
    /// Build a set from explicit paths. Paths are normalized lexically.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            files: paths
                .into_iter()
                .map(|p| normalize_lexically(p.as_ref()))
                .collect(),
        }
    }

    /// Walk `unit_dir` and collect every file matching `target` but not
    /// `exclude`.
    pub fn collect(
        unit_dir: &Path,
        target: &[String],
        exclude: &[String],
    ) -> Result<Self, RoutingError> {
        let include = build_globset(target)?;
        let exclude = build_globset(exclude)?;

        let mut files = HashSet::new();
        let walker = WalkDir::new(unit_dir).follow_links(false).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(unit_dir = %unit_dir.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(unit_dir) else {
                continue;
            };
            if include.is_match(relative) && !exclude.is_match(relative) {
                files.insert(normalize_lexically(entry.path()));
            }
        }

        tracing::debug!(
            unit_dir = %unit_dir.display(),
            files = files.len(),
            "Collected membership set"
        );
        Ok(Self { files })
    }

    /// Returns true if the normalized `path` is a member.
    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RoutingError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    builder.build().map_err(|e| RoutingError::Glob {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

fn compile_glob(pattern: &str) -> Result<Glob, RoutingError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| RoutingError::Glob {
            pattern: pattern.to_string(),
            reason: e.kind().to_string(),
        })
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
