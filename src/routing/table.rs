//! Path → rule set lookup.
//!
//! # Responsibilities
//! - Store routing entries in override order
//! - Resolve a request path to the rule set that covers it
//! - Return the rule set or an explicit not-covered
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Entries from deeper build units are tested first, so a child unit
//!   overrides its ancestors for files both claim
//! - Path interpretations are tried in order: project-relative, absolute,
//!   real path (symlinks resolved)

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::RuleSetConfig;
use crate::routing::membership::{normalize_lexically, MembershipSet};
use crate::routing::RoutingError;
use crate::rules::{RuleSet, RuleSetId};

/// A membership set paired with the rule set that formats its files.
#[derive(Debug, Clone)]
pub struct RoutingEntry {
    pub membership: MembershipSet,
    pub rule_set: Arc<RuleSet>,
}

impl RoutingEntry {
    pub fn new(membership: MembershipSet, rule_set: RuleSet) -> Self {
        Self {
            membership,
            rule_set: Arc::new(rule_set),
        }
    }
}

/// Immutable routing table.
#[derive(Debug)]
pub struct RoutingTable {
    project_root: PathBuf,
    /// Entries in override order (most specific build unit first).
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    /// Create a table from entries, ordering them child-before-ancestor.
    ///
    /// Entries of equally deep build units keep their given order.
    pub fn new(project_root: impl Into<PathBuf>, mut entries: Vec<RoutingEntry>) -> Result<Self, RoutingError> {
        let mut ids = HashSet::new();
        for entry in &entries {
            if !ids.insert(entry.rule_set.id()) {
                return Err(RoutingError::DuplicateRuleSetId(entry.rule_set.id()));
            }
        }

        entries.sort_by_key(|entry| std::cmp::Reverse(entry.rule_set.unit_dir().components().count()));

        Ok(Self {
            project_root: normalize_lexically(&project_root.into()),
            entries,
        })
    }

    /// Build a table from configuration, walking each build unit directory.
    pub fn build(project_root: &Path, configs: &[RuleSetConfig]) -> Result<Self, RoutingError> {
        let root = project_root
            .canonicalize()
            .map_err(|source| RoutingError::ProjectRoot {
                path: project_root.to_path_buf(),
                source,
            })?;

        let mut entries = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let lexical = normalize_lexically(&root.join(&config.dir));
            let unit_dir = lexical.canonicalize().unwrap_or(lexical);

            let rule_set = RuleSet::from_config(RuleSetId::new(index), config, unit_dir.clone())
                .map_err(|e| RoutingError::RuleSet {
                    name: config.name.clone(),
                    reason: e.to_string(),
                })?;
            let membership = MembershipSet::collect(&unit_dir, &config.target, &config.exclude)?;

            tracing::info!(
                rule_set = %config.name,
                unit_dir = %unit_dir.display(),
                files = membership.len(),
                "Registered rule set"
            );
            entries.push(RoutingEntry::new(membership, rule_set));
        }

        Self::new(root, entries)
    }

    /// Resolve a request path to its rule set.
    ///
    /// Never fails: paths that do not exist or cannot be canonicalized are
    /// simply not covered.
    pub fn resolve(&self, path: &str) -> Option<&Arc<RuleSet>> {
        for candidate in self.candidates(path) {
            for entry in &self.entries {
                if entry.membership.contains(&candidate) {
                    tracing::debug!(
                        path = %candidate.display(),
                        rule_set = %entry.rule_set.name(),
                        "Resolved rule set"
                    );
                    return Some(&entry.rule_set);
                }
            }
        }
        tracing::debug!(path = %path, "No rule set covers path");
        None
    }

    fn candidates(&self, path: &str) -> Vec<PathBuf> {
        let requested = Path::new(path);
        let relative = normalize_lexically(&self.project_root.join(requested));
        let mut candidates = vec![relative.clone()];

        if let Ok(absolute) = std::path::absolute(requested) {
            let absolute = normalize_lexically(&absolute);
            if !candidates.contains(&absolute) {
                candidates.push(absolute);
            }
        }

        match relative.canonicalize() {
            Ok(real) => {
                if !candidates.contains(&real) {
                    candidates.push(real);
                }
            }
            Err(e) => {
                tracing::debug!(path = %relative.display(), error = %e, "Real path resolution skipped");
            }
        }
        candidates
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StepConfig;
    use proptest::prelude::*;
    use std::fs;

    fn rule_set_config(name: &str, dir: &str, target: &str) -> RuleSetConfig {
        RuleSetConfig {
            name: name.to_string(),
            dir: dir.into(),
            target: vec![target.to_string()],
            exclude: Vec::new(),
            encoding: "UTF-8".to_string(),
            line_endings: Default::default(),
            steps: vec![StepConfig::TrimTrailingWhitespace],
        }
    }

    fn entry(id: usize, unit_dir: &str, files: &[&str]) -> RoutingEntry {
        let config = rule_set_config(&format!("rs{id}"), unit_dir, "**/*");
        let rule_set = RuleSet::from_config(RuleSetId::new(id), &config, PathBuf::from(unit_dir)).unwrap();
        RoutingEntry::new(MembershipSet::from_paths(files), rule_set)
    }

    #[test]
    fn child_overrides_ancestor_regardless_of_registration_order() {
        let table = RoutingTable::new(
            "/p",
            vec![
                entry(0, "/p", &["/p/root.txt", "/p/child/shared.txt"]),
                entry(1, "/p/child", &["/p/child/shared.txt"]),
            ],
        )
        .unwrap();

        assert_eq!(table.resolve("child/shared.txt").unwrap().id(), RuleSetId::new(1));
        assert_eq!(table.resolve("root.txt").unwrap().id(), RuleSetId::new(0));
        assert_eq!(table.resolve("/p/root.txt").unwrap().id(), RuleSetId::new(0));
        assert!(table.resolve("other.txt").is_none());
    }

    #[test]
    fn same_depth_keeps_declaration_order() {
        let table = RoutingTable::new(
            "/p",
            vec![entry(0, "/p", &["/p/a.txt"]), entry(1, "/p", &["/p/a.txt"])],
        )
        .unwrap();
        assert_eq!(table.resolve("a.txt").unwrap().id(), RuleSetId::new(0));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = RoutingTable::new("/p", vec![entry(0, "/p", &[]), entry(0, "/p/x", &[])]).unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateRuleSetId(_)));
    }

    #[test]
    fn build_from_config_and_resolve_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("child")).unwrap();
        fs::write(root.join("root.txt"), "r").unwrap();
        fs::write(root.join("child/child.txt"), "c").unwrap();

        let table = RoutingTable::build(
            &root,
            &[
                rule_set_config("rootTxt", ".", "**/*.txt"),
                rule_set_config("childTxt", "child", "*.txt"),
            ],
        )
        .unwrap();

        assert_eq!(table.resolve("child/child.txt").unwrap().name(), "childTxt");
        assert_eq!(table.resolve("root.txt").unwrap().name(), "rootTxt");
        assert_eq!(table.resolve("./child/../root.txt").unwrap().name(), "rootTxt");
        assert!(table.resolve("missing.txt").is_none());

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(root.join("root.txt"), root.join("link.md")).unwrap();
            assert_eq!(table.resolve("link.md").unwrap().name(), "rootTxt");
        }
    }

    #[test]
    fn missing_project_root_is_error() {
        let err = RoutingTable::build(Path::new("/definitely/not/here"), &[]).unwrap_err();
        assert!(matches!(err, RoutingError::ProjectRoot { .. }));
    }

    proptest! {
        #[test]
        fn child_wins_when_both_claim(
            child_files in proptest::collection::hash_set("[a-d]", 0..4),
            root_files in proptest::collection::hash_set("[a-d]", 0..4),
            probe in "[a-d]",
        ) {
            let child_paths: Vec<String> = child_files.iter().map(|f| format!("/p/child/{f}.txt")).collect();
            let mut root_paths: Vec<String> = root_files.iter().map(|f| format!("/p/child/{f}.txt")).collect();
            root_paths.push("/p/top.txt".to_string());

            let child_refs: Vec<&str> = child_paths.iter().map(String::as_str).collect();
            let root_refs: Vec<&str> = root_paths.iter().map(String::as_str).collect();
            let table = RoutingTable::new(
                "/p",
                vec![entry(0, "/p", &root_refs), entry(1, "/p/child", &child_refs)],
            ).unwrap();

            let resolved = table.resolve(&format!("child/{probe}.txt")).map(|rs| rs.id());
            let expected = if child_files.contains(&probe) {
                Some(RuleSetId::new(1))
            } else if root_files.contains(&probe) {
                Some(RuleSetId::new(0))
            } else {
                None
            };
            prop_assert_eq!(resolved, expected);
            prop_assert_eq!(table.resolve("top.txt").map(|rs| rs.id()), Some(RuleSetId::new(0)));
        }
    }
}
