//! Rule sets: how to canonicalize the files of one build unit's format.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::schema::{RuleSetConfig, StepConfig};
use crate::rules::steps::{LineEndings, Step};
use crate::rules::{FormatError, TextEncoding};

/// Stable identity of a rule set: its index in the routing table's arena.
///
/// Two rule sets are the same only if their ids are equal; rule sets are never
/// compared structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleSetId(usize);

impl RuleSetId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for RuleSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-set-{}", self.0)
    }
}

/// An immutable, lazily prepared formatting rule set.
///
/// The step chain is compiled on first use; the cold-start gate makes sure
/// that first use happens once, on the serialized lane.
pub struct RuleSet {
    id: RuleSetId,
    name: String,
    unit_dir: PathBuf,
    encoding: TextEncoding,
    line_endings: LineEndings,
    step_configs: Vec<StepConfig>,
    prepared: OnceLock<Vec<Step>>,
}

impl RuleSet {
    /// Build a rule set from configuration. `unit_dir` must already be
    /// resolved against the project root.
    pub fn from_config(
        id: RuleSetId,
        config: &RuleSetConfig,
        unit_dir: PathBuf,
    ) -> Result<Self, FormatError> {
        let encoding = TextEncoding::from_name(&config.encoding)
            .ok_or_else(|| FormatError::UnknownEncoding(config.encoding.clone()))?;
        Ok(Self {
            id,
            name: config.name.clone(),
            unit_dir,
            encoding,
            line_endings: config.line_endings.into(),
            step_configs: config.steps.clone(),
            prepared: OnceLock::new(),
        })
    }

    pub fn id(&self) -> RuleSetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of the build unit that declared this rule set.
    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn line_endings(&self) -> LineEndings {
        self.line_endings
    }

    /// Whether the step chain has been compiled.
    pub fn is_prepared(&self) -> bool {
        self.prepared.get().is_some()
    }

    /// Compile the step chain on first call and return it.
    ///
    /// A failed compilation is not cached; the next call tries again.
    pub fn steps(&self) -> Result<&[Step], FormatError> {
        if let Some(steps) = self.prepared.get() {
            return Ok(steps);
        }
        tracing::debug!(rule_set = %self.name, steps = self.step_configs.len(), "Preparing rule set");
        let steps = self
            .step_configs
            .iter()
            .map(Step::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.prepared.get_or_init(|| steps))
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("unit_dir", &self.unit_dir)
            .field("encoding", &self.encoding)
            .field("prepared", &self.is_prepared())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LineEndingsConfig;

    fn config(steps: Vec<StepConfig>) -> RuleSetConfig {
        RuleSetConfig {
            name: "misc".to_string(),
            dir: ".".into(),
            target: vec!["*.txt".to_string()],
            exclude: Vec::new(),
            encoding: "latin1".to_string(),
            line_endings: LineEndingsConfig::Windows,
            steps,
        }
    }

    #[test]
    fn prepares_lazily_once() {
        let rule_set = RuleSet::from_config(
            RuleSetId::new(3),
            &config(vec![StepConfig::EndWithNewline]),
            PathBuf::from("/project"),
        )
        .unwrap();
        assert_eq!(rule_set.encoding(), TextEncoding::Latin1);
        assert_eq!(rule_set.line_endings(), LineEndings::Windows);
        assert!(!rule_set.is_prepared());

        assert_eq!(rule_set.steps().unwrap().len(), 1);
        assert!(rule_set.is_prepared());
    }

    #[test]
    fn preparation_failure_is_not_cached() {
        let rule_set = RuleSet::from_config(
            RuleSetId::new(0),
            &config(vec![StepConfig::ReplaceRegex {
                pattern: "[".to_string(),
                replacement: String::new(),
            }]),
            PathBuf::from("/project"),
        )
        .unwrap();
        assert!(rule_set.steps().is_err());
        assert!(rule_set.steps().is_err());
        assert!(!rule_set.is_prepared());
    }

    #[test]
    fn unknown_encoding_rejected() {
        let mut cfg = config(Vec::new());
        cfg.encoding = "klingon".to_string();
        let err = RuleSet::from_config(RuleSetId::new(0), &cfg, PathBuf::new()).unwrap_err();
        assert_eq!(err, FormatError::UnknownEncoding("klingon".to_string()));
    }
}
