//! The formatting engine seam.

use std::path::Path;

use crate::rules::steps::normalize_newlines;
use crate::rules::{CanonicalState, FormatError, RuleSet};

/// Applies a rule set to file content.
///
/// Implementations may be slow and may do one-time preparation on the first
/// call for a given rule set; the dispatcher routes that first call through
/// the cold-start gate and the serialized lane.
pub trait FormatEngine: Send + Sync + 'static {
    fn apply(
        &self,
        rule_set: &RuleSet,
        path: &Path,
        content: &str,
    ) -> Result<CanonicalState, FormatError>;
}

/// Engine that runs a rule set's configured step chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepEngine;

impl FormatEngine for StepEngine {
    fn apply(
        &self,
        rule_set: &RuleSet,
        _path: &Path,
        content: &str,
    ) -> Result<CanonicalState, FormatError> {
        let steps = rule_set.steps()?;
        let encoding = rule_set.encoding();
        let separator = rule_set.line_endings().separator(content);
        let raw = encoding.encode(content);

        CanonicalState::compute(&raw, |bytes| {
            let mut text = normalize_newlines(&encoding.decode(bytes));
            for step in steps {
                text = step.apply(&text);
            }
            if separator != "\n" {
                text = text.replace('\n', separator);
            }
            Ok(encoding.encode(&text))
        })
    }
}
