//! Canonical state of a file after applying a rule set.

/// Maximum number of formatter applications when looking for a fixpoint.
pub const MAX_APPLICATIONS: usize = 10;

/// Result of applying a rule set to some content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalState {
    /// The content is already canonical.
    Clean,
    /// The content changes, and formatting the result again is stable.
    Changed { canonical: Vec<u8> },
    /// Formatting never reaches a fixpoint; `best_effort` is still useful.
    DidNotConverge { best_effort: Vec<u8> },
}

impl CanonicalState {
    /// Apply `format` to `raw` until the output is stable.
    ///
    /// A chain that settles after more than one extra application is still
    /// `Changed`. A chain that revisits an earlier value cycles; the shortest
    /// member of the cycle (ties broken byte-wise) is reported as best effort.
    pub fn compute<E, F>(raw: &[u8], mut format: F) -> Result<Self, E>
    where
        F: FnMut(&[u8]) -> Result<Vec<u8>, E>,
    {
        let formatted = format(raw)?;
        if formatted == raw {
            return Ok(Self::Clean);
        }
        let again = format(&formatted)?;
        if again == formatted {
            return Ok(Self::Changed { canonical: formatted });
        }

        let mut seen = vec![raw.to_vec(), formatted, again];
        while seen.len() <= MAX_APPLICATIONS {
            let last = &seen[seen.len() - 1];
            let next = format(last)?;
            if next == *last {
                return Ok(if next == raw {
                    Self::Clean
                } else {
                    Self::Changed { canonical: next }
                });
            }
            if let Some(start) = seen.iter().position(|s| *s == next) {
                let best_effort = seen[start..]
                    .iter()
                    .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
                    .cloned()
                    .unwrap_or(next);
                return Ok(Self::DidNotConverge { best_effort });
            }
            seen.push(next);
        }

        let best_effort = seen.pop().unwrap_or_default();
        Ok(Self::DidNotConverge { best_effort })
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    pub fn did_not_converge(&self) -> bool {
        matches!(self, Self::DidNotConverge { .. })
    }

    /// Canonical bytes, if the content changed.
    pub fn canonical(&self) -> Option<&[u8]> {
        match self {
            Self::Clean => None,
            Self::Changed { canonical } => Some(canonical),
            Self::DidNotConverge { best_effort } => Some(best_effort),
        }
    }
}
