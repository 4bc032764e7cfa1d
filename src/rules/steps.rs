//! Formatting steps and line-ending policies.
//!
//! Steps see text whose line separators have already been normalized to
//! `\n`; the rule set's [`LineEndings`] policy is applied after the last step.

use regex::Regex;

use crate::config::schema::{IndentStyle, LineEndingsConfig, StepConfig};
use crate::rules::FormatError;

/// A compiled formatting step.
#[derive(Debug, Clone)]
pub enum Step {
    TrimTrailingWhitespace,
    EndWithNewline,
    Indent { style: IndentStyle, width: usize },
    Replace { find: String, replacement: String },
    ReplaceRegex { regex: Regex, replacement: String },
}

impl Step {
    /// Compile a configured step.
    pub fn compile(config: &StepConfig) -> Result<Self, FormatError> {
        Ok(match config {
            StepConfig::TrimTrailingWhitespace => Self::TrimTrailingWhitespace,
            StepConfig::EndWithNewline => Self::EndWithNewline,
            StepConfig::Indent { style, width } => Self::Indent {
                style: *style,
                width: (*width).max(1),
            },
            StepConfig::Replace { find, replacement } => Self::Replace {
                find: find.clone(),
                replacement: replacement.clone(),
            },
            StepConfig::ReplaceRegex { pattern, replacement } => Self::ReplaceRegex {
                regex: Regex::new(pattern).map_err(|e| FormatError::Preparation(e.to_string()))?,
                replacement: replacement.clone(),
            },
        })
    }

    /// Apply the step to `\n`-separated text.
    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::TrimTrailingWhitespace => text
                .split('\n')
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::EndWithNewline => {
                let content = text.trim_end();
                let mut out = String::with_capacity(content.len() + 1);
                out.push_str(content);
                out.push('\n');
                out
            }
            Self::Indent { style, width } => text
                .split('\n')
                .map(|line| reindent(line, *style, *width))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Replace { find, replacement } => {
                if find.is_empty() {
                    text.to_string()
                } else {
                    text.replace(find.as_str(), replacement)
                }
            }
            Self::ReplaceRegex { regex, replacement } => {
                regex.replace_all(text, replacement.as_str()).into_owned()
            }
        }
    }
}

fn reindent(line: &str, style: IndentStyle, width: usize) -> String {
    let body = line.trim_start_matches([' ', '\t']);
    let leading = &line[..line.len() - body.len()];

    // Column count of the leading whitespace, tabs stopping at multiples of width.
    let mut columns = 0;
    for c in leading.chars() {
        if c == '\t' {
            columns += width - columns % width;
        } else {
            columns += 1;
        }
    }

    let indent = match style {
        IndentStyle::Spaces => " ".repeat(columns),
        IndentStyle::Tabs => {
            let mut s = "\t".repeat(columns / width);
            s.push_str(&" ".repeat(columns % width));
            s
        }
    };
    indent + body
}

/// Line separator policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEndings {
    Unix,
    Windows,
    MacClassic,
    PlatformNative,
    /// Reuse the first separator found in the input.
    Preserve,
}

impl From<LineEndingsConfig> for LineEndings {
    fn from(config: LineEndingsConfig) -> Self {
        match config {
            LineEndingsConfig::Unix => Self::Unix,
            LineEndingsConfig::Windows => Self::Windows,
            LineEndingsConfig::MacClassic => Self::MacClassic,
            LineEndingsConfig::PlatformNative => Self::PlatformNative,
            LineEndingsConfig::Preserve => Self::Preserve,
        }
    }
}

impl LineEndings {
    /// Separator to write for content that originally read `original`.
    pub fn separator(self, original: &str) -> &'static str {
        match self {
            Self::Unix => "\n",
            Self::Windows => "\r\n",
            Self::MacClassic => "\r",
            Self::PlatformNative => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
            Self::Preserve => detect_separator(original),
        }
    }
}

fn detect_separator(text: &str) -> &'static str {
    match text.find(['\r', '\n']) {
        Some(i) if text[i..].starts_with("\r\n") => "\r\n",
        Some(i) if text[i..].starts_with('\r') => "\r",
        _ => "\n",
    }
}

/// Rewrite every `\r\n` and lone `\r` as `\n`.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
