//! Ignore patterns, matched against entry names only (never full paths).

use glob::Pattern;
use std::ffi::OsStr;

use crate::errors::UsrMergeError;

#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Pattern>,
}

impl IgnorePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, UsrMergeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                Pattern::new(raw).map_err(|e| UsrMergeError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True if `name` matches any pattern. Non-UTF-8 names are matched lossily.
    pub fn matches(&self, name: &OsStr) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let name = name.to_string_lossy();
        self.patterns.iter().any(|p| p.matches(&name))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
