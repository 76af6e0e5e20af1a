//! Source spans and location filters

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Byte range within one source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    /// File the span belongs to
    pub file: String,
    /// Start byte offset (inclusive)
    pub start: u32,
    /// End byte offset (exclusive)
    pub end: u32,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            file: file.into(),
            start,
            end: end.max(start),
        }
    }

    /// Whether this span shares at least one byte with `range`.
    ///
    /// Empty spans count as overlapping when they sit inside the range.
    pub fn overlaps(&self, range: &Range<u32>) -> bool {
        if self.start == self.end {
            return range.start <= self.start && self.start < range.end.max(range.start + 1);
        }
        self.start < range.end && range.start < self.end
    }

    /// Whether `other` lies entirely inside this span of the same file
    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.file == other.file && self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.file, self.start, self.end)
    }
}

/// Restricts force-completion to symbols declared in one file, optionally
/// within one byte range of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFilter {
    pub file: String,
    pub range: Option<Range<u32>>,
}

impl LocationFilter {
    /// Match everything declared in `file`
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            range: None,
        }
    }

    /// Match declarations in `file` overlapping `range`
    pub fn range(file: impl Into<String>, range: Range<u32>) -> Self {
        Self {
            file: file.into(),
            range: Some(range),
        }
    }

    pub fn matches(&self, span: &SourceSpan) -> bool {
        if span.file != self.file {
            return false;
        }
        match &self.range {
            Some(range) => span.overlaps(range),
            None => true,
        }
    }

    /// True when any of the spans of a (possibly multi-part) declaration match
    pub fn matches_any<'a>(&self, spans: impl IntoIterator<Item = &'a SourceSpan>) -> bool {
        spans.into_iter().any(|span| self.matches(span))
    }
}

impl fmt::Display for LocationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}:{}..{}", self.file, range.start, range.end),
            None => f.write_str(&self.file),
        }
    }
}
