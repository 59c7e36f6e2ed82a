//! Line filters: composable include/exclude/highlight predicates.
//!
//! A filter pairs a pattern with one of four actions. Filters form an ordered
//! chain; a line's [`FilterResult`] starts at `NoAction` and folds through
//! each filter's action function in insertion order. `Highlighted` is
//! absorbing: once a line is highlighted no later filter can change it.

use crate::error::{DlogError, Result};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Outcome of folding a line through (a prefix of) the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterResult {
    #[default]
    NoAction,
    Included,
    Excluded,
    Highlighted,
}

/// What a filter does to lines its pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    Intersect,
    Union,
    Exclude,
    Highlight,
}

/// How patterns are matched. Toggled in the infobar with Ctrl-R / Ctrl-/.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchKind {
    #[default]
    CaseSensitive,
    Regex,
}

impl SearchKind {
    /// Label shown at the right edge of the infobar while editing.
    pub fn label(self) -> &'static str {
        match self {
            SearchKind::CaseSensitive => "CaseS",
            SearchKind::Regex => "RegEx",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SearchKind::CaseSensitive => SearchKind::Regex,
            SearchKind::Regex => SearchKind::CaseSensitive,
        }
    }
}

/// Finds the first match of a pattern in a character slice, returning the
/// half-open character range.
pub type SearchFn = Box<dyn Fn(&[char]) -> Option<(usize, usize)> + Send + Sync>;

/// Build the matcher for a pattern under the given kind.
///
/// Case-sensitive patterns match as literal character subsequences; regex
/// patterns compile with `regex` and match against the line re-assembled as a
/// string (ranges converted back to character indices).
pub fn search_fn(kind: SearchKind, pattern: &[char]) -> Result<SearchFn> {
    match kind {
        SearchKind::CaseSensitive => {
            let needle: Vec<char> = pattern.to_vec();
            Ok(Box::new(move |hay| {
                if needle.is_empty() {
                    return None;
                }
                hay.windows(needle.len())
                    .position(|w| w == needle.as_slice())
                    .map(|start| (start, start + needle.len()))
            }))
        }
        SearchKind::Regex => {
            let source: String = pattern.iter().collect();
            let re = compile_regex(&source)?;
            Ok(Box::new(move |hay| {
                let text: String = hay.iter().collect();
                let m = re.find(&text)?;
                let start = text[..m.start()].chars().count();
                let len = text[m.start()..m.end()].chars().count();
                Some((start, start + len))
            }))
        }
    }
}

fn compile_regex(source: &str) -> Result<Regex> {
    RegexBuilder::new(source)
        .build()
        .map_err(|e| DlogError::bad_filter(e.to_string()))
}

/// Find all non-overlapping matches of `search` in `hay`.
///
/// Used to paint search-term highlights across a rendered line.
pub fn index_all(search: &SearchFn, hay: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut base = 0;
    while base < hay.len() {
        match search(&hay[base..]) {
            Some((start, end)) if end > start => {
                spans.push((base + start, base + end));
                base += end;
            }
            // Zero-width or no match: stop rather than loop forever.
            _ => break,
        }
    }
    spans
}

/// A single element of the filter chain.
pub struct Filter {
    pattern: Vec<char>,
    kind: SearchKind,
    action: FilterAction,
    search: SearchFn,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("pattern", &self.pattern.iter().collect::<String>())
            .field("kind", &self.kind)
            .field("action", &self.action)
            .finish()
    }
}

impl Filter {
    pub fn new(pattern: &[char], action: FilterAction, kind: SearchKind) -> Result<Self> {
        if pattern.is_empty() {
            return Err(DlogError::bad_filter("empty pattern"));
        }
        let search = search_fn(kind, pattern)?;
        Ok(Self {
            pattern: pattern.to_vec(),
            kind,
            action,
            search,
        })
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }

    /// Fold one line through this filter.
    pub fn take_action(&self, line: &[char], current: FilterResult) -> FilterResult {
        if current == FilterResult::Highlighted {
            return FilterResult::Highlighted;
        }
        let matched = (self.search)(line).is_some();
        match self.action {
            FilterAction::Intersect => {
                if current == FilterResult::Excluded {
                    FilterResult::Excluded
                } else if matched {
                    FilterResult::Included
                } else {
                    FilterResult::Excluded
                }
            }
            FilterAction::Union => {
                if current == FilterResult::Included {
                    FilterResult::Included
                } else if matched {
                    FilterResult::Included
                } else {
                    FilterResult::Excluded
                }
            }
            FilterAction::Exclude => {
                if current == FilterResult::Excluded {
                    FilterResult::Excluded
                } else if matched {
                    FilterResult::Excluded
                } else {
                    FilterResult::Included
                }
            }
            FilterAction::Highlight => {
                if matched {
                    FilterResult::Highlighted
                } else {
                    current
                }
            }
        }
    }
}

/// Fold a line through a whole chain in insertion order.
pub fn apply_chain(filters: &[Filter], line: &[char]) -> FilterResult {
    filters
        .iter()
        .fold(FilterResult::NoAction, |acc, f| f.take_action(line, acc))
}

/// Whether a fold outcome keeps the line visible.
pub fn passes(result: FilterResult) -> bool {
    matches!(
        result,
        FilterResult::NoAction | FilterResult::Included | FilterResult::Highlighted
    )
}
