//! Lazy, filtered line view over the shared byte file.
//!
//! The fetcher turns raw buffered bytes into positionally-addressable lines:
//! it scans from an absolute offset, decodes ANSI escapes, folds each line
//! through the filter chain, and yields only survivors. Offsets stay valid
//! under back-fill prepending because the byte file preserves byte identity;
//! line numbers are a property of the filtered view and are recomputed by
//! scanning.
//!
//! A line whose terminating newline has not arrived yet is never yielded,
//! which keeps live tailing safe against torn writes.

use crate::ansi::{self, AttrString};
use crate::buffer::ByteFile;
use crate::filter::{apply_chain, passes, Filter, FilterAction, FilterResult, SearchFn};
use memchr::{memchr, memrchr};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

pub type LineNo = u64;
pub type Offset = u64;

/// A position in the line stream: the filtered line index (when known) and
/// the absolute byte offset of the line's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: Option<LineNo>,
    pub offset: Offset,
}

impl Pos {
    pub const ZERO: Pos = Pos {
        line: Some(0),
        offset: 0,
    };

    /// An offset-only anchor, used when jumping to the end of the stream
    /// before the line count is known.
    pub fn at_offset(offset: Offset) -> Pos {
        Pos { line: None, offset }
    }

    /// The position one filtered line further down.
    pub fn next_line(&self, offset: Offset) -> Pos {
        Pos {
            line: self.line.map(|n| n + 1),
            offset,
        }
    }
}

/// One decoded line that survived the filter chain.
#[derive(Debug, Clone)]
pub struct Line {
    pub pos: Pos,
    /// Offset one past this line's terminating newline; the next line's
    /// start.
    pub end: Offset,
    pub text: AttrString,
    /// Set by a matching highlight filter or a manual toggle.
    pub highlighted: bool,
}

#[derive(Default)]
struct FilterState {
    filters: Vec<Filter>,
    enabled: bool,
    highlighted_lines: HashSet<LineNo>,
}

impl FilterState {
    fn fold(&self, chars: &[char]) -> FilterResult {
        if !self.enabled || self.filters.is_empty() {
            return FilterResult::NoAction;
        }
        apply_chain(&self.filters, chars)
    }
}

/// Filtered line fetcher over a [`ByteFile`].
pub struct Fetcher {
    file: Arc<ByteFile>,
    state: RwLock<FilterState>,
}

impl Fetcher {
    pub fn new(file: Arc<ByteFile>) -> Self {
        Self {
            file,
            state: RwLock::new(FilterState::default()),
        }
    }

    /// Total buffered length; one past the last addressable offset.
    pub fn last_offset(&self) -> Offset {
        self.file.len()
    }

    /// Where the live writer is currently positioned. The follow watcher
    /// polls this to detect fresh tail bytes.
    pub fn last_write_offset(&self) -> Offset {
        self.file.write_offset()
    }

    /// Total bytes prepended by back-fill so far. Offset holders add the
    /// growth of this counter to stay on the same bytes.
    pub fn prepended_total(&self) -> u64 {
        self.file.prepended()
    }

    /// Scan forward from `from`, yielding up to `max` surviving lines.
    ///
    /// The scan is restartable: pass `last.pos.next_line(last.end)` to
    /// continue where the previous call stopped.
    pub fn lines(&self, from: Pos, max: usize) -> Vec<Line> {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let mut out = Vec::new();
        let mut offset = from.offset as usize;
        let mut line_no = from.line;

        while out.len() < max && offset < snap.len() {
            let Some(nl) = memchr(b'\n', &snap[offset..]) else {
                break;
            };
            let end = offset + nl + 1;
            if let Some(line) =
                decode_surviving(&state, &snap[offset..end - 1], line_no, offset as u64, end as u64)
            {
                out.push(line);
                line_no = line_no.map(|n| n + 1);
            }
            offset = end;
        }
        out
    }

    /// Forward search from `from` (inclusive) over surviving lines.
    pub fn search(&self, from: Pos, search: &SearchFn) -> Option<Pos> {
        self.scan_forward(from, |line| (search)(&line.text.chars).is_some())
    }

    /// Forward search for the next highlighted line (filter- or manually-).
    pub fn search_highlighted(&self, from: Pos) -> Option<Pos> {
        self.scan_forward(from, |line| line.highlighted)
    }

    /// Backward search over lines strictly before `from.offset`.
    pub fn search_back(&self, from: Pos, search: &SearchFn) -> Option<Pos> {
        self.scan_backward(from, |line| (search)(&line.text.chars).is_some())
    }

    /// Backward variant of [`Fetcher::search_highlighted`].
    pub fn search_back_highlighted(&self, from: Pos) -> Option<Pos> {
        self.scan_backward(from, |line| line.highlighted)
    }

    /// Scan from `from` to the current end of data, returning the position of
    /// the last surviving line seen (or `from` when nothing survives).
    ///
    /// The status updater calls this repeatedly to keep the line total
    /// current without rescanning from zero.
    pub fn advance_lines(&self, from: Pos) -> Pos {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let mut offset = from.offset as usize;
        let mut line_no = from.line;
        let mut last = from;

        while offset < snap.len() {
            let Some(nl) = memchr(b'\n', &snap[offset..]) else {
                break;
            };
            let end = offset + nl + 1;
            let chars = ansi::decode(&snap[offset..end - 1]);
            if passes(state.fold(&chars.chars)) {
                last = Pos {
                    line: line_no,
                    offset: offset as u64,
                };
                line_no = line_no.map(|n| n + 1);
            }
            offset = end;
        }
        last
    }

    /// Recompute the filtered line number for the line starting at (or the
    /// first surviving line after) `offset` by scanning from the top.
    ///
    /// Used when filter changes invalidate previously captured numbering.
    pub fn pos_at_offset(&self, offset: Offset) -> Pos {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let mut scan = 0usize;
        let mut count: LineNo = 0;

        while scan < snap.len() && (scan as u64) < offset {
            let Some(nl) = memchr(b'\n', &snap[scan..]) else {
                break;
            };
            let end = scan + nl + 1;
            if (end as u64) > offset {
                break;
            }
            let chars = ansi::decode(&snap[scan..end - 1]);
            if passes(state.fold(&chars.chars)) {
                count += 1;
            }
            scan = end;
        }
        Pos {
            line: Some(count),
            offset,
        }
    }

    /// Walk `count` surviving lines backwards from `from`, returning the
    /// position reached. Stops at the first line of the stream, so walking
    /// past the top pins to line zero of the filtered view.
    pub fn back_lines(&self, from: Pos, count: usize) -> Pos {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let upper = (from.offset as usize).min(snap.len());
        let mut end = memrchr(b'\n', &snap[..upper]).map(|i| i + 1).unwrap_or(0);
        let mut line_no = from.line;
        let mut reached = Pos {
            line: line_no,
            offset: end as u64,
        };
        let mut walked = 0;

        while end > 0 && walked < count {
            let start = if end >= 2 {
                memrchr(b'\n', &snap[..end - 1]).map(|i| i + 1).unwrap_or(0)
            } else {
                0
            };
            let chars = ansi::decode(&snap[start..end - 1]);
            if passes(state.fold(&chars.chars)) {
                line_no = line_no.and_then(|n| n.checked_sub(1));
                reached = Pos {
                    line: line_no,
                    offset: start as u64,
                };
                walked += 1;
            }
            end = start;
        }
        reached
    }

    /// Append a filter to the chain and enable filtering.
    pub fn append_filter(&self, filter: Filter) {
        let mut state = self.write_state();
        state.filters.push(filter);
        state.enabled = true;
    }

    /// Drop the most recently added filter. Returns false when the chain was
    /// already empty.
    pub fn remove_last_filter(&self) -> bool {
        self.write_state().filters.pop().is_some()
    }

    /// Drop every non-highlight filter (the `=` binding).
    pub fn drop_plain_filters(&self) {
        self.write_state()
            .filters
            .retain(|f| f.action() == FilterAction::Highlight);
    }

    /// Drop every highlight filter and all manual line highlights (Ctrl-H).
    pub fn drop_highlights(&self) {
        let mut state = self.write_state();
        state.filters.retain(|f| f.action() != FilterAction::Highlight);
        state.highlighted_lines.clear();
    }

    pub fn toggle_filters_enabled(&self) -> bool {
        let mut state = self.write_state();
        state.enabled = !state.enabled;
        state.enabled
    }

    pub fn filters_enabled(&self) -> bool {
        self.read_state().enabled
    }

    pub fn filter_count(&self) -> usize {
        self.read_state().filters.len()
    }

    /// Toggle the manual highlight on a line. No-op for unknown positions.
    pub fn toggle_highlight(&self, line: Option<LineNo>) {
        let Some(line) = line else { return };
        let mut state = self.write_state();
        if !state.highlighted_lines.insert(line) {
            state.highlighted_lines.remove(&line);
        }
    }

    pub fn highlighted_count(&self) -> usize {
        self.read_state().highlighted_lines.len()
    }

    fn scan_forward(&self, from: Pos, pred: impl Fn(&Line) -> bool) -> Option<Pos> {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let mut offset = from.offset as usize;
        let mut line_no = from.line;

        while offset < snap.len() {
            let nl = memchr(b'\n', &snap[offset..])?;
            let end = offset + nl + 1;
            if let Some(line) =
                decode_surviving(&state, &snap[offset..end - 1], line_no, offset as u64, end as u64)
            {
                if pred(&line) {
                    return Some(line.pos);
                }
                line_no = line_no.map(|n| n + 1);
            }
            offset = end;
        }
        None
    }

    fn scan_backward(&self, from: Pos, pred: impl Fn(&Line) -> bool) -> Option<Pos> {
        let state = self.read_state();
        let snap = self.file.snapshot();
        let upper = (from.offset as usize).min(snap.len());
        // Snap to the start of the line containing `from.offset`; everything
        // before that boundary is searched.
        let mut end = memrchr(b'\n', &snap[..upper]).map(|i| i + 1).unwrap_or(0);
        let mut line_no = from.line;

        while end > 0 {
            let start = if end >= 2 {
                memrchr(b'\n', &snap[..end - 1]).map(|i| i + 1).unwrap_or(0)
            } else {
                0
            };
            let text = ansi::decode(&snap[start..end - 1]);
            let result = state.fold(&text.chars);
            if passes(result) {
                // The line number is only known after the survivor count
                // moves, so the manual-highlight check happens here rather
                // than in the shared decode path.
                line_no = line_no.and_then(|n| n.checked_sub(1));
                let manual = line_no.is_some_and(|n| state.highlighted_lines.contains(&n));
                let line = Line {
                    pos: Pos {
                        line: line_no,
                        offset: start as u64,
                    },
                    end: end as u64,
                    text,
                    highlighted: result == FilterResult::Highlighted || manual,
                };
                if pred(&line) {
                    return Some(line.pos);
                }
            }
            end = start;
        }
        None
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, FilterState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, FilterState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Decode one raw line and fold it through the chain; `None` when filtered
/// out.
fn decode_surviving(
    state: &FilterState,
    raw: &[u8],
    line_no: Option<LineNo>,
    offset: Offset,
    end: Offset,
) -> Option<Line> {
    let text = ansi::decode(raw);
    let result = state.fold(&text.chars);
    if !passes(result) {
        return None;
    }
    let manual = line_no.is_some_and(|n| state.highlighted_lines.contains(&n));
    Some(Line {
        pos: Pos {
            line: line_no,
            offset,
        },
        end,
        text,
        highlighted: result == FilterResult::Highlighted || manual,
    })
}
