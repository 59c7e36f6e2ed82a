//! The window of decoded lines backing the visible screen.
//!
//! `ViewBuffer` caches up to one window of filtered lines anchored at a
//! position in the byte stream. Scrolling moves the anchor; filling tops the
//! cache up after new data arrives. All movement is expressed in filtered
//! lines, so the buffer pins naturally at the top of the stream and at the
//! tail.

use crate::fetcher::{Fetcher, Line, Pos};
use crate::filter::SearchFn;
use std::sync::Arc;

/// Cached window over the fetcher's line stream.
pub struct ViewBuffer {
    fetcher: Arc<Fetcher>,
    lines: Vec<Line>,
    window: usize,
    anchor: Pos,
    /// Prepend counter value the cached offsets were captured against.
    prepend_mark: u64,
}

impl ViewBuffer {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            lines: Vec::new(),
            window: 0,
            anchor: Pos::ZERO,
            prepend_mark: 0,
        }
    }

    /// Shift the anchor and every cached offset by whatever back-fill has
    /// prepended since they were captured, so they keep addressing the same
    /// bytes. Line numbers are refreshed separately (they are display
    /// state, not addresses).
    fn sync_anchor(&mut self) {
        let total = self.fetcher.prepended_total();
        let delta = total.saturating_sub(self.prepend_mark);
        if delta > 0 {
            self.anchor.offset += delta;
            for line in &mut self.lines {
                line.pos.offset += delta;
                line.end += delta;
            }
        }
        self.prepend_mark = total;
    }

    /// Resize the window (screen height minus the infobar row).
    pub fn set_window(&mut self, window: usize) {
        self.window = window;
        self.lines.truncate(window);
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Clear the cache and re-anchor at `pos` (captured against current
    /// coordinates). Offset-only anchors (tail jumps, backward-search wraps)
    /// get their line number recomputed so the status display stays
    /// meaningful.
    pub fn reset(&mut self, pos: Pos) {
        self.prepend_mark = self.fetcher.prepended_total();
        self.anchor = if pos.line.is_none() {
            self.fetcher.pos_at_offset(pos.offset)
        } else {
            pos
        };
        self.lines.clear();
        self.fill();
    }

    /// Re-decode the window keeping the anchor on the same bytes,
    /// recomputing its line number under the current filter chain and any
    /// prepended history.
    pub fn refresh(&mut self) {
        self.sync_anchor();
        let pos = self.fetcher.pos_at_offset(self.anchor.offset);
        self.reset(pos);
    }

    /// Top up the cache to the window size. Returns the number of lines
    /// added.
    pub fn fill(&mut self) -> usize {
        self.sync_anchor();
        let need = self.window.saturating_sub(self.lines.len());
        if need == 0 {
            return 0;
        }
        let from = match self.lines.last() {
            Some(last) => last.pos.next_line(last.end),
            None => self.anchor,
        };
        let mut fetched = self.fetcher.lines(from, need);
        let added = fetched.len();
        self.lines.append(&mut fetched);
        added
    }

    /// Scroll by `delta` filtered lines (positive = down). Pins at the top
    /// of the stream and at the last full window.
    pub fn shift(&mut self, delta: i64) {
        self.sync_anchor();
        if delta > 0 {
            self.shift_down(delta as usize);
        } else if delta < 0 {
            self.shift_up(delta.unsigned_abs() as usize);
        }
    }

    fn shift_down(&mut self, n: usize) {
        let fetched = self.fetcher.lines(self.anchor, n + self.window);
        if fetched.len() <= self.window {
            // Nothing below the current window; stay pinned.
            self.lines = fetched;
            return;
        }
        let drop = n.min(fetched.len() - self.window);
        self.anchor = fetched[drop].pos;
        let take = self.window.min(fetched.len() - drop);
        self.lines = fetched[drop..drop + take].to_vec();
        self.fill();
    }

    fn shift_up(&mut self, n: usize) {
        self.anchor = self.fetcher.back_lines(self.anchor, n);
        self.lines.clear();
        self.fill();
    }

    /// Anchor the window so its bottom rests on the current tail.
    pub fn shift_to_end(&mut self) {
        let tail = Pos::at_offset(self.fetcher.last_offset());
        let anchor = self.fetcher.back_lines(tail, self.window);
        self.reset(anchor);
    }

    /// True when the cache holds a full window.
    pub fn is_full(&self) -> bool {
        self.window > 0 && self.lines.len() >= self.window
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The line at the top of the window.
    pub fn current_line(&self) -> Option<&Line> {
        self.lines.first()
    }

    pub fn last_line(&self) -> Option<&Line> {
        self.lines.last()
    }

    /// Position of the top of the window (the anchor when the cache is
    /// empty).
    pub fn current_pos(&self) -> Pos {
        self.current_line().map(|l| l.pos).unwrap_or(self.anchor)
    }

    /// Search the cached window below the top line. Returns the distance to
    /// shift down so the match becomes the top line.
    pub fn search_forward(&self, search: &SearchFn) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, line)| (search)(&line.text.chars).is_some())
            .map(|(i, _)| i)
    }

    /// In-window variant of the highlighted-line search.
    pub fn search_forward_highlighted(&self) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, line)| line.highlighted)
            .map(|(i, _)| i)
    }

    /// Flip the manual-highlight flag of the cached top line.
    pub fn toggle_current_highlight(&mut self) {
        if let Some(line) = self.lines.first_mut() {
            line.highlighted = !line.highlighted;
        }
    }
}
