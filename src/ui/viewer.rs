//! The interactive viewer: event loop, key bindings, and rendering.
//!
//! One task owns the terminal. It selects over the crossterm event stream
//! and the interrupt channels fed by background workers: the status-line
//! updater, the follow watcher, the empty-buffer refresh guard, the
//! back-fill redraw callback, and the infobar's committed inputs. Workers
//! never draw; they post requests that this loop consumes.

use crate::buffer::ByteFile;
use crate::config::Config;
use crate::engine::LogEngine;
use crate::error::Result;
use crate::fetcher::{Fetcher, LineNo, Pos};
use crate::filter::{index_all, search_fn, Filter, FilterAction, SearchKind};
use crate::ui::infobar::{InfoBar, InfoBarEvent, InputMode, MessageTone, StatusContext};
use crate::ui::screen::{style_for, Screen, ScreenFrame};
use crate::ui::view_buffer::ViewBuffer;
use crate::ansi::{AnsiColor, CharAttr};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use log::debug;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as RtLine, Span};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Main,
    InfoBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

/// A committed infobar input travelling through the interrupt multiplexer.
#[derive(Debug)]
pub struct CommitRequest {
    pub mode: InputMode,
    pub input: Vec<char>,
    pub kind: SearchKind,
}

struct Senders {
    search_tx: mpsc::UnboundedSender<CommitRequest>,
    refresh_tx: mpsc::Sender<()>,
    keep_chars_tx: mpsc::Sender<i64>,
    status_reset_tx: mpsc::Sender<()>,
}

/// The terminal viewer over one engine/fetcher pair.
pub struct Viewer<S: Screen> {
    screen: S,
    file: Arc<ByteFile>,
    fetcher: Arc<Fetcher>,
    engine: LogEngine,
    buffer: ViewBuffer,
    infobar: InfoBar,
    config: Config,
    token: CancellationToken,

    width: u16,
    height: u16,
    wrap: bool,
    h_offset: usize,
    keep_chars: usize,
    following: bool,
    direction: Direction,
    focus: Focus,
    search: Vec<char>,
    search_kind: SearchKind,
    forward_search: bool,
    total_lines: LineNo,
    senders: Option<Senders>,
}

impl<S: Screen> Viewer<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        screen: S,
        file: Arc<ByteFile>,
        fetcher: Arc<Fetcher>,
        engine: LogEngine,
        infobar: InfoBar,
        config: Config,
        token: CancellationToken,
    ) -> Self {
        let buffer = ViewBuffer::new(Arc::clone(&fetcher));
        Self {
            screen,
            file,
            fetcher,
            engine,
            buffer,
            infobar,
            config,
            token,
            width: 0,
            height: 0,
            wrap: false,
            h_offset: 0,
            keep_chars: 0,
            following: false,
            direction: Direction::Down,
            focus: Focus::Main,
            search: Vec::new(),
            search_kind: SearchKind::CaseSensitive,
            forward_search: true,
            total_lines: 0,
            senders: None,
        }
    }

    /// Run the interactive session until quit or fatal terminal error.
    pub async fn run(mut self) -> Result<()> {
        self.screen.init()?;
        let (width, height) = self.screen.size()?;
        self.resize(width, height);
        self.infobar.set_title(self.engine.title());
        self.draw_waiting()?;

        let (search_tx, mut search_rx) = mpsc::unbounded_channel();
        let (refresh_tx, mut refresh_rx) = mpsc::channel(4);
        let (refill_tx, mut refill_rx) = mpsc::channel(4);
        let (status_tx, mut status_rx) = mpsc::channel(8);
        let (keep_chars_tx, mut keep_chars_rx) = mpsc::channel(8);
        let (status_reset_tx, status_reset_rx) = mpsc::channel(4);
        self.senders = Some(Senders {
            search_tx,
            refresh_tx: refresh_tx.clone(),
            keep_chars_tx,
            status_reset_tx,
        });

        tokio::spawn(status_updater(
            Arc::clone(&self.fetcher),
            status_tx,
            status_reset_rx,
            self.token.child_token(),
        ));
        tokio::spawn(follow_watcher(
            Arc::clone(&self.fetcher),
            refill_tx,
            self.token.child_token(),
        ));
        tokio::spawn(empty_buffer_guard(
            Arc::clone(&self.fetcher),
            refresh_tx,
            self.token.child_token(),
        ));

        self.start_follow().await;
        self.draw()?;

        let mut events = EventStream::new();
        loop {
            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if key.kind != KeyEventKind::Release && !self.on_key(key).await? {
                            break;
                        }
                    }
                    Some(Ok(Event::Resize(w, h))) => {
                        self.resize(w, h);
                        self.draw()?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(crate::error::DlogError::terminal(e.to_string()));
                    }
                    None => break,
                },
                Some(request) = search_rx.recv() => {
                    self.on_commit(request).await?;
                }
                Some(()) = refresh_rx.recv() => {
                    // Back-fill prepends shift every absolute offset; the
                    // buffer re-syncs and the line totals are recounted.
                    self.buffer.refresh();
                    let _ = self.senders().status_reset_tx.try_send(());
                    self.draw()?;
                }
                Some(()) = refill_rx.recv() => {
                    if self.following {
                        self.refill()?;
                    }
                }
                Some(last_line) = status_rx.recv() => {
                    self.total_lines = last_line + 1;
                    if self.focus == Focus::Main {
                        self.draw()?;
                    }
                }
                Some(delta) = keep_chars_rx.recv() => {
                    let next = self.keep_chars as i64 + delta;
                    if next >= 0 {
                        self.keep_chars = next as usize;
                    }
                    self.draw()?;
                }
            }
        }

        self.token.cancel();
        self.engine.cancel_and_wait().await;
        self.screen.cleanup()
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        // One row is reserved for the infobar.
        self.height = height.saturating_sub(1);
        self.buffer.set_window(self.height as usize);
    }

    async fn start_follow(&mut self) {
        // The seed covers at least one screen; --tail can ask for more.
        let height = self.config.tail.max(self.buffer.window()).max(1);
        match self.engine.follow(height).await {
            Ok(start) => {
                if !self.config.noload {
                    let refresh_tx = self.senders().refresh_tx.clone();
                    self.engine.start_backfill(start, move || {
                        let _ = refresh_tx.try_send(());
                    });
                }
            }
            Err(e) => debug!("follow failed: {}", e),
        }
        self.navigate_end();
    }

    fn senders(&self) -> &Senders {
        self.senders.as_ref().expect("channels wired in run()")
    }

    /// Handle one key event. Returns false to quit.
    async fn on_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.focus == Focus::InfoBar {
            match self.infobar.process_key(key) {
                InfoBarEvent::Commit { mode, input, kind } => {
                    self.focus = Focus::Main;
                    let _ = self.senders().search_tx.send(CommitRequest { mode, input, kind });
                }
                InfoBarEvent::Cancelled => {
                    self.focus = Focus::Main;
                }
                InfoBarEvent::KeepCharsDelta(delta) => {
                    let _ = self.senders().keep_chars_tx.try_send(delta);
                }
                InfoBarEvent::None => {}
            }
            self.draw()?;
            return Ok(true);
        }

        // Any main-view action clears transient infobar messages.
        self.infobar.to_status();

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('d') => self.navigate_half_page(1)?,
                KeyCode::Char('u') => self.navigate_half_page(-1)?,
                KeyCode::Char('f') => self.navigate_page_down()?,
                KeyCode::Char('b') => self.navigate_page_up()?,
                KeyCode::Char('h') => {
                    self.fetcher.drop_highlights();
                    self.buffer.refresh();
                    self.draw()?;
                }
                _ => {}
            }
            return Ok(true);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
            KeyCode::Char('j') | KeyCode::Down => self.navigate(1)?,
            KeyCode::Char('k') | KeyCode::Up => self.navigate(-1)?,
            KeyCode::Char('f') | KeyCode::PageDown | KeyCode::Char(' ') => {
                self.navigate_page_down()?
            }
            KeyCode::Char('b') | KeyCode::PageUp => self.navigate_page_up()?,
            KeyCode::Char('g') | KeyCode::Home => self.navigate_start()?,
            KeyCode::Char('G') | KeyCode::End => {
                self.navigate_end();
                self.draw()?;
            }
            KeyCode::Right => self.switch_container(true).await?,
            KeyCode::Left => self.switch_container(false).await?,
            KeyCode::Char('>') => self.navigate_horizontally(1)?,
            KeyCode::Char('<') => self.navigate_horizontally(-1)?,
            KeyCode::Char('W') => {
                self.wrap = !self.wrap;
                if self.wrap {
                    self.h_offset = 0;
                }
                self.draw()?;
            }
            KeyCode::Char('/') => self.enter_infobar(InputMode::Search)?,
            KeyCode::Char('?') => self.enter_infobar(InputMode::BackSearch)?,
            KeyCode::Char('&') => self.enter_infobar(InputMode::Filter)?,
            KeyCode::Char('+') => self.enter_infobar(InputMode::Append)?,
            KeyCode::Char('-') => self.enter_infobar(InputMode::Exclude)?,
            KeyCode::Char('~') => self.enter_infobar(InputMode::Highlight)?,
            KeyCode::Char('s') => self.enter_infobar(InputMode::Save)?,
            KeyCode::Char('K') => self.enter_infobar(InputMode::KeepChars)?,
            KeyCode::Char('n') => self.next_search(false)?,
            KeyCode::Char('N') => self.next_search(true)?,
            KeyCode::Char('h') => self.search_highlighted()?,
            KeyCode::Char('H') => self.search_back_highlighted()?,
            KeyCode::Char('`') => {
                self.fetcher
                    .toggle_highlight(self.buffer.current_pos().line);
                self.buffer.toggle_current_highlight();
                self.draw()?;
            }
            KeyCode::Char('U') => {
                if self.fetcher.remove_last_filter() {
                    self.after_filter_change()?;
                }
            }
            KeyCode::Char('=') => {
                self.fetcher.drop_plain_filters();
                self.after_filter_change()?;
            }
            KeyCode::Char('C') => {
                self.fetcher.toggle_filters_enabled();
                self.after_filter_change()?;
            }
            KeyCode::Char('M') => self.report_usage(),
            _ => {}
        }
        Ok(true)
    }

    fn enter_infobar(&mut self, mode: InputMode) -> Result<()> {
        self.focus = Focus::InfoBar;
        self.infobar.enter(mode, self.keep_chars);
        self.draw()
    }

    fn after_filter_change(&mut self) -> Result<()> {
        self.buffer.refresh();
        self.total_lines = 0;
        let _ = self.senders().status_reset_tx.try_send(());
        self.draw()
    }

    /// Apply a committed infobar input.
    async fn on_commit(&mut self, request: CommitRequest) -> Result<()> {
        match request.mode {
            InputMode::Filter => self.add_filter(request, FilterAction::Intersect)?,
            InputMode::Append => self.add_filter(request, FilterAction::Union)?,
            InputMode::Exclude => self.add_filter(request, FilterAction::Exclude)?,
            InputMode::Highlight => self.add_filter(request, FilterAction::Highlight)?,
            InputMode::Search | InputMode::BackSearch => {
                if !request.input.is_empty() {
                    self.search = request.input;
                    self.search_kind = request.kind;
                    self.forward_search = request.mode == InputMode::Search;
                    self.next_search(false)?;
                }
            }
            InputMode::Save => {
                let path: String = request.input.iter().collect();
                self.save_filtered(&path)?;
            }
            InputMode::KeepChars => {
                let text: String = request.input.iter().collect();
                match text.trim().parse::<usize>() {
                    Ok(n) => self.keep_chars = n,
                    Err(_) => {
                        self.keep_chars = 0;
                        if !text.trim().is_empty() {
                            self.infobar
                                .set_message(format!("bad column count '{}'", text), MessageTone::Error);
                        }
                    }
                }
            }
            InputMode::Status | InputMode::Message => {}
        }
        self.draw()
    }

    fn add_filter(&mut self, request: CommitRequest, action: FilterAction) -> Result<()> {
        if request.input.is_empty() {
            return Ok(());
        }
        match Filter::new(&request.input, action, request.kind) {
            Ok(filter) => {
                self.fetcher.append_filter(filter);
                self.after_filter_change()?;
            }
            Err(e) => {
                self.infobar.set_message(e.to_string(), MessageTone::Error);
            }
        }
        Ok(())
    }

    fn next_search(&mut self, reverse: bool) -> Result<()> {
        if self.search.is_empty() {
            return Ok(());
        }
        if self.forward_search != reverse {
            self.search_forward()
        } else {
            self.search_back()
        }
    }

    fn search_forward(&mut self) -> Result<()> {
        let Ok(search) = search_fn(self.search_kind, &self.search) else {
            return Ok(());
        };
        if let Some(distance) = self.buffer.search_forward(&search) {
            return self.navigate(distance as i64);
        }
        let from = self
            .buffer
            .last_line()
            .map(|l| l.pos)
            .unwrap_or(Pos::ZERO);
        let hit = self
            .fetcher
            .search(from, &search)
            // Wrap around to the top of the stream.
            .or_else(|| self.fetcher.search(Pos::ZERO, &search));
        match hit {
            Some(pos) => {
                self.buffer.reset(pos);
                self.draw()
            }
            None => {
                self.not_found();
                self.draw()
            }
        }
    }

    fn search_back(&mut self) -> Result<()> {
        let Ok(search) = search_fn(self.search_kind, &self.search) else {
            return Ok(());
        };
        let from = self.buffer.current_pos();
        let hit = self
            .fetcher
            .search_back(from, &search)
            // Wrap around to the tail of the stream.
            .or_else(|| {
                self.fetcher
                    .search_back(Pos::at_offset(self.fetcher.last_offset()), &search)
            });
        match hit {
            Some(pos) => {
                self.buffer.reset(pos);
                self.draw()
            }
            None => {
                self.not_found();
                self.draw()
            }
        }
    }

    fn not_found(&mut self) {
        let pattern: String = self.search.iter().collect();
        self.infobar
            .set_message(format!("'{}' not found", pattern), MessageTone::Error);
    }

    fn search_highlighted(&mut self) -> Result<()> {
        if let Some(distance) = self.buffer.search_forward_highlighted() {
            return self.navigate(distance as i64);
        }
        let from = self
            .buffer
            .last_line()
            .map(|l| l.pos)
            .unwrap_or(Pos::ZERO);
        if let Some(pos) = self.fetcher.search_highlighted(from) {
            self.buffer.reset(pos);
            self.draw()?;
        }
        Ok(())
    }

    fn search_back_highlighted(&mut self) -> Result<()> {
        if let Some(pos) = self.fetcher.search_back_highlighted(self.buffer.current_pos()) {
            self.buffer.reset(pos);
            self.draw()?;
        }
        Ok(())
    }

    fn navigate(&mut self, delta: i64) -> Result<()> {
        self.buffer.shift(delta);
        self.following = !self.buffer.is_full();
        self.draw()
    }

    fn navigate_page_down(&mut self) -> Result<()> {
        self.direction = Direction::Up;
        self.navigate(self.height as i64)
    }

    fn navigate_page_up(&mut self) -> Result<()> {
        self.direction = Direction::Up;
        self.navigate(-(self.height as i64))
    }

    fn navigate_half_page(&mut self, sign: i64) -> Result<()> {
        self.direction = Direction::Up;
        self.navigate(sign * self.height as i64 / 2)
    }

    fn navigate_start(&mut self) -> Result<()> {
        self.direction = Direction::Up;
        self.following = false;
        self.buffer.reset(Pos::ZERO);
        self.draw()
    }

    fn navigate_end(&mut self) {
        self.direction = Direction::Down;
        self.buffer.shift_to_end();
        self.following = true;
    }

    fn navigate_horizontally(&mut self, delta: i64) -> Result<()> {
        self.wrap = false;
        self.h_offset = (self.h_offset as i64 + delta).max(0) as usize;
        self.draw()
    }

    /// Pull new tail data into the window, keeping the bottom anchored while
    /// the user has not scrolled away.
    fn refill(&mut self) -> Result<()> {
        let was_following = self.following;
        self.following = false;

        loop {
            let added = self.buffer.fill();
            if self.buffer.is_full() {
                let before = self.buffer.current_pos().offset;
                self.buffer.shift_to_end();
                if added == 0 && self.buffer.current_pos().offset == before {
                    break;
                }
            } else if added == 0 {
                break;
            }
        }

        self.following = was_following;
        self.draw()
    }

    /// Switch to the neighbouring container: cancel the engine, clear the
    /// byte file, restart following, and jump to the tail.
    async fn switch_container(&mut self, next: bool) -> Result<()> {
        self.engine.cancel_and_wait().await;
        self.file.clear();
        if next {
            self.engine.select_next();
        } else {
            self.engine.select_prev();
        }
        self.infobar.set_title(self.engine.title());
        self.total_lines = 0;
        let _ = self.senders().status_reset_tx.try_send(());
        self.buffer.reset(Pos::ZERO);
        self.start_follow().await;
        self.draw()
    }

    /// Write every line surviving the filter chain to `path`.
    fn save_filtered(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        let path = expand_home(path);
        let file = match std::fs::File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                self.infobar
                    .set_message(format!("Err: {}", e), MessageTone::Error);
                return Ok(());
            }
        };

        self.infobar.set_message("Saving...", MessageTone::Info);
        let mut writer = std::io::BufWriter::new(file);
        let mut from = Pos::ZERO;
        let write_all = loop {
            let batch = self.fetcher.lines(from, 1024);
            let Some(last) = batch.last() else {
                break writer.flush();
            };
            from = last.pos.next_line(last.end);
            let mut result = Ok(());
            for line in &batch {
                let text: String = line.text.chars.iter().collect();
                result = writeln!(writer, "{}", text);
                if result.is_err() {
                    break;
                }
            }
            if result.is_err() {
                break result;
            }
        };

        match write_all {
            Ok(()) => self.infobar.set_message(
                format!("Done! {}", path.display()),
                MessageTone::Success,
            ),
            Err(e) => self
                .infobar
                .set_message(format!("Err: {}", e), MessageTone::Error),
        }
        Ok(())
    }

    fn report_usage(&self) {
        debug!(
            "buffer bytes: {}, filters: {}, manual highlights: {}, cached lines: {}",
            self.file.len(),
            self.fetcher.filter_count(),
            self.fetcher.highlighted_count(),
            self.buffer.lines().len(),
        );
    }

    fn draw_waiting(&mut self) -> Result<()> {
        let mut rows = Vec::new();
        let banner = "Waiting log data...";
        for row in 0..self.height {
            if row == self.height / 2 {
                let pad = (self.width as usize).saturating_sub(banner.len()) / 2;
                rows.push(RtLine::from(vec![
                    Span::raw(" ".repeat(pad)),
                    Span::styled(banner, Style::default().fg(Color::Yellow)),
                ]));
            } else {
                rows.push(RtLine::default());
            }
        }
        let (infobar, cursor) = self.infobar.render(self.width, &self.status_context());
        self.screen.draw(&ScreenFrame {
            rows,
            infobar,
            cursor: cursor.map(|x| (x, self.height)),
        })
    }

    fn status_context(&self) -> StatusContext {
        StatusContext {
            current_line: self.buffer.current_pos().line,
            total_lines: self.total_lines,
            filters_enabled: self.fetcher.filters_enabled(),
            has_filters: self.fetcher.filter_count() > 0,
        }
    }

    fn draw(&mut self) -> Result<()> {
        let rows = self.build_rows();
        let (infobar, cursor) = self.infobar.render(self.width, &self.status_context());
        self.screen.draw(&ScreenFrame {
            rows,
            infobar,
            cursor: cursor.map(|x| (x, self.height)),
        })
    }

    /// Lay the cached window out into styled terminal rows.
    fn build_rows(&self) -> Vec<RtLine<'static>> {
        let search = if self.search.is_empty() {
            None
        } else {
            search_fn(self.search_kind, &self.search).ok()
        };

        let mut rows = Vec::new();
        for line in self.buffer.lines() {
            let (chars, attrs) = strip_timestamp(&line.text.chars, &line.text.attrs);
            let (chars, attrs) = self.apply_keep_chars(chars, attrs);
            let matches = search
                .as_ref()
                .map(|f| index_all(f, &chars))
                .unwrap_or_default();
            self.layout_line(&chars, &attrs, &matches, line.highlighted, &mut rows);
            if rows.len() >= self.height as usize && self.direction == Direction::Up {
                break;
            }
        }

        let height = self.height as usize;
        if rows.len() > height {
            match self.direction {
                Direction::Up => rows.truncate(height),
                Direction::Down => {
                    rows.drain(..rows.len() - height);
                }
            }
        }
        rows
    }

    /// Freeze the first `keep_chars` columns and scroll the rest by the
    /// horizontal offset. The frozen prefix is recolored blue.
    fn apply_keep_chars(
        &self,
        chars: Vec<char>,
        attrs: Vec<CharAttr>,
    ) -> (Vec<char>, Vec<CharAttr>) {
        if self.keep_chars == 0 || self.wrap {
            let from = self.h_offset.min(chars.len());
            return (chars[from..].to_vec(), attrs[from..].to_vec());
        }

        let len = chars.len();
        let (chars, mut attrs) = if len > self.keep_chars {
            let mut kept_chars = chars[..self.keep_chars].to_vec();
            let mut kept_attrs = attrs[..self.keep_chars].to_vec();
            let rest_from = (self.keep_chars + self.h_offset).min(len);
            kept_chars.extend_from_slice(&chars[rest_from..]);
            kept_attrs.extend_from_slice(&attrs[rest_from..]);
            (kept_chars, kept_attrs)
        } else {
            (chars, attrs)
        };

        let frozen = self.keep_chars.min(chars.len());
        for attr in attrs.iter_mut().take(frozen) {
            attr.fg = AnsiColor::Base(4);
        }
        (chars, attrs)
    }

    /// Convert one logical line into one or more display rows, applying
    /// search-match reversal and line-highlight underlining.
    fn layout_line(
        &self,
        chars: &[char],
        attrs: &[CharAttr],
        matches: &[(usize, usize)],
        highlighted: bool,
        rows: &mut Vec<RtLine<'static>>,
    ) {
        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut run = String::new();
        let mut run_style = Style::default();
        let mut column = 0usize;

        let flush = |spans: &mut Vec<Span<'static>>, run: &mut String, style: Style| {
            if !run.is_empty() {
                spans.push(Span::styled(std::mem::take(run), style));
            }
        };

        for (i, &ch) in chars.iter().enumerate() {
            let mut style = style_for(&attrs[i]);
            if matches.iter().any(|&(s, e)| i >= s && i < e) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            if highlighted {
                style = style.add_modifier(Modifier::UNDERLINED).bg(Color::Yellow);
            }

            if style != run_style {
                flush(&mut spans, &mut run, run_style);
                run_style = style;
            }
            run.push(ch);
            column += ch.width().unwrap_or(0);

            if column >= self.width as usize {
                flush(&mut spans, &mut run, run_style);
                rows.push(RtLine::from(std::mem::take(&mut spans)));
                if !self.wrap {
                    return;
                }
                column = 0;
            }
        }
        flush(&mut spans, &mut run, run_style);
        // A line ending exactly on the wrap boundary already produced its
        // row; empty input still occupies one.
        if !spans.is_empty() || chars.is_empty() {
            rows.push(RtLine::from(spans));
        }
    }
}

/// Drop the leading space-delimited token (the record timestamp) from a
/// decoded line.
fn strip_timestamp(chars: &[char], attrs: &[CharAttr]) -> (Vec<char>, Vec<CharAttr>) {
    match chars.iter().position(|&c| c == ' ') {
        Some(i) if i > 0 => (chars[i + 1..].to_vec(), attrs[i + 1..].to_vec()),
        _ => (chars.to_vec(), attrs.to_vec()),
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Background worker: keep the status line's total current, backing off
/// exponentially while idle and resetting on activity.
async fn status_updater(
    fetcher: Arc<Fetcher>,
    tx: mpsc::Sender<LineNo>,
    mut reset_rx: mpsc::Receiver<()>,
    token: CancellationToken,
) {
    let mut delay = Duration::from_millis(10);
    let mut last = Pos::ZERO;
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            Some(()) = reset_rx.recv() => {
                last = Pos::ZERO;
                delay = Duration::from_millis(5);
            }
            _ = tokio::time::sleep(delay) => {
                let previous = last;
                last = fetcher.advance_lines(last);
                if last != previous {
                    if tx.send(last.line.unwrap_or(0)).await.is_err() {
                        return;
                    }
                    delay = Duration::from_millis(5);
                } else {
                    delay = (delay * 2).min(Duration::from_millis(4000));
                }
            }
        }
    }
}

/// Background worker: poll the live write offset and request a refill when
/// fresh tail bytes arrive.
async fn follow_watcher(
    fetcher: Arc<Fetcher>,
    tx: mpsc::Sender<()>,
    token: CancellationToken,
) {
    let mut last = fetcher.last_write_offset();
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                let current = fetcher.last_write_offset();
                if current != last {
                    last = current;
                    if tx.try_send(()).is_err() && tx.is_closed() {
                        return;
                    }
                }
            }
        }
    }
}

/// Background worker: nudge the screen once data first lands so the
/// "waiting" banner is replaced even if no other interrupt fires.
async fn empty_buffer_guard(
    fetcher: Arc<Fetcher>,
    tx: mpsc::Sender<()>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_millis(200)) => {
                if fetcher.last_offset() > 0 {
                    let _ = tx.try_send(());
                    return;
                }
            }
        }
    }
}
