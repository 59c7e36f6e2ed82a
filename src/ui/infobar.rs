//! Infobar: the status line and its modal input editor.
//!
//! The bottom row of the screen is either a status display (container title,
//! current/total lines, filter state) or an editor for one of the input
//! modes: searches, filters, save path, and the keep-chars count. Editing
//! supports cursor movement, word navigation and deletion, history recall,
//! and toggling between case-sensitive and regex matching.

use crate::filter::SearchKind;
use crate::ui::history::History;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Color, Style};
use ratatui::text::{Line as RtLine, Span};
use unicode_width::UnicodeWidthStr;

/// What the infobar is currently showing or editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Status,
    Search,
    BackSearch,
    Filter,
    Append,
    Exclude,
    Highlight,
    Save,
    Message,
    KeepChars,
}

impl InputMode {
    fn prompt(self) -> Option<char> {
        match self {
            InputMode::Search => Some('/'),
            InputMode::BackSearch => Some('?'),
            InputMode::Filter => Some('&'),
            InputMode::Append => Some('+'),
            InputMode::Exclude => Some('-'),
            InputMode::Highlight => Some('~'),
            InputMode::Save => Some('>'),
            InputMode::KeepChars => Some('K'),
            InputMode::Status | InputMode::Message => None,
        }
    }

    fn uses_patterns(self) -> bool {
        matches!(
            self,
            InputMode::Search
                | InputMode::BackSearch
                | InputMode::Filter
                | InputMode::Append
                | InputMode::Exclude
                | InputMode::Highlight
        )
    }

    /// Save paths and keep-chars counts never enter the input history.
    fn records_history(self) -> bool {
        self.uses_patterns()
    }
}

/// Color of a transient infobar message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTone {
    Info,
    Success,
    Error,
}

impl MessageTone {
    fn color(self) -> Color {
        match self {
            MessageTone::Info => Color::Yellow,
            MessageTone::Success => Color::Green,
            MessageTone::Error => Color::Red,
        }
    }
}

/// Outcome of feeding one key event to the infobar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoBarEvent {
    None,
    /// Editing ended (Esc); focus returns to the main view.
    Cancelled,
    /// Enter committed the buffer for the given mode.
    Commit {
        mode: InputMode,
        input: Vec<char>,
        kind: SearchKind,
    },
    /// Keep-chars adjustment from Up/Down while in keep-chars mode.
    KeepCharsDelta(i64),
}

/// Status fields the viewer supplies at render time.
#[derive(Debug, Default)]
pub struct StatusContext {
    pub current_line: Option<u64>,
    pub total_lines: u64,
    pub filters_enabled: bool,
    pub has_filters: bool,
}

/// The infobar state machine.
pub struct InfoBar {
    mode: InputMode,
    buffer: Vec<char>,
    cursor: usize,
    search_kind: SearchKind,
    history: History,
    message: Option<(String, MessageTone)>,
    title: String,
}

impl InfoBar {
    pub fn new(history: History) -> Self {
        Self {
            mode: InputMode::Status,
            buffer: Vec::new(),
            cursor: 0,
            search_kind: SearchKind::CaseSensitive,
            history,
            message: None,
            title: String::new(),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn search_kind(&self) -> SearchKind {
        self.search_kind
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
    }

    /// Begin editing in `mode`. Keep-chars mode starts from the current
    /// count so Up/Down and digits both work on it.
    pub fn enter(&mut self, mode: InputMode, keep_chars: usize) {
        self.mode = mode;
        self.message = None;
        self.buffer.clear();
        if mode == InputMode::KeepChars {
            self.buffer = keep_chars.to_string().chars().collect();
        }
        self.cursor = self.buffer.len();
        self.history.reset_cursor();
    }

    /// Drop back to the plain status display.
    pub fn to_status(&mut self) {
        self.mode = InputMode::Status;
        self.message = None;
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Show a transient message until the next user action.
    pub fn set_message(&mut self, text: impl Into<String>, tone: MessageTone) {
        self.mode = InputMode::Message;
        self.message = Some((text.into(), tone));
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Feed one key event to the editor.
    pub fn process_key(&mut self, key: KeyEvent) -> InfoBarEvent {
        if key.modifiers.contains(KeyModifiers::ALT) {
            match key.code {
                KeyCode::Left => self.cursor = self.word_left(),
                KeyCode::Right => self.cursor = self.word_right(),
                KeyCode::Backspace => self.delete_word(false),
                KeyCode::Char('d') => self.delete_word(true),
                _ => {}
            }
            return InfoBarEvent::None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if matches!(key.code, KeyCode::Char('r') | KeyCode::Char('/')) {
                self.toggle_search_kind();
            }
            return InfoBarEvent::None;
        }

        match key.code {
            KeyCode::Char(ch) => {
                self.buffer.insert(self.cursor, ch);
                self.cursor += 1;
                InfoBarEvent::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                }
                InfoBarEvent::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                InfoBarEvent::None
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.buffer.len());
                InfoBarEvent::None
            }
            KeyCode::Up => self.on_vertical(1),
            KeyCode::Down => self.on_vertical(-1),
            KeyCode::Enter => self.commit(),
            KeyCode::Esc => {
                self.to_status();
                InfoBarEvent::Cancelled
            }
            _ => InfoBarEvent::None,
        }
    }

    fn commit(&mut self) -> InfoBarEvent {
        let mode = self.mode;
        let input = std::mem::take(&mut self.buffer);
        if mode.records_history() {
            let text: String = input.iter().collect();
            self.history.add(&text);
        }
        self.to_status();
        InfoBarEvent::Commit {
            mode,
            input,
            kind: self.search_kind,
        }
    }

    fn on_vertical(&mut self, delta: i64) -> InfoBarEvent {
        if self.mode == InputMode::KeepChars {
            return InfoBarEvent::KeepCharsDelta(delta);
        }
        let current: String = self.buffer.iter().collect();
        if let Some(recalled) = self.history.navigate(delta, &current) {
            self.buffer = recalled.chars().collect();
            self.cursor = self.buffer.len();
        }
        InfoBarEvent::None
    }

    fn toggle_search_kind(&mut self) {
        if self.mode.uses_patterns() {
            self.search_kind = self.search_kind.next();
        }
    }

    fn word_left(&self) -> usize {
        let mut i = self.cursor.saturating_sub(2);
        while i > 0 {
            if self.buffer[i] == ' ' {
                return i + 1;
            }
            i -= 1;
        }
        0
    }

    fn word_right(&self) -> usize {
        let mut i = self.cursor + 1;
        while i < self.buffer.len() {
            if self.buffer[i] == ' ' {
                return i;
            }
            i += 1;
        }
        self.buffer.len()
    }

    fn delete_word(&mut self, forward: bool) {
        if forward {
            let mut end = self.word_right();
            if end >= self.buffer.len() {
                end = self.buffer.len();
            }
            self.buffer.drain(self.cursor..end);
        } else {
            let start = self.word_left();
            self.buffer.drain(start..self.cursor);
            self.cursor = start;
        }
    }

    /// Render the infobar row. Returns the styled line plus the cursor
    /// column when an editor is active.
    pub fn render(&self, width: u16, status: &StatusContext) -> (RtLine<'static>, Option<u16>) {
        match self.mode {
            InputMode::Status => (self.render_status(width, status), None),
            InputMode::Message => (self.render_message(), None),
            _ => self.render_editor(width),
        }
    }

    fn render_status(&self, width: u16, status: &StatusContext) -> RtLine<'static> {
        let yellow = Style::default().fg(Color::Yellow);
        let mut left = self.title.clone();
        let mut spans = vec![Span::styled(left.clone(), yellow)];

        if status.has_filters && !status.filters_enabled {
            spans.push(Span::styled(
                " [-FILTERS]",
                Style::default().fg(Color::Magenta),
            ));
            left.push_str(" [-FILTERS]");
        }

        let current = status
            .current_line
            .map(|n| (n + 1).to_string())
            .unwrap_or_else(|| "?".to_string());
        let right = format!("{}/{}", current, status.total_lines);

        let pad = (width as usize)
            .saturating_sub(left.width())
            .saturating_sub(right.width());
        spans.push(Span::raw(" ".repeat(pad)));
        spans.push(Span::styled(right, yellow));
        RtLine::from(spans)
    }

    fn render_message(&self) -> RtLine<'static> {
        let (text, tone) = self
            .message
            .clone()
            .unwrap_or_else(|| (String::new(), MessageTone::Info));
        RtLine::from(vec![
            Span::raw(" "),
            Span::styled(text, Style::default().fg(tone.color())),
        ])
    }

    fn render_editor(&self, width: u16) -> (RtLine<'static>, Option<u16>) {
        let prompt = self.mode.prompt().unwrap_or(' ');
        let prompt_style = if self.mode == InputMode::Save {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(Color::Green)
        };
        let text_color = match (self.mode, self.search_kind) {
            (InputMode::KeepChars | InputMode::Save, _) => Color::Yellow,
            (_, SearchKind::CaseSensitive) => Color::Yellow,
            (_, SearchKind::Regex) => Color::Red,
        };

        let text: String = self.buffer.iter().collect();
        let mut spans = vec![
            Span::styled(prompt.to_string(), prompt_style),
            Span::styled(text.clone(), Style::default().fg(text_color)),
        ];

        if self.mode.uses_patterns() {
            let label = self.search_kind.label();
            let pad = (width as usize)
                .saturating_sub(1 + text.width())
                .saturating_sub(label.width());
            spans.push(Span::raw(" ".repeat(pad)));
            spans.push(Span::styled(
                label.to_string(),
                Style::default().fg(text_color),
            ));
        }

        (RtLine::from(spans), Some(1 + self.cursor as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bar() -> (InfoBar, TempDir) {
        let dir = TempDir::new().unwrap();
        let history = History::with_path(dir.path().join("history"));
        (InfoBar::new(history), dir)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn alt(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::ALT)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_str(bar: &mut InfoBar, s: &str) {
        for ch in s.chars() {
            bar.process_key(key(KeyCode::Char(ch)));
        }
    }

    fn buffer_of(bar: &InfoBar) -> String {
        bar.buffer.iter().collect()
    }

    #[test]
    fn typing_and_commit() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Filter, 0);
        type_str(&mut bar, "error");

        let event = bar.process_key(key(KeyCode::Enter));
        match event {
            InfoBarEvent::Commit { mode, input, kind } => {
                assert_eq!(mode, InputMode::Filter);
                assert_eq!(input.iter().collect::<String>(), "error");
                assert_eq!(kind, SearchKind::CaseSensitive);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(bar.mode(), InputMode::Status);
    }

    #[test]
    fn escape_cancels_back_to_status() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "abc");

        assert_eq!(bar.process_key(key(KeyCode::Esc)), InfoBarEvent::Cancelled);
        assert_eq!(bar.mode(), InputMode::Status);
        assert!(bar.buffer.is_empty());
    }

    #[test]
    fn cursor_editing() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "abd");
        bar.process_key(key(KeyCode::Left));
        type_str(&mut bar, "c");
        assert_eq!(buffer_of(&bar), "abcd");

        bar.process_key(key(KeyCode::Backspace));
        assert_eq!(buffer_of(&bar), "abd");
    }

    #[test]
    fn word_navigation_and_deletion() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "one two three");

        bar.process_key(alt(KeyCode::Left));
        assert_eq!(bar.cursor, 8, "cursor lands after 'two '");

        bar.process_key(alt(KeyCode::Left));
        assert_eq!(bar.cursor, 4);

        bar.process_key(alt(KeyCode::Right));
        assert_eq!(bar.cursor, 7, "cursor lands on the next space");

        bar.process_key(alt(KeyCode::Backspace));
        assert_eq!(buffer_of(&bar), "one  three");
    }

    #[test]
    fn search_kind_toggle_only_in_pattern_modes() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        assert_eq!(bar.search_kind(), SearchKind::CaseSensitive);
        bar.process_key(ctrl('r'));
        assert_eq!(bar.search_kind(), SearchKind::Regex);
        bar.process_key(ctrl('/'));
        assert_eq!(bar.search_kind(), SearchKind::CaseSensitive);

        bar.enter(InputMode::Save, 0);
        bar.process_key(ctrl('r'));
        assert_eq!(bar.search_kind(), SearchKind::CaseSensitive);
    }

    #[test]
    fn history_recall_round_trip() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "first");
        bar.process_key(key(KeyCode::Enter));

        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "draft");
        bar.process_key(key(KeyCode::Up));
        assert_eq!(buffer_of(&bar), "first");
        bar.process_key(key(KeyCode::Down));
        assert_eq!(buffer_of(&bar), "draft");
    }

    #[test]
    fn save_commits_skip_history() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Save, 0);
        type_str(&mut bar, "/tmp/out.log");
        bar.process_key(key(KeyCode::Enter));

        bar.enter(InputMode::Search, 0);
        bar.process_key(key(KeyCode::Up));
        assert_eq!(buffer_of(&bar), "", "save path must not be recalled");
    }

    #[test]
    fn keep_chars_mode_prefills_and_adjusts() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::KeepChars, 12);
        assert_eq!(buffer_of(&bar), "12");

        assert_eq!(
            bar.process_key(key(KeyCode::Up)),
            InfoBarEvent::KeepCharsDelta(1)
        );
        assert_eq!(
            bar.process_key(key(KeyCode::Down)),
            InfoBarEvent::KeepCharsDelta(-1)
        );
    }

    #[test]
    fn status_render_shows_position_and_filter_state() {
        let (mut bar, _dir) = bar();
        bar.set_title("(1/2) web (ID:0123456789ab)".to_string());
        let (line, cursor) = bar.render(
            80,
            &StatusContext {
                current_line: Some(41),
                total_lines: 100,
                filters_enabled: false,
                has_filters: true,
            },
        );
        assert!(cursor.is_none());
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.starts_with("(1/2) web"));
        assert!(text.contains("[-FILTERS]"));
        assert!(text.trim_end().ends_with("42/100"));
    }

    #[test]
    fn editor_render_places_cursor_after_prompt() {
        let (mut bar, _dir) = bar();
        bar.enter(InputMode::Search, 0);
        type_str(&mut bar, "abc");
        let (line, cursor) = bar.render(40, &StatusContext::default());
        assert_eq!(cursor, Some(4));
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.starts_with("/abc"));
        assert!(text.trim_end().ends_with("CaseS"));
    }
}
