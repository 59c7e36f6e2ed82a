//! Terminal screen abstraction and its ratatui implementation.
//!
//! The viewer renders into a [`ScreenFrame`] of styled rows; [`Screen`] is
//! the seam between that logical frame and a real terminal. Tests substitute
//! a capturing implementation.

use crate::ansi::{AnsiColor, CharAttr};
use crate::error::{DlogError, Result};
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line as RtLine;
use ratatui::widgets::Paragraph;
use ratatui::Terminal;
use std::io::{self, Stdout};

/// One fully-rendered frame: the content rows, the infobar row, and an
/// optional cursor position (column, row).
#[derive(Debug, Default)]
pub struct ScreenFrame {
    pub rows: Vec<RtLine<'static>>,
    pub infobar: RtLine<'static>,
    pub cursor: Option<(u16, u16)>,
}

/// Cell-addressable terminal seam.
pub trait Screen {
    fn init(&mut self) -> Result<()>;
    fn cleanup(&mut self) -> Result<()>;
    fn size(&self) -> Result<(u16, u16)>;
    fn draw(&mut self, frame: &ScreenFrame) -> Result<()>;
}

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Production screen on the ratatui/crossterm stack: raw mode plus alternate
/// screen, restored on drop.
pub struct TermScreen {
    terminal: Option<CrosstermTerminal>,
}

impl TermScreen {
    pub fn new() -> Self {
        Self { terminal: None }
    }
}

impl Default for TermScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for TermScreen {
    fn init(&mut self) -> Result<()> {
        enable_raw_mode().map_err(|e| DlogError::terminal(e.to_string()))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(|e| DlogError::terminal(e.to_string()))?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(|e| DlogError::terminal(e.to_string()))?;
        self.terminal = Some(terminal);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            disable_raw_mode().map_err(|e| DlogError::terminal(e.to_string()))?;
            execute!(io::stdout(), LeaveAlternateScreen)
                .map_err(|e| DlogError::terminal(e.to_string()))?;
            self.terminal = None;
        }
        Ok(())
    }

    fn size(&self) -> Result<(u16, u16)> {
        let size =
            ratatui::crossterm::terminal::size().map_err(|e| DlogError::terminal(e.to_string()))?;
        Ok(size)
    }

    fn draw(&mut self, frame: &ScreenFrame) -> Result<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };
        terminal
            .draw(|f| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(0), Constraint::Length(1)])
                    .split(f.area());

                f.render_widget(Paragraph::new(frame.rows.clone()), chunks[0]);
                f.render_widget(Paragraph::new(frame.infobar.clone()), chunks[1]);

                if let Some((x, y)) = frame.cursor {
                    f.set_cursor_position((x, y));
                }
            })
            .map_err(|e| DlogError::terminal(e.to_string()))?;
        Ok(())
    }
}

impl Drop for TermScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Map decoded SGR attributes onto a ratatui style.
///
/// 3-bit colors map to the terminal's 8 base colors; bold shifts the
/// foreground into the bright range while staying bold.
pub fn style_for(attr: &CharAttr) -> Style {
    let mut style = Style::default();
    style = match to_color(attr.fg, attr.bold) {
        Some(c) => style.fg(c),
        None => style,
    };
    style = match to_color(attr.bg, false) {
        Some(c) => style.bg(c),
        None => style,
    };
    if attr.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if attr.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if attr.reverse {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

fn to_color(color: AnsiColor, brighten: bool) -> Option<Color> {
    match color {
        AnsiColor::Default => None,
        AnsiColor::Base(n) => Some(Color::Indexed(if brighten { n + 8 } else { n })),
        AnsiColor::Bright(n) => Some(Color::Indexed(n + 8)),
        AnsiColor::Indexed(n) => Some(Color::Indexed(n)),
    }
}
