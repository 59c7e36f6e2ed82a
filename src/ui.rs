//! Terminal user interface: event loop, scroll buffer, infobar, rendering.
//!
//! The viewer owns a single-threaded event loop over the terminal; background
//! tasks never touch the screen and communicate through typed channels that
//! the loop multiplexes alongside terminal events.

pub mod history;
pub mod infobar;
pub mod screen;
pub mod view_buffer;
pub mod viewer;

pub use infobar::{InfoBar, InputMode};
pub use screen::{Screen, ScreenFrame, TermScreen};
pub use view_buffer::ViewBuffer;
pub use viewer::Viewer;
