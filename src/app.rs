//! Application assembly: wire the byte file, engine, fetcher, and viewer
//! together and hand control to the event loop.

use crate::buffer::ByteFile;
use crate::config::Config;
use crate::engine::LogEngine;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::source::LogSource;
use crate::ui::history::History;
use crate::ui::{InfoBar, TermScreen, Viewer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Owns nothing after startup: builds the component graph and runs the
/// viewer until quit.
pub struct Application;

impl Application {
    pub async fn run(source: Arc<dyn LogSource>, config: Config) -> Result<()> {
        let token = CancellationToken::new();
        let file = Arc::new(ByteFile::default());
        let engine = LogEngine::new(
            Arc::clone(&source),
            Arc::clone(&file),
            token.clone(),
            config.time_shift,
        )
        .await?;
        let fetcher = Arc::new(Fetcher::new(Arc::clone(&file)));
        let infobar = InfoBar::new(History::open_default());
        let screen = TermScreen::new();

        let viewer = Viewer::new(screen, file, fetcher, engine, infobar, config, token);
        viewer.run().await
    }
}
