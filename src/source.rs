//! Abstract container-log transport.
//!
//! A [`LogSource`] knows how to list the daemon's containers and open a
//! demultiplexed, framed log stream over a time window. The production
//! implementation is [`DockerSource`]; tests drive the engine with an
//! in-memory source built on the same framing primitives.

pub mod docker;
pub mod framing;

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub use docker::DockerSource;
pub use framing::{encode_frame, frame_stream, FramedReader, LogFrame, StreamKind};

/// A running workload managed by the container daemon.
///
/// The set is captured once at startup and treated as immutable for the
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

/// Options for [`LogSource::open_window`].
///
/// `since`/`until` are unix seconds; `until` is exclusive. `tail` limits the
/// window to its last N records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub timestamps: bool,
    pub follow: bool,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub tail: Option<usize>,
}

impl WindowOptions {
    /// Both streams with timestamped records: the shape every engine request
    /// uses.
    pub fn timestamped() -> Self {
        Self {
            stdout: true,
            stderr: true,
            timestamps: true,
            ..Self::default()
        }
    }
}

/// Stream of demultiplexed log frames for one window.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<LogFrame>> + Send>>;

/// Container-log transport: list containers, open framed log windows.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// One-shot snapshot of running containers.
    async fn list(&self) -> Result<Vec<Container>>;

    /// Open a log stream for `container_id` over the window described by
    /// `options`.
    async fn open_window(&self, container_id: &str, options: WindowOptions) -> Result<FrameStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamped_options_select_both_streams() {
        let opts = WindowOptions::timestamped();
        assert!(opts.stdout && opts.stderr && opts.timestamps);
        assert!(!opts.follow);
        assert_eq!(opts.since, None);
        assert_eq!(opts.until, None);
        assert_eq!(opts.tail, None);
    }
}
