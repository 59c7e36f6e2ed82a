//! Shared in-memory fixtures for unit tests.

use crate::error::Result;
use crate::source::{
    encode_frame, frame_stream, Container, FrameStream, LogFrame, LogSource, StreamKind,
    WindowOptions,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};

/// Format a timestamped record the way a daemon with `timestamps` on would.
pub fn record(unix: i64, payload: &str) -> String {
    let ts = Utc
        .timestamp_opt(unix, 0)
        .unwrap()
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("{} {}\n", ts, payload)
}

/// In-memory [`LogSource`] serving a fixed set of timestamped records
/// through the real wire codec. Follow streams stay open (pending) until
/// cancelled, like a live daemon connection.
pub struct MemorySource {
    records: Vec<(i64, String)>,
    containers: Vec<Container>,
}

impl MemorySource {
    pub fn new(records: Vec<(i64, String)>) -> Self {
        Self {
            records,
            containers: vec![Container {
                id: "0123456789abcdef".to_string(),
                name: "web".to_string(),
            }],
        }
    }

    pub fn with_containers(mut self, containers: Vec<Container>) -> Self {
        self.containers = containers;
        self
    }

    fn window_bytes(&self, options: &WindowOptions) -> Vec<u8> {
        let mut selected: Vec<&(i64, String)> = self
            .records
            .iter()
            .filter(|(t, _)| {
                options.since.map_or(true, |s| *t >= s) && options.until.map_or(true, |u| *t < u)
            })
            .collect();
        if let Some(tail) = options.tail {
            let skip = selected.len().saturating_sub(tail);
            selected.drain(..skip);
        }
        let mut wire = Vec::new();
        for (t, payload) in selected {
            wire.extend(encode_frame(
                StreamKind::Stdout,
                record(*t, payload).as_bytes(),
            ));
        }
        wire
    }
}

#[async_trait]
impl LogSource for MemorySource {
    async fn list(&self) -> Result<Vec<Container>> {
        Ok(self.containers.clone())
    }

    async fn open_window(&self, _id: &str, options: WindowOptions) -> Result<FrameStream> {
        let wire = self.window_bytes(&options);
        let decoded = frame_stream(std::io::Cursor::new(wire));
        if options.follow {
            let pending = futures::stream::pending::<Result<LogFrame>>();
            Ok(Box::pin(futures::StreamExt::chain(decoded, pending)))
        } else {
            Ok(Box::pin(decoded))
        }
    }
}
