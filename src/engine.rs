//! Log acquisition engine: follow-from-tail plus historical back-fill.
//!
//! The engine populates the shared [`ByteFile`] with a time-ordered slice of
//! one container's log. `follow` synchronously seeds the last N records,
//! parses the seed's time bounds, then spawns a follower task that appends
//! records newer than the seed. `start_backfill` spawns a second task that
//! pages backwards in fixed time windows, prepending each window. Both tasks
//! observe a cancellation token derived per container run; a container
//! switch is cancel → wait → clear → re-follow.
//!
//! Transient retrieve failures end their own direction only: the error is
//! logged and the other direction keeps running.

use crate::buffer::ByteFile;
use crate::error::{DlogError, Result};
use crate::source::{Container, LogSource, StreamKind, WindowOptions};
use chrono::DateTime;
use futures::StreamExt;
use log::debug;
use memchr::{memchr, memrchr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Orchestrates the follower and back-filler for the selected container.
pub struct LogEngine {
    source: Arc<dyn LogSource>,
    file: Arc<ByteFile>,
    containers: Vec<Container>,
    current: usize,
    time_shift: i64,
    root: CancellationToken,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LogEngine {
    /// Snapshot the daemon's containers and prepare an idle engine.
    ///
    /// Fails when the daemon reports no running containers.
    pub async fn new(
        source: Arc<dyn LogSource>,
        file: Arc<ByteFile>,
        root: CancellationToken,
        time_shift: i64,
    ) -> Result<Self> {
        let containers = source.list().await?;
        if containers.is_empty() {
            return Err(DlogError::source_unavailable("no running containers"));
        }
        let token = root.child_token();
        Ok(Self {
            source,
            file,
            containers,
            current: 0,
            time_shift,
            root,
            token,
            tasks: Vec::new(),
        })
    }

    pub fn current_container(&self) -> &Container {
        &self.containers[self.current]
    }

    /// Status-bar title: `(i/n) name (ID:first12)`.
    pub fn title(&self) -> String {
        let c = self.current_container();
        let short_id = &c.id[..c.id.len().min(12)];
        format!(
            "({}/{}) {} (ID:{})",
            self.current + 1,
            self.containers.len(),
            c.name,
            short_id
        )
    }

    /// Advance the selection to the next container, wrapping around.
    pub fn select_next(&mut self) {
        self.current = (self.current + 1) % self.containers.len();
    }

    /// Move the selection to the previous container, wrapping around.
    pub fn select_prev(&mut self) {
        self.current = self
            .current
            .checked_sub(1)
            .unwrap_or(self.containers.len() - 1);
    }

    /// Seed the byte file with the last `height` records and start the live
    /// follower. Returns the unix timestamp of the seed's first record, the
    /// low-water mark back-fill continues from.
    pub async fn follow(&mut self, height: usize) -> Result<i64> {
        self.token = self.root.child_token();

        debug!("requesting {} seed records", height);
        let (bytes, start, end) = self
            .retrieve_and_parse(WindowOptions {
                tail: Some(height),
                ..WindowOptions::timestamped()
            })
            .await?;
        self.file.prepend(&bytes);

        debug!("spawning follower from {}", end + 1);
        let source = Arc::clone(&self.source);
        let file = Arc::clone(&self.file);
        let id = self.current_container().id.clone();
        let token = self.token.clone();
        self.tasks.push(tokio::spawn(async move {
            follow_from(source, file, id, end, token).await;
        }));

        Ok(start)
    }

    /// Start paging history backwards from `start`, prepending one window of
    /// `time_shift` seconds per iteration. `on_window` runs after each
    /// successful prepend (the viewer uses it to request a redraw).
    pub fn start_backfill(&mut self, start: i64, on_window: impl Fn() + Send + Sync + 'static) {
        debug!("spawning back-fill below {}", start);
        let source = Arc::clone(&self.source);
        let file = Arc::clone(&self.file);
        let id = self.current_container().id.clone();
        let token = self.token.clone();
        let time_shift = self.time_shift;
        self.tasks.push(tokio::spawn(async move {
            append_since(source, file, id, start, time_shift, token, on_window).await;
        }));
    }

    /// Cancel the current run and wait for both directions to drain.
    pub async fn cancel_and_wait(&mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }

    /// Fetch one window into a scratch buffer. [`DlogError::RetrieveEmpty`]
    /// when the window holds no records.
    async fn retrieve(&self, options: WindowOptions) -> Result<Vec<u8>> {
        let stream = self
            .source
            .open_window(&self.current_container().id, options)
            .await?;
        drain_window(stream, &self.token).await
    }

    /// Fetch one window and parse its time bounds: the first record's
    /// timestamp and the last complete record's timestamp.
    async fn retrieve_and_parse(&self, options: WindowOptions) -> Result<(Vec<u8>, i64, i64)> {
        let bytes = self.retrieve(options).await?;
        let (start, end) = parse_window_bounds(&bytes)?;
        Ok((bytes, start, end))
    }
}

/// Collect every frame of a non-follow window into one byte buffer.
async fn drain_window(
    mut stream: crate::source::FrameStream,
    token: &CancellationToken,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    loop {
        tokio::select! {
            _ = token.cancelled() => return Err(DlogError::Closed),
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    if frame.kind != StreamKind::Stdin {
                        bytes.extend_from_slice(&frame.bytes);
                    }
                }
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }
    if bytes.is_empty() {
        return Err(DlogError::RetrieveEmpty);
    }
    Ok(bytes)
}

/// Live follower: stream records newer than `end` into the byte file.
async fn follow_from(
    source: Arc<dyn LogSource>,
    file: Arc<ByteFile>,
    container_id: String,
    end: i64,
    token: CancellationToken,
) {
    let options = WindowOptions {
        follow: true,
        since: Some(end + 1),
        ..WindowOptions::timestamped()
    };
    let mut stream = match source.open_window(&container_id, options).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!("follower failed to open stream: {}", e);
            return;
        }
    };

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    if frame.kind != StreamKind::Stdin {
                        file.append(&frame.bytes);
                    }
                }
                Some(Err(e)) => {
                    debug!("follower stream error: {}", e);
                    return;
                }
                None => return,
            },
        }
    }
}

/// Back-filler: page backwards in `time_shift`-second windows, prepending
/// each one, until a window comes back empty or the run is cancelled.
async fn append_since(
    source: Arc<dyn LogSource>,
    file: Arc<ByteFile>,
    container_id: String,
    start: i64,
    time_shift: i64,
    token: CancellationToken,
    on_window: impl Fn(),
) {
    let mut end = start - 1;
    loop {
        if token.is_cancelled() {
            return;
        }
        let window_start = end - time_shift;
        debug!("back-fill window [{}, {}]", window_start, end);

        let options = WindowOptions {
            since: Some(window_start),
            until: Some(end),
            ..WindowOptions::timestamped()
        };
        let stream = match source.open_window(&container_id, options).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!("back-fill failed to open window: {}", e);
                return;
            }
        };
        match drain_window(stream, &token).await {
            Ok(bytes) => {
                file.prepend(&bytes);
                on_window();
            }
            Err(e) => {
                // RetrieveEmpty marks the end of retained history; anything
                // else is a transient failure. Both stop this direction only.
                debug!("back-fill stopped: {}", e);
                return;
            }
        }
        end = window_start - 1;
    }
}

/// Parse the seed window's time bounds.
///
/// `start` comes from the first record's leading RFC3339 token. `end` comes
/// from the last complete record: the final line may be a partial write, so
/// the scan walks right-to-left to the second newline from the end and takes
/// the token after it.
fn parse_window_bounds(bytes: &[u8]) -> Result<(i64, i64)> {
    let first_newline = memchr(b'\n', bytes)
        .ok_or_else(|| DlogError::bad_timestamp(String::from_utf8_lossy(bytes).into_owned()))?;
    let start = parse_leading_timestamp(&bytes[..first_newline])?;

    let last_newline = memrchr(b'\n', bytes).expect("a newline was found above");
    let penultimate_start = if last_newline == 0 {
        0
    } else {
        memrchr(b'\n', &bytes[..last_newline - 1])
            .map(|i| i + 1)
            .unwrap_or(0)
    };
    let end = parse_leading_timestamp(&bytes[penultimate_start..])?;

    Ok((start, end))
}

/// Parse the RFC3339 token before the first space of a record.
fn parse_leading_timestamp(record: &[u8]) -> Result<i64> {
    let token_end = memchr(b' ', record).unwrap_or(record.len());
    let token = std::str::from_utf8(&record[..token_end])
        .map_err(|_| DlogError::bad_timestamp(String::from_utf8_lossy(record).into_owned()))?;
    let token = token.trim_end_matches('\n');
    DateTime::parse_from_rfc3339(token)
        .map(|dt| dt.timestamp())
        .map_err(|_| DlogError::bad_timestamp(token.to_string()))
}
