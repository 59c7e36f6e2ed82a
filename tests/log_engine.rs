use async_trait::async_trait;
use chrono::{SecondsFormat, TimeZone, Utc};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use dlog::source::{
    encode_frame, frame_stream, Container, FrameStream, LogFrame, LogSource, StreamKind,
    WindowOptions,
};
use dlog::{ByteFile, LogEngine, Result};

const BASE: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z
const TIMEOUT_MS: u64 = 1000;

fn record(unix: i64, payload: &str) -> String {
    let ts = Utc
        .timestamp_opt(unix, 0)
        .unwrap()
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    format!("{} {}\n", ts, payload)
}

/// Scripted daemon: serves fixed records for window requests and exposes a
/// push channel for records produced while a follow stream is open.
struct ScriptedDaemon {
    records: Vec<(i64, String)>,
    containers: Vec<Container>,
    live: Mutex<Option<mpsc::UnboundedReceiver<LogFrame>>>,
}

impl ScriptedDaemon {
    fn new(records: Vec<(i64, String)>) -> Self {
        Self {
            records,
            containers: vec![
                Container {
                    id: "aaaaaaaaaaaaaaaa".into(),
                    name: "alpha".into(),
                },
                Container {
                    id: "bbbbbbbbbbbbbbbb".into(),
                    name: "beta".into(),
                },
            ],
            live: Mutex::new(None),
        }
    }

    fn with_live(records: Vec<(i64, String)>) -> (Self, mpsc::UnboundedSender<LogFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let daemon = Self::new(records);
        *daemon.live.lock().unwrap() = Some(rx);
        (daemon, tx)
    }

    fn window_wire(&self, options: &WindowOptions) -> Vec<u8> {
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
impl LogSource for ScriptedDaemon {
    async fn list(&self) -> Result<Vec<Container>> {
        Ok(self.containers.clone())
    }

    async fn open_window(&self, _id: &str, options: WindowOptions) -> Result<FrameStream> {
        let decoded = frame_stream(std::io::Cursor::new(self.window_wire(&options)));
        if options.follow {
            if let Some(live) = self.live.lock().unwrap().take() {
                let live = tokio_stream_from(live);
                return Ok(Box::pin(decoded.chain(live)));
            }
            let pending = futures::stream::pending();
            return Ok(Box::pin(decoded.chain(pending)));
        }
        Ok(Box::pin(decoded))
    }
}

fn tokio_stream_from(
    mut rx: mpsc::UnboundedReceiver<LogFrame>,
) -> impl futures::Stream<Item = Result<LogFrame>> + Send {
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx).map(|f| f.map(Ok)))
}

fn contents(file: &ByteFile) -> Vec<String> {
    String::from_utf8(file.snapshot().to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

async fn wait_for_lines(file: &Arc<ByteFile>, at_least: usize) {
    timeout(Duration::from_millis(TIMEOUT_MS), async {
        while contents(file).len() < at_least {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("expected line count never reached");
}

#[tokio::test]
async fn follow_seeds_the_tail_window() {
    let records = (0..20).map(|i| (BASE + i, format!("msg {}", i))).collect();
    let source = Arc::new(ScriptedDaemon::new(records));
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), 86_400)
        .await
        .unwrap();

    let start = engine.follow(5).await.unwrap();
    assert_eq!(start, BASE + 15);

    let lines = contents(&file);
    assert_eq!(lines.len(), 5);
    assert!(lines[0].ends_with("msg 15"));
    assert!(lines[4].ends_with("msg 19"));

    engine.cancel_and_wait().await;
}

#[tokio::test]
async fn follower_appends_live_records() {
    let records = vec![(BASE, "seed".to_string())];
    let (daemon, live_tx) = ScriptedDaemon::with_live(records);
    let source = Arc::new(daemon);
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), 86_400)
        .await
        .unwrap();

    engine.follow(5).await.unwrap();

    live_tx
        .send(LogFrame::stdout(record(BASE + 10, "fresh").into_bytes()))
        .unwrap();
    wait_for_lines(&file, 2).await;

    let lines = contents(&file);
    assert!(lines[0].ends_with("seed"));
    assert!(lines[1].ends_with("fresh"));

    engine.cancel_and_wait().await;
}

#[tokio::test]
async fn backfill_walks_history_and_stops_quietly_on_empty() {
    // History spans three back-fill windows; the fourth is empty.
    let shift = 100i64;
    let records = vec![
        (BASE - 250, "oldest".to_string()),
        (BASE - 150, "older".to_string()),
        (BASE - 50, "old".to_string()),
        (BASE, "seed".to_string()),
    ];
    let source = Arc::new(ScriptedDaemon::new(records));
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), shift)
        .await
        .unwrap();

    let start = engine.follow(1).await.unwrap();
    let windows = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&windows);
    engine.start_backfill(start, move || {
        *counter.lock().unwrap() += 1;
    });

    wait_for_lines(&file, 4).await;
    engine.cancel_and_wait().await;

    let lines = contents(&file);
    assert!(lines[0].ends_with("oldest"));
    assert!(lines[1].ends_with("older"));
    assert!(lines[2].ends_with("old"));
    assert!(lines[3].ends_with("seed"));
    assert!(*windows.lock().unwrap() >= 3);
}

#[tokio::test]
async fn backfill_respects_noload_style_absence() {
    // Without start_backfill, only the seed window lands.
    let records = vec![(BASE - 500, "history".to_string()), (BASE, "seed".to_string())];
    let source = Arc::new(ScriptedDaemon::new(records));
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), 86_400)
        .await
        .unwrap();

    engine.follow(1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.cancel_and_wait().await;

    let lines = contents(&file);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("seed"));
}

#[tokio::test]
async fn container_switch_cancels_clears_and_restarts() {
    let records = (0..3).map(|i| (BASE + i, format!("msg {}", i))).collect();
    let source = Arc::new(ScriptedDaemon::new(records));
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), 86_400)
        .await
        .unwrap();

    engine.follow(3).await.unwrap();
    assert_eq!(engine.title(), "(1/2) alpha (ID:aaaaaaaaaaaa)");
    assert_eq!(contents(&file).len(), 3);

    // The switch protocol: cancel and wait, clear, advance, re-follow.
    engine.cancel_and_wait().await;
    file.clear();
    engine.select_next();
    assert_eq!(engine.title(), "(2/2) beta (ID:bbbbbbbbbbbb)");

    engine.follow(3).await.unwrap();
    assert_eq!(contents(&file).len(), 3);
    engine.cancel_and_wait().await;

    engine.select_next();
    assert_eq!(engine.title(), "(1/2) alpha (ID:aaaaaaaaaaaa)", "selection wraps");
}

#[tokio::test]
async fn empty_container_surfaces_retrieve_empty() {
    let source = Arc::new(ScriptedDaemon::new(Vec::new()));
    let file = Arc::new(ByteFile::default());
    let mut engine = LogEngine::new(source, Arc::clone(&file), CancellationToken::new(), 86_400)
        .await
        .unwrap();

    let err = engine.follow(5).await.unwrap_err();
    assert!(matches!(err, dlog::DlogError::RetrieveEmpty));
    assert!(file.is_empty());
    engine.cancel_and_wait().await;
}
