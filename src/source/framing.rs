//! Framed multiplexed stream codec.
//!
//! Container daemons multiplex stdout and stderr over one connection using an
//! 8-byte header per frame: `[kind, 0, 0, 0, len_be32]` followed by `len`
//! payload bytes. Kind 1 is stdout, 2 is stderr, 0 is stdin (never produced
//! by a log endpoint but tolerated). [`FramedReader`] decodes this wire
//! format from any async byte reader; [`encode_frame`] produces it for the
//! in-memory test source.

use crate::error::{DlogError, Result};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

const HEADER_LEN: usize = 8;

/// Which multiplexed stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    fn from_wire(code: u8) -> Result<Self> {
        match code {
            0 => Ok(StreamKind::Stdin),
            1 => Ok(StreamKind::Stdout),
            2 => Ok(StreamKind::Stderr),
            other => Err(DlogError::other(format!("unknown stream kind {other}"))),
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }
}

/// One demultiplexed frame: the stream it came from and its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub kind: StreamKind,
    pub bytes: Vec<u8>,
}

impl LogFrame {
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stdout,
            bytes: bytes.into(),
        }
    }

    pub fn stderr(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: StreamKind::Stderr,
            bytes: bytes.into(),
        }
    }
}

/// Encode a frame in wire format. Used by tests and in-memory sources.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(kind.to_wire());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decoder for the framed wire format over any async reader.
pub struct FramedReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the next frame. `Ok(None)` on a clean end of stream (EOF on a
    /// frame boundary); [`DlogError::Closed`] when the stream ends inside a
    /// header or payload.
    pub async fn next_frame(&mut self) -> Result<Option<LogFrame>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self
                .reader
                .read(&mut header[filled..])
                .await
                .map_err(|e| DlogError::io("frame header read failed", e))?;
            if n == 0 {
                // EOF on a frame boundary is a clean end; inside a header it
                // means the stream was torn down mid-frame.
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(DlogError::Closed)
                };
            }
            filled += n;
        }

        let kind = StreamKind::from_wire(header[0])?;
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let mut bytes = vec![0u8; len];
        self.reader
            .read_exact(&mut bytes)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => DlogError::Closed,
                _ => DlogError::io("frame payload read failed", e),
            })?;

        Ok(Some(LogFrame { kind, bytes }))
    }
}

/// Adapt a raw byte reader into a stream of frames.
pub fn frame_stream<R>(reader: R) -> impl Stream<Item = Result<LogFrame>> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    futures::stream::try_unfold(FramedReader::new(reader), |mut framed| async move {
        let frame = framed.next_frame().await?;
        Ok(frame.map(|f| (f, framed)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn decodes_interleaved_frames() {
        let mut wire = encode_frame(StreamKind::Stdout, b"out line\n");
        wire.extend(encode_frame(StreamKind::Stderr, b"err line\n"));
        wire.extend(encode_frame(StreamKind::Stdout, b"tail\n"));

        let mut reader = FramedReader::new(wire.as_slice());
        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(LogFrame::stdout(&b"out line\n"[..]))
        );
        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(LogFrame::stderr(&b"err line\n"[..]))
        );
        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(LogFrame::stdout(&b"tail\n"[..]))
        );
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_payload_roundtrips() {
        let wire = encode_frame(StreamKind::Stderr, b"");
        let mut reader = FramedReader::new(wire.as_slice());
        assert_eq!(
            reader.next_frame().await.unwrap(),
            Some(LogFrame::stderr(&b""[..]))
        );
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn torn_header_surfaces_closed() {
        let wire = encode_frame(StreamKind::Stdout, b"data");
        let mut reader = FramedReader::new(&wire[..5]);
        assert!(matches!(
            reader.next_frame().await,
            Err(DlogError::Closed)
        ));
    }

    #[tokio::test]
    async fn torn_payload_surfaces_closed() {
        let wire = encode_frame(StreamKind::Stdout, b"data");
        let mut reader = FramedReader::new(&wire[..HEADER_LEN + 2]);
        assert!(matches!(
            reader.next_frame().await,
            Err(DlogError::Closed)
        ));
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected() {
        let mut wire = encode_frame(StreamKind::Stdout, b"x");
        wire[0] = 9;
        let mut reader = FramedReader::new(wire.as_slice());
        assert!(reader.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn frame_stream_yields_all_frames() {
        let mut wire = encode_frame(StreamKind::Stdout, b"a\n");
        wire.extend(encode_frame(StreamKind::Stderr, b"b\n"));

        let frames: Vec<LogFrame> = frame_stream(std::io::Cursor::new(wire))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            frames,
            vec![LogFrame::stdout(&b"a\n"[..]), LogFrame::stderr(&b"b\n"[..])]
        );
    }
}
