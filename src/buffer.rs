//! In-memory byte file shared between the acquisition engine and the viewer.
//!
//! [`ByteFile`] is a random-access byte container that accepts appends (live
//! follow), prepends (historical back-fill), and seekable reads concurrently.
//! The critical invariant is offset stability under prepending: when k bytes
//! are prepended, the internal read and write positions advance by k, so an
//! absolute offset captured before the prepend still addresses the same byte
//! after adding the prepended length. Consumers that track offsets relative
//! to the write position (the live tail) never observe their bytes moving.
//!
//! Mutation is serialized by the write half of an `RwLock`; concurrent readers
//! share the read half and see a consistent snapshot.

use crate::error::{DlogError, Result};
use std::io::SeekFrom;
use std::ops::Deref;
use std::sync::{RwLock, RwLockReadGuard};

#[derive(Debug, Default)]
struct Inner {
    buf: Vec<u8>,
    /// Next offset `read` will consume from.
    read_pos: usize,
    /// Offset at which the live writer began appending. Latched by the first
    /// prepend, then kept stable relative to the buffered bytes.
    write_pos: usize,
    /// Total bytes ever prepended. Consumers holding absolute offsets add
    /// the growth of this counter to keep addressing the same bytes.
    prepended: u64,
}

/// An in-memory emulation of a file with a prepend operation.
///
/// The zero value is an empty file ready to use.
#[derive(Debug, Default)]
pub struct ByteFile {
    inner: RwLock<Inner>,
}

/// Read guard exposing the file contents as a byte slice.
///
/// The view is valid until the guard is dropped; mutators block while any
/// snapshot is alive.
pub struct Snapshot<'a>(RwLockReadGuard<'a, Inner>);

impl Deref for Snapshot<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0.buf
    }
}

impl ByteFile {
    /// Create a file that takes ownership of `buf` as its initial contents.
    pub fn with_contents(buf: Vec<u8>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                buf,
                ..Inner::default()
            }),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied and an end-of-file flag. Reading at
    /// or past the current length yields `(0, true)` rather than an error, so
    /// a reader polling the live tail sees EOF until more bytes arrive.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(usize, bool)> {
        let inner = self.read_guard();
        read_at_locked(&inner, buf, offset)
    }

    /// Read from the internal position, advancing it by the bytes consumed.
    pub fn read(&self, buf: &mut [u8]) -> Result<(usize, bool)> {
        let mut inner = self.write_guard();
        let pos = inner.read_pos as u64;
        let (n, eof) = read_at_locked(&inner, buf, pos)?;
        inner.read_pos += n;
        Ok((n, eof))
    }

    /// Reposition the internal read offset with standard whence semantics.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let mut inner = self.write_guard();
        let abs = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => inner.read_pos as i64 + delta,
            SeekFrom::End(delta) => inner.buf.len() as i64 + delta,
        };
        if abs < 0 {
            return Err(DlogError::InvalidOffset(abs.unsigned_abs()));
        }
        inner.read_pos = abs as usize;
        Ok(abs as u64)
    }

    /// Append bytes at the tail. Returns the number of bytes written.
    pub fn append(&self, bytes: &[u8]) -> usize {
        let mut inner = self.write_guard();
        inner.buf.extend_from_slice(bytes);
        inner.write_pos += bytes.len();
        bytes.len()
    }

    /// Insert bytes before position zero. Returns the new total length.
    ///
    /// The read and write positions advance by the inserted length, keeping
    /// every previously captured absolute offset pointing at the same byte
    /// once the caller adds the prepended length. The first prepend latches
    /// the write position to the pre-prepend read position, recording where
    /// live writes began.
    pub fn prepend(&self, bytes: &[u8]) -> usize {
        let mut inner = self.write_guard();
        if inner.write_pos == 0 {
            inner.write_pos = inner.read_pos;
        }
        let mut grown = Vec::with_capacity(bytes.len() + inner.buf.len());
        grown.extend_from_slice(bytes);
        grown.extend_from_slice(&inner.buf);
        inner.buf = grown;
        inner.read_pos += bytes.len();
        inner.write_pos += bytes.len();
        inner.prepended += bytes.len() as u64;
        inner.buf.len()
    }

    /// Shrink or zero-extend the contents to exactly `n` bytes.
    pub fn truncate(&self, n: u64) -> Result<()> {
        let n = usize::try_from(n).map_err(|_| DlogError::InvalidOffset(n))?;
        let mut inner = self.write_guard();
        if n <= inner.buf.len() {
            inner.buf.truncate(n);
        } else {
            inner.buf.resize(n, 0);
        }
        Ok(())
    }

    /// Reset to an empty file with zeroed offsets.
    pub fn clear(&self) {
        let mut inner = self.write_guard();
        inner.buf.clear();
        inner.read_pos = 0;
        inner.write_pos = 0;
        inner.prepended = 0;
    }

    /// Total number of buffered bytes.
    pub fn len(&self) -> u64 {
        self.read_guard().buf.len() as u64
    }

    /// True when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.read_guard().buf.is_empty()
    }

    /// Offset at which the live writer is currently positioned.
    ///
    /// Grows with appends and with prepends (which shift it); the follow
    /// watcher compares successive values to detect fresh tail bytes.
    pub fn write_offset(&self) -> u64 {
        self.read_guard().write_pos as u64
    }

    /// Total bytes ever prepended (monotone until `clear`).
    ///
    /// An offset captured when this counter read `p` addresses the same byte
    /// at `offset + (prepended() - p)` later.
    pub fn prepended(&self) -> u64 {
        self.read_guard().prepended
    }

    /// Borrow the full contents for scanning.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot(self.read_guard())
    }
}

fn read_at_locked(inner: &Inner, buf: &mut [u8], offset: u64) -> Result<(usize, bool)> {
    let offset = usize::try_from(offset).map_err(|_| DlogError::InvalidOffset(offset))?;
    if offset >= inner.buf.len() {
        return Ok((0, true));
    }
    let available = &inner.buf[offset..];
    let n = available.len().min(buf.len());
    buf[..n].copy_from_slice(&available[..n]);
    Ok((n, n < buf.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_at_copies_and_flags_eof() {
        let file = ByteFile::with_contents(b"hello world".to_vec());
        let mut buf = [0u8; 5];

        let (n, eof) = file.read_at(&mut buf, 0).unwrap();
        assert_eq!(n, 5);
        assert!(!eof);
        assert_eq!(&buf, b"hello");

        let (n, eof) = file.read_at(&mut buf, 6).unwrap();
        assert_eq!(n, 5);
        assert!(!eof, "EOF is only reported once no byte can be copied");
        assert_eq!(&buf, b"world");

        let (n, eof) = file.read_at(&mut buf, 11).unwrap();
        assert_eq!(n, 0);
        assert!(eof);

        let (n, eof) = file.read_at(&mut buf, 999).unwrap();
        assert_eq!(n, 0);
        assert!(eof);
    }

    #[test]
    fn read_advances_internal_position() {
        let file = ByteFile::with_contents(b"abcdef".to_vec());
        let mut buf = [0u8; 3];

        let (n, _) = file.read(&mut buf).unwrap();
        assert_eq!((n, &buf), (3, b"abc"));

        let (n, _) = file.read(&mut buf).unwrap();
        assert_eq!((n, &buf), (3, b"def"));

        let (n, eof) = file.read(&mut buf).unwrap();
        assert_eq!(n, 0);
        assert!(eof);
    }

    #[test]
    fn seek_whence_semantics() {
        let file = ByteFile::with_contents(b"0123456789".to_vec());

        assert_eq!(file.seek(SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(file.seek(SeekFrom::Current(2)).unwrap(), 6);
        assert_eq!(file.seek(SeekFrom::End(-1)).unwrap(), 9);
        assert!(file.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn append_then_prepend_preserves_byte_identity() {
        let file = ByteFile::default();
        file.append(b"tail");

        // Capture offset 2 -> 'i'
        let mut one = [0u8; 1];
        file.read_at(&mut one, 2).unwrap();
        assert_eq!(&one, b"i");

        let new_len = file.prepend(b"head ");
        assert_eq!(new_len, 9);

        // Same byte now lives at captured offset + prepended length.
        file.read_at(&mut one, 2 + 5).unwrap();
        assert_eq!(&one, b"i");
        assert_eq!(&*file.snapshot(), b"head tail");
    }

    #[test]
    fn offsets_stay_valid_across_many_interleaved_prepends() {
        let file = ByteFile::default();
        file.append(b"alpha\n");
        file.append(b"beta\n");

        // Capture several offsets with their bytes before any prepend.
        let snapshot: Vec<u8> = file.snapshot().to_vec();
        let captured: Vec<(u64, u8)> = (0..snapshot.len() as u64)
            .map(|off| (off, snapshot[off as usize]))
            .collect();

        let mut total_prepended = 0u64;
        for chunk in [&b"one\n"[..], b"two two\n", b"x\n", b"last chunk\n"] {
            file.prepend(chunk);
            total_prepended += chunk.len() as u64;
            file.append(b"extra\n");

            let mut one = [0u8; 1];
            for &(off, byte) in &captured {
                file.read_at(&mut one, off + total_prepended).unwrap();
                assert_eq!(one[0], byte, "offset {} moved after prepends", off);
            }
        }
    }

    #[test]
    fn first_prepend_latches_write_offset() {
        // The tail block arrives via prepend on an empty file, then the live
        // follower appends after it. The write offset must mark where live
        // writes begin and then track every appended byte.
        let file = ByteFile::default();
        file.prepend(b"tail block\n");
        assert_eq!(file.write_offset(), 11);

        file.append(b"live\n");
        assert_eq!(file.write_offset(), 16);

        // Older history shifts the write offset along with everything else.
        file.prepend(b"older\n");
        assert_eq!(file.write_offset(), 22);
        assert_eq!(&*file.snapshot(), b"older\ntail block\nlive\n");
    }

    #[test]
    fn prepend_advances_read_position() {
        let file = ByteFile::with_contents(b"xyz".to_vec());
        let mut buf = [0u8; 1];
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"x");

        file.prepend(b"ab");

        // Next sequential read continues with the same byte it would have
        // gotten without the prepend.
        file.read(&mut buf).unwrap();
        assert_eq!(&buf, b"y");
    }

    #[test]
    fn truncate_shrinks_and_zero_extends() {
        let file = ByteFile::with_contents(b"abcdef".to_vec());

        file.truncate(3).unwrap();
        assert_eq!(&*file.snapshot(), b"abc");

        file.truncate(5).unwrap();
        assert_eq!(&*file.snapshot(), b"abc\0\0");
    }

    #[test]
    fn prepended_counter_tracks_history_growth() {
        let file = ByteFile::default();
        assert_eq!(file.prepended(), 0);
        file.append(b"tail");
        assert_eq!(file.prepended(), 0);

        file.prepend(b"abc");
        file.prepend(b"de");
        assert_eq!(file.prepended(), 5);

        // The captured-offset arithmetic the counter exists for: offset 0
        // before the prepends, plus the counter growth, is 't' again.
        let mut one = [0u8; 1];
        file.read_at(&mut one, 5).unwrap();
        assert_eq!(&one, b"t");
    }

    #[test]
    fn clear_resets_everything() {
        let file = ByteFile::with_contents(b"abc".to_vec());
        let mut buf = [0u8; 2];
        file.read(&mut buf).unwrap();
        file.append(b"more");
        file.prepend(b"pre");

        file.clear();
        assert_eq!(file.len(), 0);
        assert!(file.is_empty());
        assert_eq!(file.write_offset(), 0);
        assert_eq!(file.prepended(), 0);
        let (n, eof) = file.read(&mut buf).unwrap();
        assert_eq!(n, 0);
        assert!(eof);
    }
}
