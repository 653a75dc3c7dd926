// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Segment files.
//!
//! # File Format
//! ```text
//! [Header: 8 bytes][Frame][Frame][Frame]...
//! ```
//!
//! Header:
//! - magic: `PLSG`
//! - version: u8 (1)
//! - category tag: u8
//! - reserved: u16 (0)
//!
//! Frame:
//! - len: u32 LE
//! - crc32: u32 LE, over the len bytes and the payload
//! - payload: one JSON record
//!
//! # Lifecycle
//! A segment is written as `<created_ms>.open` and renamed to `<created_ms>`
//! when closed. Closed segments are never written again.
//!
//! A segment left open by a crash, or abandoned after a failed write, is
//! sealed by `recover`: its torn tail is cut off before the rename, so a
//! closed segment always ends on a frame boundary.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pulse_kernel::EventCategory;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const SEGMENT_MAGIC: [u8; 4] = *b"PLSG";
pub const SEGMENT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const FRAME_OVERHEAD: usize = 8;

const OPEN_SUFFIX: &str = ".open";

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid segment header")]
    InvalidHeader,

    #[error("Segment belongs to category tag {found}, expected {expected}")]
    CategoryMismatch { expected: EventCategory, found: u8 },

    #[error("Segment corrupted at offset {offset}")]
    Corrupted { offset: usize },
}

pub type Result<T> = std::result::Result<T, SegmentError>;

/// Segment identity: wall-clock milliseconds at creation.
///
/// Ids are unique per directory and sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Open,
    Closed,
}

impl SegmentId {
    pub fn file_name(&self, state: SegmentState) -> String {
        match state {
            SegmentState::Open => format!("{}{}", self.0, OPEN_SUFFIX),
            SegmentState::Closed => self.0.to_string(),
        }
    }

    /// Inverse of `file_name`. Foreign files yield `None`.
    pub fn parse(file_name: &str) -> Option<(SegmentId, SegmentState)> {
        let (digits, state) = match file_name.strip_suffix(OPEN_SUFFIX) {
            Some(digits) => (digits, SegmentState::Open),
            None => (file_name, SegmentState::Closed),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|ms| (SegmentId(ms), state))
    }

    pub fn created_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.0)
    }

    /// Time since creation, zero if the clock went backwards.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at()).unwrap_or_default()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn header_bytes(category: EventCategory) -> [u8; HEADER_LEN] {
    let mut bytes = [0u8; HEADER_LEN];
    bytes[0..4].copy_from_slice(&SEGMENT_MAGIC);
    bytes[4] = SEGMENT_VERSION;
    bytes[5] = category.tag();
    bytes
}

fn frame_checksum(len: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(len);
    hasher.update(payload);
    hasher.finalize()
}

/// Frames one record. Done before the queue lock is taken.
pub fn encode_frame(record: &[u8]) -> Vec<u8> {
    let len = (record.len() as u32).to_le_bytes();
    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + record.len());
    frame.extend_from_slice(&len);
    // Writes into a Vec cannot fail.
    let _ = frame.write_u32::<LittleEndian>(frame_checksum(&len, record));
    frame.extend_from_slice(record);
    frame
}

/// Writer for the single open segment of a queue.
pub struct SegmentWriter {
    id: SegmentId,
    dir: PathBuf,
    category: EventCategory,
    file: BufWriter<File>,
    bytes_written: u64,
    event_count: usize,
}

impl SegmentWriter {
    /// Creates `<id>.open` in `dir` and writes the header.
    pub fn create(dir: &Path, id: SegmentId, category: EventCategory) -> Result<Self> {
        let path = dir.join(id.file_name(SegmentState::Open));
        let file = OpenOptions::new().create_new(true).write(true).open(&path)?;
        let mut file = BufWriter::new(file);
        file.write_all(&header_bytes(category))?;

        Ok(Self {
            id,
            dir: dir.to_path_buf(),
            category,
            file,
            bytes_written: HEADER_LEN as u64,
            event_count: 0,
        })
    }

    pub fn append_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.bytes_written += frame.len() as u64;
        self.event_count += 1;
        Ok(())
    }

    /// Flush to the OS and fsync.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    /// Syncs and renames the file to its closed name.
    pub fn close(mut self) -> Result<SegmentId> {
        self.sync()?;
        fs::rename(
            self.dir.join(self.id.file_name(SegmentState::Open)),
            self.dir.join(self.id.file_name(SegmentState::Closed)),
        )?;
        Ok(self.id)
    }

    /// Gives up on a writer whose last write or sync failed.
    ///
    /// Buffered bytes are discarded, never flushed. Whatever reached the disk
    /// is sealed by `recover`. Returns whether a closed segment remains.
    pub fn abandon(self) -> Result<bool> {
        let (file, _unwritten) = self.file.into_parts();
        drop(file);
        recover(&self.dir, self.id, self.category)
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// Swaps the file handle for a read-only one so the next flush fails.
    #[cfg(test)]
    pub(crate) fn break_handle(&mut self) -> io::Result<()> {
        let read_only = File::open(self.dir.join(self.id.file_name(SegmentState::Open)))?;
        self.file = BufWriter::new(read_only);
        Ok(())
    }
}

/// Seals `<id>.open` in `dir`: cuts a torn tail and renames the file to its
/// closed name. Files without a complete record are removed instead.
/// Returns whether a closed segment remains.
///
/// An unreadable file is closed as is so the batch reader reports it.
pub fn recover(dir: &Path, id: SegmentId, category: EventCategory) -> Result<bool> {
    let open_path = dir.join(id.file_name(SegmentState::Open));
    let bytes = fs::read(&open_path)?;
    if bytes.len() <= HEADER_LEN {
        fs::remove_file(&open_path)?;
        return Ok(false);
    }

    let keep = match decode_segment(&bytes, category) {
        Ok(data) if data.records.is_empty() => {
            fs::remove_file(&open_path)?;
            return Ok(false);
        }
        Ok(data) => bytes.len() - data.torn_bytes,
        Err(e) => {
            tracing::warn!("Segment {} is unreadable, closing it as is: {}", id, e);
            bytes.len()
        }
    };

    if keep < bytes.len() {
        let file = OpenOptions::new().write(true).open(&open_path)?;
        file.set_len(keep as u64)?;
        file.sync_all()?;
        tracing::warn!("Cut {} torn bytes from segment {}", bytes.len() - keep, id);
    }

    fs::rename(&open_path, dir.join(id.file_name(SegmentState::Closed)))?;
    Ok(true)
}

/// Decoded contents of a segment file.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentData {
    pub category: EventCategory,
    pub records: Vec<Vec<u8>>,
    /// Bytes after the last complete frame, left by a crash mid-write.
    pub torn_bytes: usize,
}

/// Reads and validates a whole segment file.
pub fn read_segment(path: &Path, expected: EventCategory) -> Result<SegmentData> {
    let bytes = fs::read(path)?;
    decode_segment(&bytes, expected)
}

/// Frame walk over raw segment bytes.
///
/// A frame cut short by EOF is a torn tail and ends the walk with a warning.
/// A checksum mismatch on the final frame is treated the same way. Anywhere
/// else it is corruption. Closed segments sealed by `recover` never have a
/// tail, so one showing up there means the length field itself was damaged.
pub fn decode_segment(bytes: &[u8], expected: EventCategory) -> Result<SegmentData> {
    if bytes.len() < HEADER_LEN || bytes[0..4] != SEGMENT_MAGIC || bytes[4] != SEGMENT_VERSION {
        return Err(SegmentError::InvalidHeader);
    }
    if bytes[5] != expected.tag() {
        return Err(SegmentError::CategoryMismatch {
            expected,
            found: bytes[5],
        });
    }

    let mut records = Vec::new();
    let mut offset = HEADER_LEN;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < FRAME_OVERHEAD {
            break;
        }

        let len_bytes = &bytes[offset..offset + 4];
        let mut cursor = Cursor::new(&bytes[offset..offset + FRAME_OVERHEAD]);
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let crc = cursor.read_u32::<LittleEndian>()?;

        let end = offset + FRAME_OVERHEAD + len;
        if end > bytes.len() {
            break;
        }

        let payload = &bytes[offset + FRAME_OVERHEAD..end];
        if frame_checksum(len_bytes, payload) != crc {
            if end == bytes.len() {
                break;
            }
            return Err(SegmentError::Corrupted { offset });
        }

        records.push(payload.to_vec());
        offset = end;
    }

    let torn_bytes = bytes.len() - offset;
    if torn_bytes > 0 {
        tracing::warn!("Ignoring torn segment tail: {} bytes after {} records", torn_bytes, records.len());
    }

    Ok(SegmentData {
        category: expected,
        records,
        torn_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_segment(dir: &Path, records: &[&[u8]]) -> PathBuf {
        let mut writer = SegmentWriter::create(dir, SegmentId(1_000), EventCategory::Logs).unwrap();
        for record in records {
            writer.append_frame(&encode_frame(record)).unwrap();
        }
        writer.close().unwrap();
        dir.join("1000")
    }

    #[test]
    fn test_file_names_roundtrip() {
        let id = SegmentId(1_700_000_000_123);
        assert_eq!(SegmentId::parse(&id.file_name(SegmentState::Open)), Some((id, SegmentState::Open)));
        assert_eq!(SegmentId::parse(&id.file_name(SegmentState::Closed)), Some((id, SegmentState::Closed)));
        assert_eq!(SegmentId::parse("notes.txt"), None);
        assert_eq!(SegmentId::parse(".open"), None);
    }

    #[test]
    fn test_close_renames_open_file() {
        let dir = tempdir().unwrap();
        let mut writer = SegmentWriter::create(dir.path(), SegmentId(42), EventCategory::Rum).unwrap();
        assert!(dir.path().join("42.open").exists());
        writer.append_frame(&encode_frame(b"{}")).unwrap();
        assert_eq!(writer.bytes_written(), (HEADER_LEN + FRAME_OVERHEAD + 2) as u64);

        writer.close().unwrap();
        assert!(!dir.path().join("42.open").exists());
        assert!(dir.path().join("42").exists());
    }

    #[test]
    fn test_read_back_records() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{\"a\":1}", b"{\"b\":2}"]);

        let data = read_segment(&path, EventCategory::Logs).unwrap();
        assert_eq!(data.records, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        assert_eq!(data.torn_bytes, 0);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{\"a\":1}", b"{\"b\":2}"]);

        let full = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full - 1).unwrap();

        let data = read_segment(&path, EventCategory::Logs).unwrap();
        assert_eq!(data.records.len(), 1);
        assert!(data.torn_bytes > 0);
    }

    #[test]
    fn test_corrupted_middle_frame_fails() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{\"a\":1}", b"{\"b\":2}", b"{\"c\":3}"]);

        let mut bytes = fs::read(&path).unwrap();
        let first_payload = HEADER_LEN + FRAME_OVERHEAD;
        bytes[first_payload + 2] ^= 0xff;

        assert!(matches!(
            decode_segment(&bytes, EventCategory::Logs),
            Err(SegmentError::Corrupted { offset }) if offset == HEADER_LEN
        ));
    }

    #[test]
    fn test_corrupted_length_fails() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{\"a\":1}", b"{\"b\":2}", b"{\"c\":3}"]);

        let mut bytes = fs::read(&path).unwrap();
        let second = HEADER_LEN + FRAME_OVERHEAD + 7;
        bytes[second] ^= 0x01;

        assert!(matches!(
            decode_segment(&bytes, EventCategory::Logs),
            Err(SegmentError::Corrupted { offset }) if offset == second
        ));
    }

    #[test]
    fn test_overlong_length_leaves_undecoded_bytes() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{\"a\":1}", b"{\"b\":2}", b"{\"c\":3}"]);

        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_LEN + 3] ^= 0xff;

        let data = decode_segment(&bytes, EventCategory::Logs).unwrap();
        assert!(data.records.is_empty());
        assert_eq!(data.torn_bytes, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn test_recover_cuts_torn_tail() {
        let dir = tempdir().unwrap();
        let mut writer = SegmentWriter::create(dir.path(), SegmentId(7), EventCategory::Logs).unwrap();
        writer.append_frame(&encode_frame(b"{\"a\":1}")).unwrap();
        writer.append_frame(&encode_frame(b"{\"b\":2}")).unwrap();
        writer.sync().unwrap();
        drop(writer);

        let open_path = dir.path().join("7.open");
        let mut file = OpenOptions::new().append(true).open(&open_path).unwrap();
        file.write_all(&encode_frame(b"{\"c\":3}")[..5]).unwrap();
        drop(file);

        assert!(recover(dir.path(), SegmentId(7), EventCategory::Logs).unwrap());
        let data = read_segment(&dir.path().join("7"), EventCategory::Logs).unwrap();
        assert_eq!(data.records.len(), 2);
        assert_eq!(data.torn_bytes, 0);
    }

    #[test]
    fn test_recover_removes_segment_without_records() {
        let dir = tempdir().unwrap();
        let mut writer = SegmentWriter::create(dir.path(), SegmentId(8), EventCategory::Logs).unwrap();
        writer.sync().unwrap();
        drop(writer);

        assert!(!recover(dir.path(), SegmentId(8), EventCategory::Logs).unwrap());
        assert!(!dir.path().join("8.open").exists());
        assert!(!dir.path().join("8").exists());
    }

    #[test]
    fn test_abandon_keeps_only_complete_frames() {
        let dir = tempdir().unwrap();
        let mut writer = SegmentWriter::create(dir.path(), SegmentId(9), EventCategory::Logs).unwrap();
        writer.append_frame(&encode_frame(b"{\"a\":1}")).unwrap();
        writer.sync().unwrap();

        // A partial frame reached the disk before the handle went bad.
        let mut file = OpenOptions::new().append(true).open(dir.path().join("9.open")).unwrap();
        file.write_all(&encode_frame(b"{\"b\":2}")[..6]).unwrap();
        drop(file);
        writer.break_handle().unwrap();

        writer.append_frame(&encode_frame(b"{\"c\":3}")).unwrap();
        assert!(writer.sync().is_err());

        assert!(writer.abandon().unwrap());
        let data = read_segment(&dir.path().join("9"), EventCategory::Logs).unwrap();
        assert_eq!(data.records, vec![b"{\"a\":1}".to_vec()]);
        assert_eq!(data.torn_bytes, 0);
    }

    #[test]
    fn test_header_is_checked() {
        let dir = tempdir().unwrap();
        let path = write_segment(dir.path(), &[b"{}"]);

        assert!(matches!(
            read_segment(&path, EventCategory::Traces),
            Err(SegmentError::CategoryMismatch { found: 1, .. })
        ));
        assert!(matches!(
            decode_segment(b"JUNKJUNK", EventCategory::Logs),
            Err(SegmentError::InvalidHeader)
        ));
    }
}
