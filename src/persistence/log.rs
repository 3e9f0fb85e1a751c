//! Durable append-only log
//!
//! A single file of length-prefixed, checksummed records (see
//! [`record`](super::record)). Positions are byte offsets into that file and
//! are used the same way by `append`, `read_at` and recovery.
//!
//! Guarantees:
//! - `append` writes the whole record, flushes and fsyncs before returning,
//!   so a returned position is durable.
//! - `read_at` verifies the checksum and reports a mismatch as
//!   [`Error::Corruption`], distinct from I/O failure.
//! - `open` scans the file once and truncates it after the last complete
//!   record, so a write interrupted by a crash never poisons later appends.
//!
//! By default recovery checks framing only. With
//! [`LogOptions::verify_checksums`] it also stops, and truncates, at the first
//! record whose checksum does not match.
//!
//! The write cursor is shared state, so appends and reads go through one lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::persistence::record::{self, CRC_SIZE, LENGTH_SIZE};
use crate::utils::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Validate every record's checksum during recovery, not just its framing.
    pub verify_checksums: bool,
}

#[derive(Debug)]
struct LogState {
    file: File,
    /// Byte offset just past the last good record.
    end: u64,
    records: u64,
}

#[derive(Debug)]
pub struct DurableLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

/// Outcome of the recovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Recovered {
    end: u64,
    records: u64,
}

impl DurableLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, LogOptions::default())
    }

    /// Open or create the log at `path`, recovering it if needed.
    pub fn open_with(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let Recovered { end, records } = recover(&mut file, options.verify_checksums)?;
        info!(path = ?path, records, end, "Opened durable log");

        Ok(Self {
            path,
            state: Mutex::new(LogState { file, end, records }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return its position once it is on stable storage.
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        let frame = record::encode(payload)?;
        let mut state = self.state.lock();
        let position = state.end;

        if let Err(e) = write_frame(&mut state.file, position, &frame) {
            // drop whatever part of the frame made it out
            let _ = state.file.set_len(position);
            return Err(e.into());
        }

        state.end += frame.len() as u64;
        state.records += 1;
        debug!(position, len = payload.len(), "Appended record");
        Ok(position)
    }

    /// Read the record at `position`, returning its payload and the position
    /// of the record after it.
    pub fn read_at(&self, position: u64) -> Result<(Vec<u8>, u64)> {
        let mut state = self.state.lock();
        let end = state.end;
        read_frame(&mut state.file, position, end)
    }

    /// Iterate over every record from the start, verifying checksums.
    pub fn iter(&self) -> Records<'_> {
        Records {
            log: self,
            position: 0,
        }
    }

    /// Number of records in the log.
    pub fn len(&self) -> u64 {
        self.state.lock().records
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position the next append will be written at; also the log size in bytes.
    pub fn end(&self) -> u64 {
        self.state.lock().end
    }

    pub fn sync(&self) -> Result<()> {
        Ok(self.state.lock().file.sync_all()?)
    }
}

pub struct Records<'a> {
    log: &'a DurableLog,
    position: u64,
}

impl Iterator for Records<'_> {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.log.end() {
            return None;
        }
        let position = self.position;
        match self.log.read_at(position) {
            Ok((payload, next)) => {
                self.position = next;
                Some(Ok((position, payload)))
            }
            Err(e) => {
                // a bad record ends iteration
                self.position = u64::MAX;
                Some(Err(e))
            }
        }
    }
}

fn write_frame(file: &mut File, position: u64, frame: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.write_all(frame)?;
    file.flush()?;
    file.sync_all()
}

fn read_frame(file: &mut File, position: u64, end: u64) -> Result<(Vec<u8>, u64)> {
    file.seek(SeekFrom::Start(position))?;

    let mut len_buf = [0u8; LENGTH_SIZE];
    file.read_exact(&mut len_buf)?;
    let length = u32::from_be_bytes(len_buf);

    let next = position.saturating_add(record::record_size(length));
    if next > end {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("record at {position} extends past end of log ({end})"),
        )
        .into());
    }

    let mut payload = vec![0u8; length as usize];
    file.read_exact(&mut payload)?;
    let mut crc_buf = [0u8; CRC_SIZE];
    file.read_exact(&mut crc_buf)?;

    let expected = u32::from_be_bytes(crc_buf);
    let actual = record::checksum(&payload);
    if expected != actual {
        return Err(Error::Corruption {
            position,
            expected,
            actual,
        });
    }
    Ok((payload, next))
}

/// Scan from the start and cut the file back to the last complete record.
fn recover(file: &mut File, verify_checksums: bool) -> Result<Recovered> {
    let size = file.metadata()?.len();
    let mut reader = BufReader::new(&*file);
    reader.seek(SeekFrom::Start(0))?;

    let mut position = 0u64;
    let mut records = 0u64;

    while position + LENGTH_SIZE as u64 <= size {
        let mut len_buf = [0u8; LENGTH_SIZE];
        reader.read_exact(&mut len_buf)?;
        let length = u32::from_be_bytes(len_buf);
        let total = record::record_size(length);

        if position + total > size {
            warn!(position, length, size, "Incomplete record at end of log");
            break;
        }

        if verify_checksums {
            let mut payload = vec![0u8; length as usize];
            reader.read_exact(&mut payload)?;
            let mut crc_buf = [0u8; CRC_SIZE];
            reader.read_exact(&mut crc_buf)?;
            if u32::from_be_bytes(crc_buf) != record::checksum(&payload) {
                warn!(position, records, "Checksum mismatch, stopping recovery here");
                break;
            }
        } else {
            reader.seek_relative((total - LENGTH_SIZE as u64) as i64)?;
        }

        position += total;
        records += 1;
    }
    drop(reader);

    if position < size {
        warn!(
            discarded = size - position,
            end = position,
            "Truncating log after last complete record"
        );
        file.set_len(position)?;
        file.sync_all()?;
    }

    Ok(Recovered {
        end: position,
        records,
    })
}
