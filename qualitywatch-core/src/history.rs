//! Append-only history file.
//!
//! One JSON object per line, newest last. Each line is a [`HistoryRecord`]:
//! a `date` plus one entry per metric id, either a bare value or a tracked
//! `{value, status, since}` object. Recent reads scan the file backwards so
//! their cost does not grow with the length of the history.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use qualitywatch_types::{meta_metric_ids, HistoryRecord, RecordValue, Status};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{HistoryError, LinePosition};

/// Default number of lines read by [`HistoryStore::recent`] and kept in full
/// by [`HistoryStore::clean_history`].
pub const DEFAULT_WINDOW: usize = 250;

/// Size of the blocks read when scanning backwards.
const BLOCK_SIZE: u64 = 8 * 1024;

/// What to do with a line that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptLinePolicy {
    /// Log a warning and continue without the line.
    #[default]
    Skip,
    /// Fail with [`HistoryError::Corrupt`].
    Abort,
}

/// Summary of a [`HistoryStore::clean_history`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CleanReport {
    pub lines_before: usize,
    pub duplicates_removed: usize,
    pub compacted: usize,
    pub lines_after: usize,
}

/// One value of a metric's trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: DateTime<Utc>,
    pub value: RecordValue,
}

/// The history file of one project.
///
/// Single writer: concurrent runs against the same file must be serialized
/// by the caller.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    policy: CorruptLinePolicy,
}

impl HistoryStore {
    /// Open the history at `path`. A missing file is an empty history.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: CorruptLinePolicy::default(),
        }
    }

    /// Set how unparsable lines are handled.
    pub fn with_policy(mut self, policy: CorruptLinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> CorruptLinePolicy {
        self.policy
    }

    /// Append one record as a new line.
    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(record).map_err(HistoryError::Encode)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(path = %self.path.display(), entries = record.len(), "Appended history record");
        Ok(())
    }

    /// Values of a metric over the last `window` lines, oldest first.
    ///
    /// `ids` lists the metric's current id followed by former ids; per line
    /// the first id present is used. Lines without any of them are skipped,
    /// so at most `window` points are returned.
    pub fn recent(&self, ids: &[&str], window: usize) -> Result<Vec<TrendPoint>, HistoryError> {
        let Some(lines) = ReverseLines::open(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut points = Vec::new();
        for (index, line) in lines.take(window).enumerate() {
            let line = line?;
            let Some(record) = self.parse(&line, LinePosition::FromEnd(index + 1))? else {
                continue;
            };
            if let Some(value) = record.first_value(ids) {
                points.push(TrendPoint {
                    date: record.date,
                    value: value.clone(),
                });
            }
        }

        points.reverse();
        Ok(points)
    }

    /// Every record in the file, oldest first, with tracked entries
    /// reduced to bare values.
    pub fn complete(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self
            .read_all()?
            .iter()
            .map(HistoryRecord::unwrapped)
            .collect())
    }

    /// The newest parsable record, if any.
    pub fn last_record(&self) -> Result<Option<HistoryRecord>, HistoryError> {
        let Some(lines) = ReverseLines::open(&self.path)? else {
            return Ok(None);
        };

        for (index, line) in lines.enumerate() {
            let line = line?;
            if let Some(record) = self.parse(&line, LinePosition::FromEnd(index + 1))? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// When a metric that currently has `current` status entered it.
    ///
    /// Only the last record is consulted; see
    /// [`HistoryRecord::status_start_date`].
    pub fn status_start_date(
        &self,
        id: &str,
        current: Status,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, HistoryError> {
        Ok(self
            .last_record()?
            .map_or(now, |record| record.status_start_date(id, current, now)))
    }

    /// Deduplicate consecutive identical runs and compact old records.
    ///
    /// A record is dropped when its entries equal those of both of its
    /// neighbours in the original sequence, so the first and last record
    /// always survive. Records older than the last `window` are then reduced
    /// to their date and the meta-metric percentages. The file is replaced
    /// atomically, and left untouched when nothing changes.
    pub fn clean_history(&self, window: usize) -> Result<CleanReport, HistoryError> {
        let (records, skipped) = match self.read_records()? {
            Some(read) => read,
            None => return Ok(CleanReport::default()),
        };
        let lines_before = records.len() + skipped;

        let mut kept = deduplicate(&records);
        let duplicates_removed = records.len() - kept.len();

        let keep = meta_metric_ids();
        let old = kept.len().saturating_sub(window);
        let mut compacted = 0;
        for record in kept.iter_mut().take(old) {
            let reduced = record.compacted(&keep);
            if !reduced.same_entries(record) {
                *record = reduced;
                compacted += 1;
            }
        }

        let report = CleanReport {
            lines_before,
            duplicates_removed,
            compacted,
            lines_after: kept.len(),
        };

        if duplicates_removed == 0 && compacted == 0 && skipped == 0 {
            debug!(path = %self.path.display(), "History already clean");
            return Ok(report);
        }

        self.rewrite(&kept)?;
        info!(
            path = %self.path.display(),
            lines_before = report.lines_before,
            duplicates_removed = report.duplicates_removed,
            compacted = report.compacted,
            lines_after = report.lines_after,
            "Cleaned history"
        );
        Ok(report)
    }

    fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self
            .read_records()?
            .map(|(records, _)| records)
            .unwrap_or_default())
    }

    /// Parsed records plus the number of skipped corrupt lines, or `None`
    /// if the file does not exist.
    fn read_records(&self) -> Result<Option<(Vec<HistoryRecord>, usize)>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut skipped = 0;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match self.parse(&line, LinePosition::FromStart(index + 1))? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        Ok(Some((records, skipped)))
    }

    fn parse(
        &self,
        line: &str,
        position: LinePosition,
    ) -> Result<Option<HistoryRecord>, HistoryError> {
        match serde_json::from_str(line) {
            Ok(record) => Ok(Some(record)),
            Err(source) => match self.policy {
                CorruptLinePolicy::Skip => {
                    warn!(
                        path = %self.path.display(),
                        %position,
                        error = %source,
                        "Skipping corrupt history line"
                    );
                    Ok(None)
                }
                CorruptLinePolicy::Abort => Err(HistoryError::Corrupt { position, source }),
            },
        }
    }

    fn rewrite(&self, records: &[HistoryRecord]) -> Result<(), HistoryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = io::BufWriter::new(tmp.as_file_mut());
            for record in records {
                serde_json::to_writer(&mut writer, record).map_err(HistoryError::Encode)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Drop every record whose entries equal both neighbours' entries in the
/// original sequence.
fn deduplicate(records: &[HistoryRecord]) -> Vec<HistoryRecord> {
    records
        .iter()
        .enumerate()
        .filter(|(i, record)| {
            let i = *i;
            if i == 0 || i + 1 == records.len() {
                return true;
            }
            !(records[i - 1].same_entries(record) && record.same_entries(&records[i + 1]))
        })
        .map(|(_, record)| record.clone())
        .collect()
}

/// Non-blank lines of a file, last line first.
struct ReverseLines {
    file: File,
    /// Bytes before this offset have not been read yet.
    pos: u64,
    /// Read but not yet returned bytes, starting at `pos`.
    pending: Vec<u8>,
}

impl ReverseLines {
    fn open(path: &Path) -> io::Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let pos = file.metadata()?.len();
        Ok(Some(Self {
            file,
            pos,
            pending: Vec::new(),
        }))
    }

    fn read_block(&mut self) -> io::Result<()> {
        let size = BLOCK_SIZE.min(self.pos);
        self.pos -= size;

        let mut block = vec![0u8; size as usize];
        self.file.seek(SeekFrom::Start(self.pos))?;
        self.file.read_exact(&mut block)?;

        block.extend_from_slice(&self.pending);
        self.pending = block;
        Ok(())
    }
}

fn decode(bytes: Vec<u8>) -> Option<io::Result<String>> {
    match String::from_utf8(bytes) {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(io::Error::new(io::ErrorKind::InvalidData, e))),
    }
}

impl Iterator for ReverseLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(newline) = self.pending.iter().rposition(|&b| b == b'\n') {
                let line = self.pending.split_off(newline + 1);
                self.pending.truncate(newline);
                match decode(line) {
                    Some(item) => return Some(item),
                    None => continue,
                }
            }

            if self.pos == 0 {
                let rest = std::mem::take(&mut self.pending);
                return decode(rest);
            }

            if let Err(e) = self.read_block() {
                self.pos = 0;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}
