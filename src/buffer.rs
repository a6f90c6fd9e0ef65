//! Spooled row buffer: rows stay in memory until a threshold, then move to a temp file.
//!
//! The backing file is an anonymous temporary file holding one JSON array per row, so it can
//! always be appended to and re-read as a stream of rows. It is created on the first flush
//! and deleted when the buffer is cleared or dropped.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde_json::de::IoRead;

use crate::error::{ImportError, ImportResult};
use crate::types::Row;

/// Default number of rows held in memory before spooling.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Options for [`SpooledRowBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolOptions {
    /// Rows kept in memory before they are flushed to disk (minimum 1).
    pub capacity: usize,
    /// Directory for the backing file. If `None`, uses the system temp directory.
    pub directory: Option<PathBuf>,
}

impl Default for SpoolOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            directory: None,
        }
    }
}

/// Append-only row storage that spills to disk.
///
/// Reading goes through [`SpooledRowBuffer::iter`], which needs `&mut self`: while a reader is
/// alive nothing can append, and any number of sequential passes can be made afterwards.
/// An I/O failure on the backing file is fatal; every later call returns
/// [`ImportError::BufferPoisoned`] until [`SpooledRowBuffer::clear`] starts over.
#[derive(Debug)]
pub struct SpooledRowBuffer {
    memory: Vec<Row>,
    file: Option<File>,
    options: SpoolOptions,
    len: usize,
    spooled: usize,
    poisoned: bool,
}

impl Default for SpooledRowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpooledRowBuffer {
    /// Buffer with the default capacity of [`DEFAULT_CAPACITY`] rows.
    pub fn new() -> Self {
        Self::with_options(SpoolOptions::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_options(SpoolOptions {
            capacity,
            ..SpoolOptions::default()
        })
    }

    pub fn with_options(mut options: SpoolOptions) -> Self {
        options.capacity = options.capacity.max(1);
        Self {
            memory: Vec::new(),
            file: None,
            options,
            len: 0,
            spooled: 0,
            poisoned: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    /// Total rows appended (in memory and on disk).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows written to the backing file so far.
    pub fn spooled(&self) -> usize {
        self.spooled
    }

    /// `true` once the backing file exists.
    pub fn is_spooled(&self) -> bool {
        self.file.is_some()
    }

    /// Append a row, flushing the memory segment once it reaches the capacity.
    pub fn append(&mut self, row: Row) -> ImportResult<()> {
        self.check_usable()?;
        self.memory.push(row);
        self.len += 1;
        if self.memory.len() >= self.options.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Move every in-memory row to the backing file. No-op when memory is empty.
    pub fn flush(&mut self) -> ImportResult<()> {
        self.check_usable()?;
        if self.memory.is_empty() {
            return Ok(());
        }
        let result = self.write_memory();
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    /// A single forward pass over every row, in append order.
    ///
    /// Reads from memory when nothing has been spooled; otherwise flushes and re-reads the
    /// backing file from the start.
    pub fn iter(&mut self) -> ImportResult<RowIter<'_>> {
        self.check_usable()?;
        if self.spooled == 0 {
            return Ok(RowIter::Memory(self.memory.iter()));
        }
        self.flush()?;

        let Some(file) = self.file.as_mut() else {
            return Err(ImportError::BufferPoisoned);
        };
        if let Err(err) = file.seek(SeekFrom::Start(0)) {
            self.poisoned = true;
            return Err(err.into());
        }
        let reader = BufReader::new(&*file);
        Ok(RowIter::Spooled {
            rows: serde_json::Deserializer::from_reader(reader).into_iter::<Row>(),
            remaining: self.len,
            poisoned: &mut self.poisoned,
        })
    }

    /// Drop every row and release the backing file.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.file = None;
        self.len = 0;
        self.spooled = 0;
        self.poisoned = false;
    }

    fn check_usable(&self) -> ImportResult<()> {
        if self.poisoned {
            Err(ImportError::BufferPoisoned)
        } else {
            Ok(())
        }
    }

    fn write_memory(&mut self) -> ImportResult<()> {
        let file = match &mut self.file {
            Some(file) => file,
            slot @ None => slot.insert(create_backing_file(&self.options)?),
        };
        file.seek(SeekFrom::End(0))?;

        let mut writer = BufWriter::new(&*file);
        for row in self.memory.drain(..) {
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            self.spooled += 1;
        }
        writer.flush()?;
        Ok(())
    }
}

fn create_backing_file(options: &SpoolOptions) -> io::Result<File> {
    match &options.directory {
        Some(dir) => tempfile::tempfile_in(dir),
        None => tempfile::tempfile(),
    }
}

/// Iterator returned by [`SpooledRowBuffer::iter`].
pub enum RowIter<'a> {
    Memory(std::slice::Iter<'a, Row>),
    Spooled {
        rows: serde_json::StreamDeserializer<'a, IoRead<BufReader<&'a File>>, Row>,
        remaining: usize,
        poisoned: &'a mut bool,
    },
}

impl Iterator for RowIter<'_> {
    type Item = ImportResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Memory(rows) => rows.next().cloned().map(Ok),
            Self::Spooled {
                rows,
                remaining,
                poisoned,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let item = match rows.next() {
                    Some(Ok(row)) => {
                        *remaining -= 1;
                        return Some(Ok(row));
                    }
                    Some(Err(err)) => ImportError::from(err),
                    None => ImportError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("spool file ended with {remaining} rows unread"),
                    )),
                };
                *remaining = 0;
                **poisoned = true;
                Some(Err(item))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Memory(rows) => rows.size_hint(),
            Self::Spooled { remaining, .. } => (0, Some(*remaining)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SpoolOptions, SpooledRowBuffer};
    use crate::types::{Row, Scalar};

    fn row(i: i64) -> Row {
        vec![
            Scalar::Integer(i),
            Scalar::Text(format!("row {i}")),
            Scalar::Null,
            Scalar::Float(i as f64 + 0.5),
        ]
    }

    fn fill(buffer: &mut SpooledRowBuffer, n: i64) -> Vec<Row> {
        let rows: Vec<Row> = (0..n).map(row).collect();
        for r in &rows {
            buffer.append(r.clone()).unwrap();
        }
        rows
    }

    fn drain(buffer: &mut SpooledRowBuffer) -> Vec<Row> {
        buffer.iter().unwrap().collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test]
    fn memory_path_below_threshold() {
        let mut buffer = SpooledRowBuffer::with_capacity(10);
        let rows = fill(&mut buffer, 7);
        assert!(!buffer.is_spooled());
        assert_eq!(buffer.len(), 7);
        assert_eq!(drain(&mut buffer), rows);
    }

    #[test]
    fn spooled_path_matches_memory_path() {
        let mut small = SpooledRowBuffer::with_capacity(1000);
        let mut spilled = SpooledRowBuffer::with_capacity(4);
        let expected = fill(&mut small, 23);
        fill(&mut spilled, 23);

        assert!(spilled.is_spooled());
        assert_eq!(spilled.len(), 23);
        assert_eq!(drain(&mut small), expected);
        assert_eq!(drain(&mut spilled), expected);
        // A second pass sees the same rows.
        assert_eq!(drain(&mut spilled), expected);
    }

    #[test]
    fn exactly_capacity_rows_are_not_lost() {
        let mut buffer = SpooledRowBuffer::with_capacity(5);
        let rows = fill(&mut buffer, 5);
        assert_eq!(buffer.spooled(), 5);
        assert_eq!(drain(&mut buffer), rows);
    }

    #[test]
    fn appends_after_reading_are_kept_in_order() {
        let mut buffer = SpooledRowBuffer::with_capacity(3);
        let mut rows = fill(&mut buffer, 4);
        assert_eq!(drain(&mut buffer), rows);

        for i in 4..9 {
            buffer.append(row(i)).unwrap();
            rows.push(row(i));
        }
        assert_eq!(drain(&mut buffer), rows);
    }

    #[test]
    fn flush_is_a_noop_when_memory_is_empty() {
        let mut buffer = SpooledRowBuffer::with_capacity(3);
        buffer.flush().unwrap();
        assert!(!buffer.is_spooled());
    }

    #[test]
    fn clear_releases_the_backing_file() {
        let mut buffer = SpooledRowBuffer::with_capacity(2);
        fill(&mut buffer, 5);
        assert!(buffer.is_spooled());

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_spooled());

        buffer.append(row(42)).unwrap();
        buffer.append(row(43)).unwrap();
        buffer.append(row(44)).unwrap();
        assert_eq!(drain(&mut buffer), vec![row(42), row(43), row(44)]);
    }

    #[test]
    fn big_numbers_survive_the_spool_file() {
        let big = Scalar::infer("123456789012345678901234567890");
        let mut buffer = SpooledRowBuffer::with_capacity(1);
        buffer.append(vec![big.clone()]).unwrap();
        buffer.append(vec![Scalar::Integer(1)]).unwrap();
        assert_eq!(drain(&mut buffer), vec![vec![big], vec![Scalar::Integer(1)]]);
    }

    #[test]
    fn spool_directory_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = SpooledRowBuffer::with_options(SpoolOptions {
            capacity: 1,
            directory: Some(dir.path().to_path_buf()),
        });
        let rows = fill(&mut buffer, 3);
        assert_eq!(drain(&mut buffer), rows);
    }

    #[test]
    fn missing_spool_directory_poisons_the_buffer() {
        let mut buffer = SpooledRowBuffer::with_options(SpoolOptions {
            capacity: 1,
            directory: Some("/definitely/not/a/dir".into()),
        });
        assert!(buffer.append(row(0)).is_err());
        assert!(matches!(
            buffer.append(row(1)),
            Err(crate::error::ImportError::BufferPoisoned)
        ));
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
