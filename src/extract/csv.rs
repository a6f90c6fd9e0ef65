//! Delimited-text tokenizer.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::{ImportError, ImportResult};
use crate::types::Scalar;

use super::{AtomKind, Extractor, Payload};

/// Dialect of the delimited input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedOptions {
    /// Field delimiter (default `,`).
    pub delimiter: u8,
    /// Quote character (default `"`).
    pub quote: u8,
}

impl DelimitedOptions {
    /// Tab-separated values.
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

enum Position {
    BetweenRecords,
    InRecord { next_field: usize },
    Finished,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    // Just saw a quote inside a quoted field: either an escaped quote or the closing one.
    QuoteInQuoted,
}

// Follows field quoting over the raw bytes so that a quoted field left open at the end of the
// input can be reported; the csv reader closes it silently.
struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    quote: u8,
    state: QuoteState,
}

impl<R> QuoteTracker<R> {
    fn new(inner: R, options: DelimitedOptions) -> Self {
        Self {
            inner,
            delimiter: options.delimiter,
            quote: options.quote,
            state: QuoteState::FieldStart,
        }
    }

    fn is_open(&self) -> bool {
        self.state == QuoteState::Quoted
    }

    fn observe(&mut self, byte: u8) {
        let ends_field = byte == self.delimiter || byte == b'\n' || byte == b'\r';
        self.state = match self.state {
            QuoteState::FieldStart | QuoteState::Unquoted if ends_field => QuoteState::FieldStart,
            QuoteState::FieldStart if byte == self.quote => QuoteState::Quoted,
            QuoteState::FieldStart | QuoteState::Unquoted => QuoteState::Unquoted,
            QuoteState::Quoted if byte == self.quote => QuoteState::QuoteInQuoted,
            QuoteState::Quoted => QuoteState::Quoted,
            QuoteState::QuoteInQuoted if byte == self.quote => QuoteState::Quoted,
            QuoteState::QuoteInQuoted if ends_field => QuoteState::FieldStart,
            QuoteState::QuoteInQuoted => QuoteState::Unquoted,
        };
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for &byte in &buf[..n] {
            self.observe(byte);
        }
        Ok(n)
    }
}

/// Tokenizes delimited text into records of inferred scalars.
///
/// For each input row this emits `StartRecord` (no payload), one scalar atom per field
/// (see [`Scalar::infer`]), then `EndRecord` with the number of fields in the row. Rows may
/// have different lengths; checking that is up to the consumer.
///
/// Malformed input (invalid UTF-8, a quoted field still open at the end of the input) is an
/// [`ImportError::Structural`] naming the 0-based ordinal of the offending record. The group
/// label is left empty for the enclosing source to fill in.
pub struct DelimitedTokenizer<R> {
    reader: csv::Reader<QuoteTracker<R>>,
    record: csv::StringRecord,
    records: usize,
    position: Position,
    kind: Option<AtomKind>,
    payload: Payload,
}

impl DelimitedTokenizer<File> {
    /// Open a delimited file with the default (comma) dialect.
    pub fn from_path(path: impl AsRef<Path>) -> ImportResult<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> DelimitedTokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DelimitedOptions::default())
    }

    pub fn with_options(reader: R, options: DelimitedOptions) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .quote(options.quote)
            .from_reader(QuoteTracker::new(reader, options));
        Self {
            reader,
            record: csv::StringRecord::new(),
            records: 0,
            position: Position::BetweenRecords,
            kind: None,
            payload: Payload::None,
        }
    }

    fn set(&mut self, kind: Option<AtomKind>, payload: Payload) -> Option<AtomKind> {
        self.kind = kind;
        self.payload = payload;
        kind
    }

    fn read_error(&self, err: csv::Error) -> ImportError {
        if err.is_io_error() {
            return err.into();
        }
        let record = err
            .position()
            .map_or(self.records, |pos| pos.record() as usize);
        ImportError::structural("", record, err.to_string())
    }
}

impl<R: Read> Extractor for DelimitedTokenizer<R> {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        match self.position {
            Position::BetweenRecords => {
                let more = match self.reader.read_record(&mut self.record) {
                    Ok(more) => more,
                    Err(err) => return Err(self.read_error(err)),
                };
                if more {
                    self.records += 1;
                    self.position = Position::InRecord { next_field: 0 };
                    Ok(self.set(Some(AtomKind::StartRecord), Payload::None))
                } else if self.reader.get_ref().is_open() {
                    Err(ImportError::structural(
                        "",
                        self.records.saturating_sub(1),
                        "quoted field not closed at end of input",
                    ))
                } else {
                    self.position = Position::Finished;
                    Ok(self.set(None, Payload::None))
                }
            }
            Position::InRecord { next_field } => match self.record.get(next_field) {
                Some(raw) => {
                    let value = Scalar::infer(raw);
                    self.position = Position::InRecord {
                        next_field: next_field + 1,
                    };
                    Ok(self.set(Some(value.kind()), Payload::Scalar(value)))
                }
                None => {
                    let fields = self.record.len();
                    self.position = Position::BetweenRecords;
                    Ok(self.set(Some(AtomKind::EndRecord), Payload::Count(fields)))
                }
            },
            Position::Finished => Ok(self.set(None, Payload::None)),
        }
    }

    fn current_kind(&self) -> Option<AtomKind> {
        self.kind
    }

    fn current_payload(&self) -> &Payload {
        &self.payload
    }
}
