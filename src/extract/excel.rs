#![cfg(feature = "excel")]

//! Workbook tokenizer (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`).

use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::{ImportError, ImportResult};
use crate::types::Scalar;

use super::{AtomKind, Extractor, Payload};

enum Position {
    BetweenRecords,
    InRecord { cells: std::vec::IntoIter<Data>, fields: usize },
    Finished,
}

/// Tokenizes one worksheet into records, following the same atom protocol as
/// [`super::DelimitedTokenizer`].
///
/// Cell mapping:
/// - empty cells and empty strings -> `Null`
/// - integers, and floats with no fractional part that fit in `i64` -> `Integer`
/// - other finite floats -> `Float`
/// - strings -> `String` (kept as typed by the workbook author, no inference)
/// - booleans, dates, durations and error cells -> `String` of their display form
///
/// Every row of a worksheet range has the same width, so records are uniform.
pub struct WorkbookTokenizer {
    rows: std::vec::IntoIter<Vec<Data>>,
    position: Position,
    kind: Option<AtomKind>,
    payload: Payload,
}

impl WorkbookTokenizer {
    /// Open a workbook file and tokenize `sheet` (or the first sheet).
    pub fn from_path(path: impl AsRef<Path>, sheet: Option<&str>) -> ImportResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes, sheet)
    }

    /// Read a whole workbook from `input` and tokenize `sheet` (or the first sheet).
    pub fn from_reader(mut input: impl Read, sheet: Option<&str>) -> ImportResult<Self> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes, sheet)
    }

    fn from_bytes(bytes: Vec<u8>, sheet: Option<&str>) -> ImportResult<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let name = match sheet {
            Some(name) => name.to_string(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| ImportError::shape("workbook has no sheets"))?,
        };
        let range = workbook.worksheet_range(&name)?;
        let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

        Ok(Self {
            rows: rows.into_iter(),
            position: Position::BetweenRecords,
            kind: None,
            payload: Payload::None,
        })
    }

    fn set(&mut self, kind: Option<AtomKind>, payload: Payload) -> Option<AtomKind> {
        self.kind = kind;
        self.payload = payload;
        kind
    }
}

impl Extractor for WorkbookTokenizer {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        let position = std::mem::replace(&mut self.position, Position::Finished);
        let atom = match position {
            Position::BetweenRecords => match self.rows.next() {
                Some(row) => {
                    self.position = Position::InRecord {
                        cells: row.into_iter(),
                        fields: 0,
                    };
                    self.set(Some(AtomKind::StartRecord), Payload::None)
                }
                None => self.set(None, Payload::None),
            },
            Position::InRecord { mut cells, fields } => match cells.next() {
                Some(cell) => {
                    let value = convert_cell(&cell);
                    self.position = Position::InRecord {
                        cells,
                        fields: fields + 1,
                    };
                    self.set(Some(value.kind()), Payload::Scalar(value))
                }
                None => {
                    self.position = Position::BetweenRecords;
                    self.set(Some(AtomKind::EndRecord), Payload::Count(fields))
                }
            },
            Position::Finished => self.set(None, Payload::None),
        };
        Ok(atom)
    }

    fn current_kind(&self) -> Option<AtomKind> {
        self.kind
    }

    fn current_payload(&self) -> &Payload {
        &self.payload
    }
}

fn convert_cell(cell: &Data) -> Scalar {
    match cell {
        Data::Empty => Scalar::Null,
        Data::Int(i) => Scalar::Integer(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Scalar::Integer(*f as i64)
            } else if f.is_finite() {
                Scalar::Float(*f)
            } else {
                Scalar::Text(f.to_string())
            }
        }
        Data::String(s) if s.is_empty() => Scalar::Null,
        Data::String(s) => Scalar::Text(s.clone()),
        other => Scalar::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use calamine::Data;

    use super::convert_cell;
    use crate::types::Scalar;

    #[test]
    fn integral_floats_become_integers() {
        assert_eq!(convert_cell(&Data::Float(3.0)), Scalar::Integer(3));
        assert_eq!(convert_cell(&Data::Float(2.5)), Scalar::Float(2.5));
        assert_eq!(convert_cell(&Data::Int(-4)), Scalar::Integer(-4));
    }

    #[test]
    fn strings_are_not_reinterpreted() {
        assert_eq!(convert_cell(&Data::String("007".into())), Scalar::Text("007".into()));
        assert_eq!(convert_cell(&Data::String(String::new())), Scalar::Null);
        assert_eq!(convert_cell(&Data::Empty), Scalar::Null);
        assert_eq!(convert_cell(&Data::Bool(true)), Scalar::Text("true".into()));
    }
}
