//! The canonical `datagator#Matrix` document.
//!
//! ```text
//! {"kind": "datagator#Matrix", "columnHeaders": 1, "rowHeaders": 0,
//!  "rows": [["id", "name"], [1, "Ada"]], "rowsCount": 2, "columnsCount": 2}
//! ```
//!
//! - [`Matrix`]: in-memory model with shape validation on the way in
//! - [`emit::MatrixEmitter`]: writes documents straight from an atom stream
//! - [`format::JsonStyle`]: compact or "standard" (spaced, single-line) rendering
//!
//! Cells are JSON numbers, strings or `null`; any other JSON type is rejected.

pub mod emit;
pub mod format;

pub use emit::{EmitStats, MatrixEmitter};
pub use format::JsonStyle;

use std::fmt;
use std::io::{Read, Write};

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};

use crate::buffer::SpooledRowBuffer;
use crate::error::{ImportError, ImportResult};
use crate::extract::{AtomKind, Payload, Replay};
use crate::types::{Layout, Row, Scalar};

/// Value of the `kind` property of every matrix document.
pub const MATRIX_KIND: &str = "datagator#Matrix";

const FIELDS: &[&str] = &[
    "kind",
    "columnHeaders",
    "rowHeaders",
    "rows",
    "rowsCount",
    "columnsCount",
];

/// Which rows are kept when reading a matrix document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    /// Only the header rows (the column-header band); body rows are skipped unparsed.
    #[default]
    Headers,
    /// Every row.
    Full,
}

/// A 2-D table with a header band.
///
/// `header_rows` leading rows and `header_columns` leading columns form the header band; the
/// rest is the body. The empty matrix is 1x0 (`rows: [[]]`), never 0x0.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows_count: usize,
    columns_count: usize,
    header_rows: usize,
    header_columns: usize,
    rows: Vec<Row>,
}

impl Matrix {
    /// Build a complete matrix from uniform rows.
    pub fn new(layout: Layout, rows: Vec<Row>) -> ImportResult<Self> {
        let rows = if rows.is_empty() { vec![Vec::new()] } else { rows };
        let columns_count = rows[0].len();
        if let Some(idx) = rows.iter().position(|r| r.len() != columns_count) {
            return Err(ImportError::shape(format!(
                "row {idx} has {} cells, expected {columns_count}",
                rows[idx].len()
            )));
        }

        let matrix = Self {
            rows_count: rows.len(),
            columns_count,
            header_rows: layout.column_headers,
            header_columns: layout.row_headers,
            rows,
        };
        matrix.check_shape()?;
        Ok(matrix)
    }

    /// The canonical 1x0 empty matrix.
    pub fn empty() -> Self {
        Self {
            rows_count: 1,
            columns_count: 0,
            header_rows: 0,
            header_columns: 0,
            rows: vec![Vec::new()],
        }
    }

    /// Read a matrix document.
    pub fn from_reader<R: Read>(reader: R, projection: Projection) -> ImportResult<Self> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        read_document(&mut de, projection == Projection::Full, None)
    }

    pub fn from_slice(bytes: &[u8], projection: Projection) -> ImportResult<Self> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        read_document(&mut de, projection == Projection::Full, None)
    }

    pub fn from_json_str(s: &str, projection: Projection) -> ImportResult<Self> {
        Self::from_slice(s.as_bytes(), projection)
    }

    /// Read a matrix document, keeping header rows in memory and appending body rows to
    /// `body`.
    ///
    /// The returned matrix is the header projection. `body` must be empty on entry; a
    /// non-empty buffer is rejected untouched. On any later error `body` is cleared.
    pub fn from_reader_spooled<R: Read>(reader: R, body: &mut SpooledRowBuffer) -> ImportResult<Self> {
        if !body.is_empty() {
            return Err(ImportError::shape(format!(
                "body buffer already holds {} rows",
                body.len()
            )));
        }
        let mut de = serde_json::Deserializer::from_reader(reader);
        let result = read_document(&mut de, false, Some(&mut *body));
        if result.is_err() {
            body.clear();
        }
        result
    }

    pub fn rows_count(&self) -> usize {
        self.rows_count
    }

    pub fn columns_count(&self) -> usize {
        self.columns_count
    }

    /// Depth of the header-row band (`columnHeaders`).
    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    /// Depth of the header-column band (`rowHeaders`).
    pub fn header_columns(&self) -> usize {
        self.header_columns
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.header_rows, self.header_columns)
    }

    /// Rows held in memory: all rows, or only the header rows for a header projection.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// `true` when every row is held in memory.
    pub fn is_complete(&self) -> bool {
        self.rows.len() == self.rows_count
    }

    /// The header-row slice as its own matrix.
    pub fn column_headers(&self) -> Self {
        Self {
            rows_count: self.header_rows,
            columns_count: self.columns_count,
            header_rows: 0,
            header_columns: self.header_columns,
            rows: self.rows[..self.header_rows.min(self.rows.len())].to_vec(),
        }
    }

    /// The matrix as an atom stream (one group labelled `label`).
    pub fn atoms(&self, label: &str) -> Replay {
        let mut atoms = vec![(AtomKind::StartGroup, Payload::Label(label.to_string()))];
        for (idx, row) in self.rows.iter().enumerate() {
            atoms.push((AtomKind::StartRecord, Payload::Count(idx)));
            atoms.extend(row.iter().map(|v| (v.kind(), Payload::Scalar(v.clone()))));
            atoms.push((AtomKind::EndRecord, Payload::Count(row.len())));
        }
        atoms.push((AtomKind::EndGroup, Payload::Count(self.rows.len())));
        Replay::new(atoms)
    }

    /// Write the matrix as one document.
    pub fn write_to<W: Write>(&self, writer: W, style: JsonStyle) -> ImportResult<W> {
        if !self.is_complete() {
            return Err(ImportError::shape(format!(
                "only {} of {} rows are in memory",
                self.rows.len(),
                self.rows_count
            )));
        }
        let mut emitter = MatrixEmitter::new(writer, self.layout(), style);
        emitter.emit_all(&mut self.atoms(""))?;
        emitter.finish()
    }

    pub fn to_json_string(&self, style: JsonStyle) -> ImportResult<String> {
        let out = self.write_to(Vec::new(), style)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn check_shape(&self) -> ImportResult<()> {
        if self.header_rows > self.rows_count {
            return Err(ImportError::shape(format!(
                "columnHeaders {} exceeds rowsCount {}",
                self.header_rows, self.rows_count
            )));
        }
        if self.header_columns > self.columns_count {
            return Err(ImportError::shape(format!(
                "rowHeaders {} exceeds columnsCount {}",
                self.header_columns, self.columns_count
            )));
        }
        // The empty matrix is 1 x 0.
        if self.columns_count == 0 && self.rows_count != 1 {
            return Err(ImportError::shape(format!(
                "a matrix with no columns must have exactly one row (rowsCount {})",
                self.rows_count
            )));
        }
        Ok(())
    }
}

fn read_document<'de, D>(
    de: &mut serde_json::Deserializer<D>,
    keep_body: bool,
    spool: Option<&mut SpooledRowBuffer>,
) -> ImportResult<Matrix>
where
    D: serde_json::de::Read<'de>,
{
    let mut spool_error = None;
    let seed = DocumentSeed {
        keep_body,
        spool,
        spool_error: &mut spool_error,
    };
    let parsed = seed.deserialize(&mut *de);
    if let Some(err) = spool_error {
        return Err(err);
    }
    let raw = parsed?;
    de.end()?;
    raw.into_matrix()
}

#[derive(Default)]
struct RawDocument {
    kind: Option<String>,
    header_rows: Option<usize>,
    header_columns: Option<usize>,
    rows: Option<RowsSummary>,
    rows_count: Option<usize>,
    columns_count: Option<usize>,
}

impl RawDocument {
    fn into_matrix(self) -> ImportResult<Matrix> {
        match self.kind.as_deref() {
            Some(MATRIX_KIND) => {}
            Some(other) => return Err(ImportError::shape(format!("unexpected kind '{other}'"))),
            None => return Err(ImportError::shape("missing 'kind'")),
        }
        let required = |v: Option<usize>, name: &str| {
            v.ok_or_else(|| ImportError::shape(format!("missing '{name}'")))
        };
        let header_rows = required(self.header_rows, "columnHeaders")?;
        let header_columns = required(self.header_columns, "rowHeaders")?;
        let rows_count = required(self.rows_count, "rowsCount")?;
        let columns_count = required(self.columns_count, "columnsCount")?;
        let summary = self.rows.ok_or_else(|| ImportError::shape("missing 'rows'"))?;

        let matrix = Matrix {
            rows_count,
            columns_count,
            header_rows,
            header_columns,
            rows: summary.rows,
        };
        matrix.check_shape()?;

        if summary.seen != rows_count {
            return Err(ImportError::shape(format!(
                "rowsCount {rows_count} but {} rows present",
                summary.seen
            )));
        }
        if let Some(idx) = summary.ragged_at {
            return Err(ImportError::shape(format!("row {idx} differs in length from row 0")));
        }
        match summary.width {
            Some(width) if width != columns_count => Err(ImportError::shape(format!(
                "columnsCount {columns_count} but rows have {width} cells"
            ))),
            _ => Ok(matrix),
        }
    }
}

struct DocumentSeed<'a> {
    keep_body: bool,
    spool: Option<&'a mut SpooledRowBuffer>,
    spool_error: &'a mut Option<ImportError>,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = RawDocument;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = RawDocument;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a datagator#Matrix object")
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut doc = RawDocument::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "kind" => doc.kind = Some(map.next_value()?),
                "columnHeaders" => doc.header_rows = Some(map.next_value()?),
                "rowHeaders" => doc.header_columns = Some(map.next_value()?),
                "rowsCount" => doc.rows_count = Some(map.next_value()?),
                "columnsCount" => doc.columns_count = Some(map.next_value()?),
                "rows" => {
                    let (Some(header_rows), Some(_)) = (doc.header_rows, doc.header_columns) else {
                        return Err(de::Error::custom(
                            "'columnHeaders' and 'rowHeaders' must precede 'rows'",
                        ));
                    };
                    doc.rows = Some(map.next_value_seed(RowsSeed {
                        header_rows,
                        keep_body: self.keep_body,
                        spool: self.spool.as_deref_mut(),
                        spool_error: &mut *self.spool_error,
                    })?);
                }
                other => return Err(de::Error::unknown_field(other, FIELDS)),
            }
        }
        Ok(doc)
    }
}

#[derive(Default)]
struct RowsSummary {
    rows: Vec<Row>,
    seen: usize,
    width: Option<usize>,
    ragged_at: Option<usize>,
}

impl RowsSummary {
    fn observe(&mut self, width: usize) {
        match self.width {
            None => self.width = Some(width),
            Some(w) if w != width && self.ragged_at.is_none() => self.ragged_at = Some(self.seen),
            Some(_) => {}
        }
        self.seen += 1;
    }
}

struct RowsSeed<'a> {
    header_rows: usize,
    keep_body: bool,
    spool: Option<&'a mut SpooledRowBuffer>,
    spool_error: &'a mut Option<ImportError>,
}

impl<'de> DeserializeSeed<'de> for RowsSeed<'_> {
    type Value = RowsSummary;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for RowsSeed<'_> {
    type Value = RowsSummary;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of rows")
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut summary = RowsSummary::default();
        loop {
            let in_header = summary.seen < self.header_rows;
            let width = if in_header || self.keep_body {
                let Some(row) = seq.next_element::<Row>()? else { break };
                let width = row.len();
                summary.rows.push(row);
                width
            } else if let Some(spool) = self.spool.as_deref_mut() {
                let Some(row) = seq.next_element::<Row>()? else { break };
                let width = row.len();
                if let Err(err) = spool.append(row) {
                    *self.spool_error = Some(err);
                    return Err(de::Error::custom("row buffer failure"));
                }
                width
            } else {
                let Some(width) = seq.next_element_seed(CellCounter)? else { break };
                width
            };
            summary.observe(width);
        }
        Ok(summary)
    }
}

// Counts the cells of a body row without keeping them. Each cell must still be a scalar.
struct CellCounter;

impl<'de> DeserializeSeed<'de> for CellCounter {
    type Value = usize;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for CellCounter {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a row array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut n = 0;
        while seq.next_element::<Scalar>()?.is_some() {
            n += 1;
        }
        Ok(n)
    }
}
