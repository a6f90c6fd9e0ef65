//! Streaming conversion of atom streams into matrix documents.

use std::io::Write;

use serde::Serialize;
use serde_json::ser::Formatter;

use crate::error::{ImportError, ImportResult};
use crate::extract::{AtomKind, Extractor, Payload};
use crate::types::Layout;

use super::MATRIX_KIND;
use super::format::JsonStyle;

/// Counters reported once an atom stream has been fully emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    /// Matrix documents written (one per group).
    pub documents: usize,
    /// Records written across all documents.
    pub records: usize,
}

struct GroupState {
    label: String,
    records: usize,
    columns: Option<usize>,
    // Fields written so far while a record is open.
    open_record: Option<usize>,
}

enum State {
    Idle,
    InGroup(GroupState),
    Failed,
}

/// Writes one `datagator#Matrix` document per group, atom by atom.
///
/// Output mirrors atom arrival order; nothing is buffered beyond the writer itself. Every
/// record of a group must carry as many fields as the group's first record. A group without
/// records becomes the canonical empty matrix (`rows: [[]]`, 1x0).
///
/// After any error the emitter refuses further atoms and never closes the open document.
pub struct MatrixEmitter<W: Write> {
    writer: W,
    style: JsonStyle,
    layout: Layout,
    state: State,
    stats: EmitStats,
}

impl<W: Write> MatrixEmitter<W> {
    pub fn new(writer: W, layout: Layout, style: JsonStyle) -> Self {
        Self {
            writer,
            style,
            layout,
            state: State::Idle,
            stats: EmitStats::default(),
        }
    }

    pub fn stats(&self) -> EmitStats {
        self.stats
    }

    /// Pull every atom from `extractor` and emit it.
    pub fn emit_all<E: Extractor + ?Sized>(&mut self, extractor: &mut E) -> ImportResult<EmitStats> {
        while let Some(kind) = extractor.next_atom()? {
            self.accept(kind, extractor.current_payload())?;
        }
        self.ensure_closed()?;
        Ok(self.stats)
    }

    /// Emit a single atom.
    pub fn accept(&mut self, kind: AtomKind, payload: &Payload) -> ImportResult<()> {
        let result = self.dispatch(kind, payload);
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }

    /// Check that no group is left open, flush, and hand back the writer.
    pub fn finish(mut self) -> ImportResult<W> {
        self.ensure_closed()?;
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn ensure_closed(&mut self) -> ImportResult<()> {
        match &self.state {
            State::Idle => Ok(()),
            State::InGroup(group) => {
                let err = ImportError::structural(
                    &group.label,
                    group.records,
                    "atom stream ended inside an open group",
                );
                self.state = State::Failed;
                Err(err)
            }
            State::Failed => Err(failed()),
        }
    }

    fn dispatch(&mut self, kind: AtomKind, payload: &Payload) -> ImportResult<()> {
        match kind {
            AtomKind::StartGroup => self.start_group(payload),
            AtomKind::EndGroup => self.end_group(payload),
            AtomKind::StartRecord => self.start_record(),
            AtomKind::EndRecord => self.end_record(payload),
            AtomKind::Integer | AtomKind::Float | AtomKind::String | AtomKind::Null => {
                self.scalar(kind, payload)
            }
        }
    }

    fn start_group(&mut self, payload: &Payload) -> ImportResult<()> {
        let label = payload.as_label().unwrap_or_default().to_string();
        match &self.state {
            State::Idle => {}
            State::InGroup(group) => {
                return Err(ImportError::structural(
                    &group.label,
                    group.records,
                    format!("group '{label}' opened inside another group"),
                ));
            }
            State::Failed => return Err(failed()),
        }

        if self.stats.documents > 0 {
            self.writer.write_all(self.style.root_separator().as_bytes())?;
        }
        let layout = self.layout;
        self.style.begin_object(&mut self.writer)?;
        self.write_field("kind", MATRIX_KIND, true)?;
        self.write_field("columnHeaders", &layout.column_headers, false)?;
        self.write_field("rowHeaders", &layout.row_headers, false)?;
        self.write_key("rows", false)?;
        self.style.begin_array(&mut self.writer)?;

        self.state = State::InGroup(GroupState {
            label,
            records: 0,
            columns: None,
            open_record: None,
        });
        Ok(())
    }

    fn start_record(&mut self) -> ImportResult<()> {
        let group = self.group_mut("record opened outside of a group")?;
        if group.open_record.is_some() {
            return Err(ImportError::structural(
                &group.label,
                group.records,
                "record opened inside another record",
            ));
        }
        group.open_record = Some(0);
        let first = group.records == 0;

        self.style.begin_array_value(&mut self.writer, first)?;
        self.style.begin_array(&mut self.writer)?;
        Ok(())
    }

    fn scalar(&mut self, kind: AtomKind, payload: &Payload) -> ImportResult<()> {
        let group = self.group_mut("scalar outside of a group")?;
        let Some(fields) = group.open_record else {
            return Err(ImportError::structural(
                &group.label,
                group.records,
                "scalar outside of a record",
            ));
        };
        let value = match payload.as_scalar() {
            Some(value) if value.kind() == kind => value,
            _ => {
                return Err(ImportError::structural(
                    &group.label,
                    group.records,
                    format!("{kind:?} atom carries payload {payload:?}"),
                ));
            }
        };
        group.open_record = Some(fields + 1);

        self.style.begin_array_value(&mut self.writer, fields == 0)?;
        value.serialize(&mut serde_json::Serializer::with_formatter(
            &mut self.writer,
            self.style,
        ))?;
        self.style.end_array_value(&mut self.writer)?;
        Ok(())
    }

    fn end_record(&mut self, payload: &Payload) -> ImportResult<()> {
        let group = self.group_mut("record closed outside of a group")?;
        let index = group.records;
        let Some(seen) = group.open_record else {
            return Err(ImportError::structural(
                &group.label,
                index,
                "record closed without being opened",
            ));
        };
        let fields = payload.as_count().unwrap_or(seen);
        if fields != seen {
            return Err(ImportError::structural(
                &group.label,
                index,
                format!("record reports {fields} fields but carried {seen}"),
            ));
        }
        match group.columns {
            None => group.columns = Some(fields),
            Some(expected) if expected != fields => {
                return Err(ImportError::structural(
                    &group.label,
                    index,
                    format!("record has {fields} fields, expected {expected} like the first record"),
                ));
            }
            Some(_) => {}
        }
        group.open_record = None;
        group.records += 1;

        self.style.end_array(&mut self.writer)?;
        Ok(())
    }

    fn end_group(&mut self, payload: &Payload) -> ImportResult<()> {
        let group = match std::mem::replace(&mut self.state, State::Failed) {
            State::InGroup(group) => group,
            State::Idle => return Err(ImportError::structural("", 0, "group closed without being opened")),
            State::Failed => return Err(failed()),
        };
        if group.open_record.is_some() {
            return Err(ImportError::structural(
                &group.label,
                group.records,
                "group closed inside an open record",
            ));
        }
        let reported = payload.as_count().unwrap_or(group.records);
        if reported != group.records {
            return Err(ImportError::structural(
                &group.label,
                group.records,
                format!("group reports {reported} records but carried {}", group.records),
            ));
        }

        let (rows_count, columns_count) = match group.columns {
            Some(columns) => (group.records, columns),
            None => {
                // Canonical empty matrix: a single empty row.
                self.style.begin_array_value(&mut self.writer, true)?;
                self.style.begin_array(&mut self.writer)?;
                self.style.end_array(&mut self.writer)?;
                (1, 0)
            }
        };
        if self.layout.column_headers > rows_count || self.layout.row_headers > columns_count {
            return Err(ImportError::shape(format!(
                "layout {} exceeds the {rows_count}x{columns_count} matrix of group '{}'",
                self.layout, group.label
            )));
        }

        self.style.end_array(&mut self.writer)?;
        self.write_field("rowsCount", &rows_count, false)?;
        self.write_field("columnsCount", &columns_count, false)?;
        self.style.end_object(&mut self.writer)?;

        self.stats.documents += 1;
        self.stats.records += group.records;
        self.state = State::Idle;
        Ok(())
    }

    fn group_mut(&mut self, context: &str) -> ImportResult<&mut GroupState> {
        match &mut self.state {
            State::InGroup(group) => Ok(group),
            State::Idle => Err(ImportError::structural("", 0, context)),
            State::Failed => Err(failed()),
        }
    }

    fn write_key(&mut self, key: &str, first: bool) -> ImportResult<()> {
        self.style.begin_object_key(&mut self.writer, first)?;
        self.style.begin_string(&mut self.writer)?;
        self.style.write_string_fragment(&mut self.writer, key)?;
        self.style.end_string(&mut self.writer)?;
        self.style.end_object_key(&mut self.writer)?;
        self.style.begin_object_value(&mut self.writer)?;
        Ok(())
    }

    fn write_field<T: Serialize + ?Sized>(&mut self, key: &str, value: &T, first: bool) -> ImportResult<()> {
        self.write_key(key, first)?;
        value.serialize(&mut serde_json::Serializer::with_formatter(
            &mut self.writer,
            self.style,
        ))?;
        self.style.end_object_value(&mut self.writer)?;
        Ok(())
    }
}

fn failed() -> ImportError {
    ImportError::structural("", 0, "emitter stopped after an earlier error")
}

#[cfg(test)]
mod tests {
    use super::MatrixEmitter;
    use crate::error::ImportError;
    use crate::extract::{AtomKind, Payload, Replay};
    use crate::matrix::format::JsonStyle;
    use crate::types::{Layout, Scalar};

    fn group(label: &str, rows: &[&[i64]]) -> Vec<(AtomKind, Payload)> {
        let mut atoms = vec![(AtomKind::StartGroup, Payload::Label(label.to_string()))];
        for (i, row) in rows.iter().enumerate() {
            atoms.push((AtomKind::StartRecord, Payload::Count(i)));
            for v in row.iter() {
                atoms.push((AtomKind::Integer, Payload::Scalar(Scalar::Integer(*v))));
            }
            atoms.push((AtomKind::EndRecord, Payload::Count(row.len())));
        }
        atoms.push((AtomKind::EndGroup, Payload::Count(rows.len())));
        atoms
    }

    fn emit(atoms: Vec<(AtomKind, Payload)>, layout: Layout, style: JsonStyle) -> Result<String, ImportError> {
        let mut emitter = MatrixEmitter::new(Vec::new(), layout, style);
        emitter.emit_all(&mut Replay::new(atoms))?;
        Ok(String::from_utf8(emitter.finish()?).unwrap())
    }

    #[test]
    fn writes_compact_document() {
        let out = emit(group("g", &[&[1, 2], &[3, 4]]), Layout::default(), JsonStyle::Compact).unwrap();
        assert_eq!(
            out,
            r#"{"kind":"datagator#Matrix","columnHeaders":0,"rowHeaders":0,"rows":[[1,2],[3,4]],"rowsCount":2,"columnsCount":2}"#
        );
    }

    #[test]
    fn writes_standard_document() {
        let out = emit(group("g", &[&[1]]), Layout::new(1, 0), JsonStyle::Standard).unwrap();
        assert_eq!(
            out,
            r#"{"kind": "datagator#Matrix", "columnHeaders": 1, "rowHeaders": 0, "rows": [[1]], "rowsCount": 1, "columnsCount": 1}"#
        );
    }

    #[test]
    fn empty_group_becomes_one_by_zero() {
        let out = emit(group("g", &[]), Layout::default(), JsonStyle::Compact).unwrap();
        assert!(out.contains(r#""rows":[[]],"rowsCount":1,"columnsCount":0"#), "{out}");
    }

    #[test]
    fn consecutive_groups_use_the_root_separator() {
        let mut atoms = group("a", &[&[1]]);
        atoms.extend(group("b", &[&[2]]));
        let compact = emit(atoms.clone(), Layout::default(), JsonStyle::Compact).unwrap();
        assert_eq!(compact.lines().count(), 2);
        let standard = emit(atoms, Layout::default(), JsonStyle::Standard).unwrap();
        assert!(standard.contains("}{"));
    }

    #[test]
    fn mismatched_record_names_its_index() {
        let err = emit(group("g", &[&[1, 2], &[3]]), Layout::default(), JsonStyle::Compact).unwrap_err();
        match err {
            ImportError::Structural { group, record, .. } => {
                assert_eq!(group, "g");
                assert_eq!(record, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn failed_document_is_not_closed() {
        let mut emitter = MatrixEmitter::new(Vec::new(), Layout::default(), JsonStyle::Compact);
        let mut atoms = Replay::new(group("g", &[&[1, 2], &[3]]));
        assert!(emitter.emit_all(&mut atoms).is_err());
        // Further atoms are refused.
        assert!(emitter.accept(AtomKind::EndGroup, &Payload::Count(2)).is_err());
        assert!(emitter.finish().is_err());
    }

    #[test]
    fn unterminated_group_is_structural() {
        let mut atoms = group("g", &[&[1]]);
        atoms.pop();
        let err = emit(atoms, Layout::default(), JsonStyle::Compact).unwrap_err();
        assert!(matches!(err, ImportError::Structural { .. }));
    }

    #[test]
    fn scalar_outside_record_is_structural() {
        let atoms = vec![
            (AtomKind::StartGroup, Payload::Label("g".into())),
            (AtomKind::Integer, Payload::Scalar(Scalar::Integer(1))),
        ];
        let err = emit(atoms, Layout::default(), JsonStyle::Compact).unwrap_err();
        assert!(err.to_string().contains("scalar outside of a record"));
    }

    #[test]
    fn layout_larger_than_matrix_is_a_shape_error() {
        let err = emit(group("g", &[&[1]]), Layout::new(2, 0), JsonStyle::Compact).unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
    }

    #[test]
    fn group_count_must_match_records() {
        let mut atoms = group("g", &[&[1]]);
        *atoms.last_mut().unwrap() = (AtomKind::EndGroup, Payload::Count(5));
        let err = emit(atoms, Layout::default(), JsonStyle::Compact).unwrap_err();
        assert!(err.to_string().contains("reports 5 records"));
    }
}
