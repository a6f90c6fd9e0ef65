//! File-source assembler.

use std::cell::Cell;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{ImportError, ImportResult};

use super::{AtomKind, Chain, Extractor, FormatRegistry, GroupMarker, Payload};

/// One local file presented as a complete group.
///
/// The tokenizer is picked from a [`FormatRegistry`] by format key and wrapped as
/// `Chain[StartGroup, tokenizer, EndGroup]`:
///
/// - the `StartGroup` label is the file's base name (without extension)
/// - the `EndGroup` count is the number of `EndRecord` atoms that passed through this source
/// - every `StartRecord` payload is replaced by the 0-based ordinal of the record it opens
/// - structural errors raised by the tokenizer without a group are labelled with this one
pub struct FileSource {
    path: PathBuf,
    label: String,
    inner: Chain,
    records: Rc<Cell<usize>>,
    ordinal: Payload,
}

impl FileSource {
    /// Open `path`, choosing the tokenizer by its (lower-cased) extension.
    pub fn open(path: impl AsRef<Path>, registry: &FormatRegistry) -> ImportResult<Self> {
        let path = path.as_ref();
        Self::open_as(path, &Self::extension_key(path), registry)
    }

    /// Format key implied by `path`: its lower-cased extension, or `""` when it has none.
    pub fn extension_key(path: &Path) -> String {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Open `path` with the tokenizer registered under `key`, ignoring the extension.
    pub fn open_as(path: impl AsRef<Path>, key: &str, registry: &FormatRegistry) -> ImportResult<Self> {
        // Resolve the format before touching the file.
        let factory = registry.factory(key)?;

        let path = std::path::absolute(path.as_ref()).map_err(|e| ImportError::InvalidSource {
            path: path.as_ref().to_path_buf(),
            message: e.to_string(),
        })?;
        if !path.is_file() {
            return Err(ImportError::InvalidSource {
                path,
                message: "not a regular file".to_string(),
            });
        }
        let file = File::open(&path).map_err(|e| ImportError::InvalidSource {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let tokenizer = factory(Box::new(BufReader::new(file)))?;

        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let records = Rc::new(Cell::new(0));

        let start = {
            let label = label.clone();
            GroupMarker::start(move || label.clone())
        };
        let end = {
            let records = Rc::clone(&records);
            GroupMarker::end(move || records.get())
        };

        Ok(Self {
            path,
            label,
            inner: Chain::new(vec![Box::new(start), tokenizer, Box::new(end)]),
            records,
            ordinal: Payload::None,
        })
    }

    /// Absolute path of the source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Group label (the file's base name).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Records completed so far.
    pub fn records(&self) -> usize {
        self.records.get()
    }
}

impl Extractor for FileSource {
    fn next_atom(&mut self) -> ImportResult<Option<AtomKind>> {
        let kind = self.inner.next_atom().map_err(|err| match err {
            ImportError::Structural {
                group,
                record,
                message,
            } if group.is_empty() => ImportError::Structural {
                group: self.label.clone(),
                record,
                message,
            },
            other => other,
        })?;
        match kind {
            Some(AtomKind::StartRecord) => self.ordinal = Payload::Count(self.records.get()),
            Some(AtomKind::EndRecord) => self.records.set(self.records.get() + 1),
            _ => {}
        }
        Ok(kind)
    }

    fn current_kind(&self) -> Option<AtomKind> {
        self.inner.current_kind()
    }

    fn current_payload(&self) -> &Payload {
        if self.current_kind() == Some(AtomKind::StartRecord) {
            return &self.ordinal;
        }
        self.inner.current_payload()
    }
}
