//! Conversion entrypoints: tabular files in, `datagator#Matrix` documents out.
//!
//! Most callers should use [`convert_path`] (one file, one document) or [`convert_paths`]
//! (several files, one document each, written back to back in input order).
//!
//! - If [`ConvertOptions::format`] is `None`, each file's format key is its extension.
//! - If a [`ConversionObserver`] is provided, success/failure/alerts are reported to it.
//!
//! ```no_run
//! use datagator_importer::convert::{convert_path, ConvertOptions};
//! use datagator_importer::types::Layout;
//!
//! # fn main() -> Result<(), datagator_importer::ImportError> {
//! let opts = ConvertOptions {
//!     layout: Layout::new(1, 0),
//!     ..Default::default()
//! };
//! let mut out = Vec::new();
//! let stats = convert_path("people.csv", &mut out, &opts)?;
//! println!("records={}", stats.records);
//! # Ok(())
//! # }
//! ```
//!
//! Writing to a file is atomic: [`convert_to_file`] renders into a temporary file next to the
//! target and only renames it into place once every document has been written.

pub mod observability;

pub use observability::{
    CompositeObserver, ConversionContext, ConversionObserver, ConversionSeverity, ConversionStats,
    FileObserver, StdErrObserver,
};

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::ImportResult;
use crate::extract::{Chain, Extractor, FileSource, FormatRegistry};
use crate::matrix::{EmitStats, JsonStyle, MatrixEmitter};
use crate::types::Layout;

/// Options controlling conversion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct ConvertOptions {
    /// Format key for every input; if `None`, taken from each file's extension.
    pub format: Option<String>,
    /// Header band depths written into every document.
    pub layout: Layout,
    pub style: JsonStyle,
    /// Tokenizers available to the conversion.
    pub registry: Arc<FormatRegistry>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn ConversionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: ConversionSeverity,
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("format", &self.format)
            .field("layout", &self.layout)
            .field("style", &self.style)
            .field("registry", &self.registry)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            format: None,
            layout: Layout::default(),
            style: JsonStyle::default(),
            registry: Arc::new(FormatRegistry::standard()),
            observer: None,
            alert_at_or_above: ConversionSeverity::Critical,
        }
    }
}

impl ConvertOptions {
    fn format_key(&self, path: &Path) -> String {
        match &self.format {
            Some(key) => key.to_ascii_lowercase(),
            None => FileSource::extension_key(path),
        }
    }
}

/// Drive `extractor` to exhaustion, writing one matrix document per group to `writer`.
///
/// This is the lowest-level entry point; it does not report to any observer.
pub fn convert<E, W>(extractor: &mut E, writer: W, layout: Layout, style: JsonStyle) -> ImportResult<EmitStats>
where
    E: Extractor + ?Sized,
    W: Write,
{
    let mut emitter = MatrixEmitter::new(writer, layout, style);
    let stats = emitter.emit_all(extractor)?;
    emitter.finish()?;
    Ok(stats)
}

/// Convert a single file.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with document and record counts
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
pub fn convert_path(path: impl AsRef<Path>, writer: impl Write, options: &ConvertOptions) -> ImportResult<ConversionStats> {
    convert_paths(&[path.as_ref()], writer, options)
}

/// Convert several files into consecutive documents, in input order.
///
/// Every source is opened before anything is written, so a missing or unsupported input
/// fails the call without producing partial output.
pub fn convert_paths<P, W>(paths: &[P], writer: W, options: &ConvertOptions) -> ImportResult<ConversionStats>
where
    P: AsRef<Path>,
    W: Write,
{
    let ctx = context_for(paths, options);
    let result = run_paths(paths, writer, options);
    report(options, &ctx, &result);
    result
}

/// Convert `paths` into the file at `output`, replacing it only on success.
pub fn convert_to_file<P>(paths: &[P], output: impl AsRef<Path>, options: &ConvertOptions) -> ImportResult<ConversionStats>
where
    P: AsRef<Path>,
{
    let ctx = context_for(paths, options);
    let result = write_atomically(paths, output.as_ref(), options);
    report(options, &ctx, &result);
    result
}

fn write_atomically<P: AsRef<Path>>(paths: &[P], output: &Path, options: &ConvertOptions) -> ImportResult<ConversionStats> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    let stats = run_paths(paths, BufWriter::new(staged.as_file_mut()), options)?;
    staged.persist(output).map_err(|e| e.error)?;
    Ok(stats)
}

fn run_paths<P: AsRef<Path>, W: Write>(paths: &[P], writer: W, options: &ConvertOptions) -> ImportResult<ConversionStats> {
    let mut sources = Chain::new(Vec::new());
    for path in paths {
        let path = path.as_ref();
        let source = FileSource::open_as(path, &options.format_key(path), &options.registry)?;
        sources.push(Box::new(source));
    }
    let stats = convert(&mut sources, writer, options.layout, options.style)?;
    Ok(stats.into())
}

fn context_for<P: AsRef<Path>>(paths: &[P], options: &ConvertOptions) -> ConversionContext {
    let mut keys: Vec<String> = Vec::new();
    for path in paths {
        let key = options.format_key(path.as_ref());
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    ConversionContext {
        path: paths
            .first()
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_default(),
        format: keys.join(","),
        sources: paths.len(),
    }
}

fn report(options: &ConvertOptions, ctx: &ConversionContext, result: &ImportResult<ConversionStats>) {
    let Some(obs) = options.observer.as_ref() else {
        return;
    };
    match result {
        Ok(stats) => obs.on_success(ctx, *stats),
        Err(e) => {
            let sev = ConversionSeverity::of(e);
            obs.on_failure(ctx, sev, e);
            if sev >= options.alert_at_or_above {
                obs.on_alert(ctx, sev, e);
            }
        }
    }
}

/// Convenience helper for callers that want an owned request object.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    /// Input files, converted in order.
    pub paths: Vec<PathBuf>,
    /// Output file; if `None`, documents go to stdout.
    pub output: Option<PathBuf>,
    pub options: ConvertOptions,
}

impl ConversionRequest {
    /// Execute the request with [`convert_to_file`] or, without an output path,
    /// [`convert_paths`] on stdout.
    pub fn run(&self) -> ImportResult<ConversionStats> {
        match &self.output {
            Some(output) => convert_to_file(&self.paths, output, &self.options),
            None => convert_paths(&self.paths, BufWriter::new(io::stdout().lock()), &self.options),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ConvertOptions, context_for, convert};
    use crate::extract::{AtomKind, Payload, Replay};
    use crate::matrix::JsonStyle;
    use crate::types::{Layout, Scalar};

    #[test]
    fn converts_an_in_memory_stream() {
        let mut atoms = Replay::new(vec![
            (AtomKind::StartGroup, Payload::Label("t".into())),
            (AtomKind::StartRecord, Payload::Count(0)),
            (AtomKind::String, Payload::Scalar(Scalar::from("x"))),
            (AtomKind::EndRecord, Payload::Count(1)),
            (AtomKind::EndGroup, Payload::Count(1)),
        ]);
        let mut out = Vec::new();
        let stats = convert(&mut atoms, &mut out, Layout::default(), JsonStyle::Compact).unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"kind":"datagator#Matrix","columnHeaders":0,"rowHeaders":0,"rows":[["x"]],"rowsCount":1,"columnsCount":1}"#
        );
    }

    #[test]
    fn context_lists_distinct_format_keys() {
        let opts = ConvertOptions::default();
        let ctx = context_for(&["a.csv", "b.TSV", "c.csv"], &opts);
        assert_eq!(ctx.format, "csv,tsv");
        assert_eq!(ctx.sources, 3);
        assert_eq!(ctx.path, std::path::PathBuf::from("a.csv"));

        let forced = ConvertOptions {
            format: Some("TSV".into()),
            ..Default::default()
        };
        assert_eq!(context_for(&["a.csv"], &forced).format, "tsv");
    }

    #[test]
    fn options_debug_hides_the_observer() {
        let opts = ConvertOptions {
            observer: Some(Arc::new(super::StdErrObserver)),
            ..Default::default()
        };
        let dbg = format!("{opts:?}");
        assert!(dbg.contains("observer_set: true"));
        assert!(dbg.contains("csv"));
    }
}
