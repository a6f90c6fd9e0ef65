use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ImportError;
use crate::matrix::EmitStats;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConversionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// The conversion failed on its input (bad shape, unsupported format, malformed data).
    Error,
    /// Infrastructure failure: unreadable source, failing sink or spool file.
    Critical,
}

impl ConversionSeverity {
    /// Severity of a failed conversion.
    pub fn of(error: &ImportError) -> Self {
        match error {
            ImportError::Io(_) | ImportError::InvalidSource { .. } | ImportError::BufferPoisoned => {
                Self::Critical
            }
            ImportError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            ImportError::Json(err) if err.is_io() => Self::Critical,
            _ => Self::Error,
        }
    }
}

/// Context about a conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionContext {
    /// The (first) input path.
    pub path: PathBuf,
    /// Format key used; comma-separated when several sources use different keys.
    pub format: String,
    /// Number of input sources.
    pub sources: usize,
}

/// Stats reported on successful conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Matrix documents written.
    pub documents: usize,
    /// Records written across all documents.
    pub records: usize,
}

impl From<EmitStats> for ConversionStats {
    fn from(stats: EmitStats) -> Self {
        Self {
            documents: stats.documents,
            records: stats.records,
        }
    }
}

/// Observer interface for conversion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait ConversionObserver: Send + Sync {
    fn on_success(&self, _ctx: &ConversionContext, _stats: ConversionStats) {}

    fn on_failure(&self, _ctx: &ConversionContext, _severity: ConversionSeverity, _error: &ImportError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to a list of observers, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ConversionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ConversionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ConversionObserver for CompositeObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs conversion events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl ConversionObserver for StdErrObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        eprintln!(
            "[import][ok] format={} path={} sources={} documents={} records={}",
            ctx.format,
            ctx.path.display(),
            ctx.sources,
            stats.documents,
            stats.records
        );
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        eprintln!(
            "[import][{:?}] format={} path={} err={}",
            severity,
            ctx.format,
            ctx.path.display(),
            error
        );
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        eprintln!(
            "[ALERT][import][{:?}] format={} path={} err={}",
            severity,
            ctx.format,
            ctx.path.display(),
            error
        );
    }
}

/// Appends conversion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl ConversionObserver for FileObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        self.append_line(&format!(
            "{} ok format={} path={} documents={} records={}",
            unix_ts(),
            ctx.format,
            ctx.path.display(),
            stats.documents,
            stats.records
        ));
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        self.append_line(&format!(
            "{} fail severity={:?} format={} path={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.path.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ImportError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={} path={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.path.display(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::ConversionSeverity;
    use crate::error::ImportError;

    #[test]
    fn io_failures_are_critical() {
        let io = ImportError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(ConversionSeverity::of(&io), ConversionSeverity::Critical);
        assert_eq!(
            ConversionSeverity::of(&ImportError::BufferPoisoned),
            ConversionSeverity::Critical
        );
    }

    #[test]
    fn input_failures_are_errors() {
        let err = ImportError::UnsupportedFormat { key: "pdf".into() };
        assert_eq!(ConversionSeverity::of(&err), ConversionSeverity::Error);
        let err = ImportError::Shape { message: "x".into() };
        assert_eq!(ConversionSeverity::of(&err), ConversionSeverity::Error);
        assert!(ConversionSeverity::Error < ConversionSeverity::Critical);
    }
}
