use std::fs;
use std::sync::{Arc, Mutex};

use datagator_importer::ImportError;
use datagator_importer::convert::{
    CompositeObserver, ConversionContext, ConversionObserver, ConversionSeverity, ConversionStats,
    ConvertOptions, FileObserver, convert_path, convert_paths,
};

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<(ConversionContext, ConversionStats)>>,
    failures: Mutex<Vec<ConversionSeverity>>,
    alerts: Mutex<Vec<ConversionSeverity>>,
}

impl ConversionObserver for RecordingObserver {
    fn on_success(&self, ctx: &ConversionContext, stats: ConversionStats) {
        self.successes.lock().unwrap().push((ctx.clone(), stats));
    }

    fn on_failure(&self, _ctx: &ConversionContext, severity: ConversionSeverity, _error: &ImportError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &ConversionContext, severity: ConversionSeverity, _error: &ImportError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn observed(obs: &Arc<RecordingObserver>, threshold: ConversionSeverity) -> ConvertOptions {
    ConvertOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: threshold,
        ..Default::default()
    }
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, ConversionSeverity::Critical);

    // Missing file -> InvalidSource -> Critical
    let _ = convert_path("tests/fixtures/does_not_exist.csv", Vec::new(), &opts).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ConversionSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![ConversionSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_non_critical_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, ConversionSeverity::Critical);

    // Ragged rows -> Structural -> Error severity (not Critical) -> should not alert
    let _ = convert_path("tests/fixtures/ragged.csv", Vec::new(), &opts).unwrap_err();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ConversionSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn lower_threshold_alerts_on_errors_too() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, ConversionSeverity::Error);

    let _ = convert_path("tests/fixtures/people.pdf", Vec::new(), &opts).unwrap_err();

    assert_eq!(*obs.alerts.lock().unwrap(), vec![ConversionSeverity::Error]);
}

#[test]
fn success_reports_context_and_counts() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = observed(&obs, ConversionSeverity::Critical);

    convert_paths(
        &["tests/fixtures/people.csv", "tests/fixtures/scores.tsv"],
        Vec::new(),
        &opts,
    )
    .unwrap();

    let successes = obs.successes.lock().unwrap();
    assert_eq!(successes.len(), 1);
    let (ctx, stats) = &successes[0];
    assert_eq!(ctx.format, "csv,tsv");
    assert_eq!(ctx.sources, 2);
    assert_eq!(
        *stats,
        ConversionStats {
            documents: 2,
            records: 7
        }
    );
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn composite_and_file_observers_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("import.log");
    let recorder = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn ConversionObserver>> =
        vec![recorder.clone(), Arc::new(FileObserver::new(&log))];
    let composite = CompositeObserver::new(observers);

    let opts = ConvertOptions {
        observer: Some(Arc::new(composite)),
        ..Default::default()
    };
    convert_path("tests/fixtures/people.csv", Vec::new(), &opts).unwrap();
    let _ = convert_path("tests/fixtures/does_not_exist.csv", Vec::new(), &opts).unwrap_err();

    assert_eq!(recorder.successes.lock().unwrap().len(), 1);
    assert_eq!(*recorder.alerts.lock().unwrap(), vec![ConversionSeverity::Critical]);

    let lines: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(" ok format=csv"));
    assert!(lines[0].contains("records=4"));
    assert!(lines[1].contains(" fail severity=Critical"));
    assert!(lines[2].contains(" ALERT severity=Critical"));
}
