//! Full runs against a temporary history file.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use qualitywatch_adapters::{AdapterError, Fetcher, MetricSource, StaticSource};
use qualitywatch_core::{
    HistoryStore, Measurement, MetricDefinition, RecordValue, Runner, Status, Targets,
    DEFAULT_WINDOW,
};
use tempfile::TempDir;

fn date(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 6, 0, 0).unwrap()
}

fn lower_is_better(id: &str, subject: Option<&str>) -> MetricDefinition {
    let builder = MetricDefinition::builder(id).targets(Targets::new(0.0, 2.0));
    match subject {
        Some(subject) => builder.source("manual", subject),
        None => builder,
    }
    .build()
    .unwrap()
}

fn manual(values: &[(&str, f64)]) -> Arc<dyn MetricSource> {
    let source = values
        .iter()
        .fold(StaticSource::builder("manual"), |builder, (subject, value)| {
            builder.value(*subject, Measurement::from_raw(*value))
        })
        .build();
    Arc::new(source)
}

#[tokio::test]
async fn statuses_for_measured_unmeasurable_and_unbound_metrics() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::builder(HistoryStore::new(dir.path().join("history.jsonl")))
        .source(manual(&[("one", 1.0), ("sentinel", -1.0)]))
        .metric(lower_is_better("measured", Some("one")))
        .metric(lower_is_better("unmeasurable", Some("sentinel")))
        .metric(lower_is_better("unbound", None))
        .build()
        .unwrap();

    let report = runner.run(date(1)).await.unwrap();

    assert_eq!(report.get("measured").unwrap().status, Status::Yellow);
    assert_eq!(report.get("unmeasurable").unwrap().status, Status::Missing);
    assert_eq!(report.get("unbound").unwrap().status, Status::MissingSource);
    assert!(report.get("unbound").unwrap().value.is_unavailable());
}

#[tokio::test]
async fn status_since_tracks_uninterrupted_status() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    for (day, value) in [(1, 5.0), (2, 6.0), (3, 0.0)] {
        let runner = Runner::builder(HistoryStore::new(&path))
            .source(manual(&[("project", value)]))
            .metric(lower_is_better("m1", Some("project")))
            .build()
            .unwrap();
        runner.run(date(day)).await.unwrap();
    }

    let lines: Vec<_> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<qualitywatch_core::HistoryRecord>(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    let m1 = |n: usize| lines[n].get("m1").unwrap().clone();
    assert_eq!(m1(0).status(), Some(Status::Red));
    assert_eq!(m1(0).since(), Some(date(1)));
    assert_eq!(m1(1).status(), Some(Status::Red));
    assert_eq!(m1(1).since(), Some(date(1)));
    assert_eq!(m1(2).status(), Some(Status::Perfect));
    assert_eq!(m1(2).since(), Some(date(3)));
}

#[tokio::test]
async fn non_finite_measurements_keep_the_history_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let source: Arc<dyn MetricSource> = Arc::new(
        StaticSource::builder("manual")
            .value("overflow", Measurement::Number(f64::INFINITY))
            .value("tiny", Measurement::ratio(1.0, f64::MIN_POSITIVE))
            .build(),
    );

    for day in 1..=3 {
        let runner = Runner::builder(HistoryStore::new(&path))
            .source(source.clone())
            .metric(lower_is_better("overflow", Some("overflow")))
            .metric(lower_is_better("tiny", Some("tiny")))
            .build()
            .unwrap();
        let report = runner.run(date(day)).await.unwrap();
        assert_eq!(report.get("overflow").unwrap().status, Status::Missing);
        assert_eq!(report.get("tiny").unwrap().status, Status::Missing);
    }

    let history = HistoryStore::new(&path);
    assert_eq!(history.complete().unwrap().len(), 3);

    let last = history.last_record().unwrap().unwrap();
    assert_eq!(last.date, date(3));
    let overflow = last.get("overflow").unwrap();
    assert!(overflow.value().is_unavailable());
    assert_eq!(overflow.since(), Some(date(1)));

    let report = history.clean_history(DEFAULT_WINDOW).unwrap();
    assert_eq!(report.lines_before, 3);
    assert_eq!(report.lines_after, 2);
}

#[tokio::test]
async fn renamed_metric_keeps_its_status_since() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");

    let before = Runner::builder(HistoryStore::new(&path))
        .source(manual(&[("project", 5.0)]))
        .metric(lower_is_better("violations", Some("project")))
        .build()
        .unwrap();
    before.run(date(1)).await.unwrap();

    let renamed = MetricDefinition::builder("rule-violations")
        .former_id("violations")
        .source("manual", "project")
        .targets(Targets::new(0.0, 2.0))
        .build()
        .unwrap();
    let after = Runner::builder(HistoryStore::new(&path))
        .source(manual(&[("project", 6.0)]))
        .metric(renamed)
        .build()
        .unwrap();
    let report = after.run(date(2)).await.unwrap();

    let result = report.get("rule-violations").unwrap();
    assert_eq!(result.status, Status::Red);
    assert_eq!(result.since, date(1));
    assert_eq!(after.trend("rule-violations", DEFAULT_WINDOW).unwrap().len(), 2);
}

#[tokio::test]
async fn meta_metrics_report_bucket_shares() {
    let dir = TempDir::new().unwrap();
    // 7 within target, 2 within low target, 1 beyond it.
    let values: Vec<(String, f64)> = (0..10)
        .map(|n| {
            let value = match n {
                0..=6 => 0.0,
                7 | 8 => 1.0,
                _ => 9.0,
            };
            (format!("s{n}"), value)
        })
        .collect();
    let pairs: Vec<(&str, f64)> = values.iter().map(|(s, v)| (s.as_str(), *v)).collect();

    let runner = Runner::builder(HistoryStore::new(dir.path().join("history.jsonl")))
        .source(manual(&pairs))
        .metrics(
            values
                .iter()
                .map(|(subject, _)| lower_is_better(&format!("m-{subject}"), Some(subject.as_str()))),
        )
        .build()
        .unwrap();

    let report = runner.run(date(1)).await.unwrap();
    let value = |id: &str| report.get(id).unwrap().value.clone();

    assert_eq!(value("GreenMetaMetric"), RecordValue::Number(70.0));
    assert_eq!(value("YellowMetaMetric"), RecordValue::Number(20.0));
    assert_eq!(value("RedMetaMetric"), RecordValue::Number(10.0));
    assert_eq!(value("GreyMetaMetric"), RecordValue::Number(0.0));
    assert_eq!(value("MissingMetaMetric"), RecordValue::Number(0.0));
}

#[tokio::test]
async fn runs_without_metrics_leave_meta_metrics_missing() {
    let dir = TempDir::new().unwrap();
    let runner = Runner::builder(HistoryStore::new(dir.path().join("history.jsonl")))
        .build()
        .unwrap();

    let report = runner.run(date(1)).await.unwrap();
    assert!(report.metrics.is_empty());
    assert!(report.meta.iter().all(|m| m.status == Status::Missing));
}

#[tokio::test]
async fn identical_runs_are_cleaned_and_recent_stays_bounded() {
    let dir = TempDir::new().unwrap();
    let history = HistoryStore::new(dir.path().join("history.jsonl"));
    let runner = Runner::builder(history.clone())
        .source(manual(&[("project", 1.0)]))
        .metric(lower_is_better("m1", Some("project")))
        .build()
        .unwrap();

    let start = date(1);
    for n in 0..5 {
        runner.run(start + Duration::hours(n)).await.unwrap();
    }

    // Same value, status and status start in every run: only the dates
    // differ, so the middle three lines collapse.
    let report = history.clean_history(DEFAULT_WINDOW).unwrap();
    assert_eq!(report.duplicates_removed, 3);

    let dates: Vec<_> = history.complete().unwrap().iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![start, start + Duration::hours(4)]);
    assert!(runner.trend("m1", DEFAULT_WINDOW).unwrap().len() <= DEFAULT_WINDOW);
}

/// A source whose host never answers in time.
#[derive(Debug, Default)]
struct Unresponsive {
    calls: AtomicUsize,
}

#[async_trait]
impl MetricSource for Unresponsive {
    fn name(&self) -> &str {
        "slow"
    }

    fn host(&self) -> Option<&str> {
        Some("slow.example.org")
    }

    async fn value(&self, _subject: &str) -> Result<Measurement, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(Measurement::Number(0.0))
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_host_is_not_asked_again_in_the_same_run() {
    let dir = TempDir::new().unwrap();
    let slow = Arc::new(Unresponsive::default());

    let metric = |id: &str, subject: &str| {
        MetricDefinition::builder(id)
            .source("slow", subject)
            .targets(Targets::new(0.0, 2.0))
            .build()
            .unwrap()
    };
    let runner = Runner::builder(HistoryStore::new(dir.path().join("history.jsonl")))
        .source(slow.clone())
        .fetcher(
            Fetcher::builder()
                .max_concurrent(1)
                .timeout(StdDuration::from_secs(1))
                .build(),
        )
        .metric(metric("a", "one"))
        .metric(metric("b", "two"))
        .metric(metric("c", "one"))
        .build()
        .unwrap();

    let report = runner.run(date(1)).await.unwrap();

    assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    for id in ["a", "b", "c"] {
        assert_eq!(report.get(id).unwrap().status, Status::Missing);
    }
}
