//! Launch telemetry.
//!
//! Records are reporting-only; nothing in the sort reads them back.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::geometry::LaunchParameters;
use crate::accel::EventTimestamps;

/// Unit for reported durations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Resolution {
    #[serde(rename = "ns")]
    #[value(name = "ns")]
    Nanoseconds,
    #[default]
    #[serde(rename = "us")]
    #[value(name = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    #[value(name = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    #[value(name = "s")]
    Seconds,
}

impl Resolution {
    pub fn nanos_per_unit(self) -> u64 {
        match self {
            Resolution::Nanoseconds => 1,
            Resolution::Microseconds => 1_000,
            Resolution::Milliseconds => 1_000_000,
            Resolution::Seconds => 1_000_000_000,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Resolution::Nanoseconds => "ns",
            Resolution::Microseconds => "us",
            Resolution::Milliseconds => "ms",
            Resolution::Seconds => "s",
        }
    }

    pub fn convert(self, nanos: u64) -> f64 {
        nanos as f64 / self.nanos_per_unit() as f64
    }
}

/// What a recorded command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LaunchKind {
    Upload,
    CompareExchange { stage: u32, pass: u32 },
    Download,
}

impl std::fmt::Display for LaunchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchKind::Upload => write!(f, "write buffer"),
            LaunchKind::CompareExchange { stage, pass } => {
                write!(f, "bitonic stage {} pass {}", stage, pass)
            }
            LaunchKind::Download => write!(f, "read buffer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LaunchRecord {
    pub kind: LaunchKind,
    /// Kernel geometry; `None` for transfers.
    pub geometry: Option<LaunchParameters>,
    pub timestamps: EventTimestamps,
}

impl LaunchRecord {
    pub fn queued_ns(&self) -> u64 {
        self.timestamps.submit.saturating_sub(self.timestamps.queued)
    }

    pub fn submitted_ns(&self) -> u64 {
        self.timestamps.start.saturating_sub(self.timestamps.submit)
    }

    pub fn executed_ns(&self) -> u64 {
        self.timestamps.end.saturating_sub(self.timestamps.start)
    }

    pub fn total_ns(&self) -> u64 {
        self.timestamps.end.saturating_sub(self.timestamps.queued)
    }

    /// Queue/submit/execute breakdown at `resolution`.
    pub fn format(&self, resolution: Resolution) -> String {
        let unit = resolution.suffix();
        format!(
            "{}: Queued: {:.3}{unit}, Submitted: {:.3}{unit}, Executed: {:.3}{unit}, Total: {:.3}{unit}",
            self.kind,
            resolution.convert(self.queued_ns()),
            resolution.convert(self.submitted_ns()),
            resolution.convert(self.executed_ns()),
            resolution.convert(self.total_ns()),
        )
    }
}

/// Execution time of one bitonic stage, summed over its passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageProfile {
    pub stage: u32,
    pub launches: usize,
    pub executed_ns: u64,
}

/// Append-only log of launch records for one run.
#[derive(Debug, Default)]
pub struct ProfilingCollector {
    records: Vec<LaunchRecord>,
}

impl ProfilingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: LaunchRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[LaunchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Kernel launches only, excluding transfers.
    pub fn kernel_launches(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.kind, LaunchKind::CompareExchange { .. }))
            .count()
    }

    pub fn per_stage(&self) -> Vec<StageProfile> {
        let mut stages: BTreeMap<u32, StageProfile> = BTreeMap::new();
        for record in &self.records {
            if let LaunchKind::CompareExchange { stage, .. } = record.kind {
                let entry = stages.entry(stage).or_insert(StageProfile {
                    stage,
                    launches: 0,
                    executed_ns: 0,
                });
                entry.launches += 1;
                entry.executed_ns += record.executed_ns();
            }
        }
        stages.into_values().collect()
    }

    /// Sum of execution time over every recorded command.
    pub fn total_executed_ns(&self) -> u64 {
        self.records.iter().map(LaunchRecord::executed_ns).sum()
    }

    /// Wall-clock span from the earliest queued time to the latest end.
    ///
    /// Commands on an in-order queue overlap while they wait, so per-record
    /// queued-to-end times cannot be summed.
    pub fn span_ns(&self) -> u64 {
        let first = self.records.iter().map(|r| r.timestamps.queued).min();
        let last = self.records.iter().map(|r| r.timestamps.end).max();
        match (first, last) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => 0,
        }
    }

    pub fn summary(&self, resolution: Resolution) -> ProfilingSummary {
        ProfilingSummary {
            resolution,
            launches: self.records.clone(),
            stages: self.per_stage(),
            total_executed: resolution.convert(self.total_executed_ns()),
            span: resolution.convert(self.span_ns()),
        }
    }
}

/// Snapshot of the collector for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilingSummary {
    pub resolution: Resolution,
    pub launches: Vec<LaunchRecord>,
    pub stages: Vec<StageProfile>,
    pub total_executed: f64,
    /// Earliest queued to latest end.
    pub span: f64,
}

impl ProfilingSummary {
    /// One line per launch, one per stage, then the run totals.
    pub fn render(&self) -> String {
        let unit = self.resolution.suffix();
        let mut out = String::new();
        for record in &self.launches {
            let _ = writeln!(out, "  {}", record.format(self.resolution));
        }
        for stage in &self.stages {
            let _ = writeln!(
                out,
                "  stage {:>2}: {} launch{}, executed {:.3}{unit}",
                stage.stage,
                stage.launches,
                if stage.launches == 1 { "" } else { "es" },
                self.resolution.convert(stage.executed_ns),
            );
        }
        let _ = writeln!(
            out,
            "  total: executed {:.3}{unit}, wall span {:.3}{unit}",
            self.total_executed, self.span
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: LaunchKind, queued: u64, submit: u64, start: u64, end: u64) -> LaunchRecord {
        LaunchRecord {
            kind,
            geometry: None,
            timestamps: EventTimestamps {
                queued,
                submit,
                start,
                end,
            },
        }
    }

    #[test]
    fn test_resolution_conversion() {
        assert_eq!(Resolution::Nanoseconds.convert(1500), 1500.0);
        assert_eq!(Resolution::Microseconds.convert(1500), 1.5);
        assert_eq!(Resolution::Milliseconds.convert(2_000_000), 2.0);
        assert_eq!(Resolution::Seconds.convert(500_000_000), 0.5);
        assert_eq!(Resolution::default(), Resolution::Microseconds);
    }

    #[test]
    fn test_record_breakdown() {
        let r = record(LaunchKind::Upload, 100, 250, 400, 1400);
        assert_eq!(r.queued_ns(), 150);
        assert_eq!(r.submitted_ns(), 150);
        assert_eq!(r.executed_ns(), 1000);
        assert_eq!(r.total_ns(), 1300);

        let line = r.format(Resolution::Microseconds);
        assert!(line.starts_with("write buffer:"));
        assert!(line.contains("Executed: 1.000us"));
        assert!(line.contains("Total: 1.300us"));
    }

    #[test]
    fn test_per_stage_aggregation() {
        let mut c = ProfilingCollector::new();
        c.record(record(LaunchKind::Upload, 0, 0, 0, 50));
        c.record(record(LaunchKind::CompareExchange { stage: 1, pass: 1 }, 0, 0, 0, 10));
        c.record(record(LaunchKind::CompareExchange { stage: 2, pass: 2 }, 0, 0, 10, 30));
        c.record(record(LaunchKind::CompareExchange { stage: 2, pass: 1 }, 0, 0, 30, 35));

        assert_eq!(c.len(), 4);
        assert_eq!(c.kernel_launches(), 3);
        let stages = c.per_stage();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0], StageProfile { stage: 1, launches: 1, executed_ns: 10 });
        assert_eq!(stages[1], StageProfile { stage: 2, launches: 2, executed_ns: 25 });
        assert_eq!(c.total_executed_ns(), 85);
    }

    #[test]
    fn test_summary_render() {
        let mut c = ProfilingCollector::new();
        c.record(record(LaunchKind::CompareExchange { stage: 1, pass: 1 }, 0, 1_000, 2_000, 5_000));
        let text = c.summary(Resolution::Microseconds).render();
        assert!(text.contains("bitonic stage 1 pass 1"));
        assert!(text.contains("stage  1: 1 launch, executed 3.000us"));
        assert!(text.contains("total: executed 3.000us, wall span 5.000us"));
    }

    #[test]
    fn test_span_does_not_double_count_queue_wait() {
        let mut c = ProfilingCollector::new();
        c.record(record(LaunchKind::CompareExchange { stage: 1, pass: 1 }, 0, 0, 0, 10));
        c.record(record(LaunchKind::CompareExchange { stage: 2, pass: 2 }, 0, 0, 10, 20));
        c.record(record(LaunchKind::CompareExchange { stage: 2, pass: 1 }, 0, 0, 20, 30));

        assert_eq!(c.total_executed_ns(), 30);
        assert_eq!(c.span_ns(), 30);
        let summary = c.summary(Resolution::Nanoseconds);
        assert_eq!(summary.span, 30.0);
        assert!(summary.render().contains("wall span 30.000ns"));
    }

    #[test]
    fn test_span_of_empty_collector_is_zero() {
        assert_eq!(ProfilingCollector::new().span_ns(), 0);
    }

    #[test]
    fn test_saturating_on_missing_timestamps() {
        let r = record(LaunchKind::Download, 10, 0, 0, 0);
        assert_eq!(r.queued_ns(), 0);
        assert_eq!(r.total_ns(), 0);
    }
}
