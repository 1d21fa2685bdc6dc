//! Run report: what was sorted, where, and what came out.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::accel::Backend;
use crate::sort::geometry::LaunchParameters;
use crate::sort::profile::ProfilingSummary;
use crate::sort::stats::Statistics;
use crate::sort::SortKey;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport<T> {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub backend: Backend,
    pub device: String,
    /// OpenCL scalar name of the element type.
    pub element_type: &'static str,
    pub input_len: usize,
    pub padded_len: usize,
    pub geometry: LaunchParameters,
    pub launches: usize,
    pub baseline: Statistics<T>,
    pub result: Statistics<T>,
    /// Device statistics agree with the host baseline.
    pub verified: bool,
    pub profiling: Option<ProfilingSummary>,
}

impl<T: SortKey> RunReport<T> {
    /// Format the report as a human-readable block.
    pub fn format_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {} ({})", self.run_id, self.generated_at.to_rfc3339());
        let _ = writeln!(out, "Device: {} [{:?}]", self.device, self.backend);
        let _ = writeln!(
            out,
            "Size: {} {} value{} (padded to {}, {} sentinel{})",
            self.input_len,
            self.element_type,
            if self.input_len == 1 { "" } else { "s" },
            self.padded_len,
            self.padded_len - self.input_len,
            if self.padded_len - self.input_len == 1 { "" } else { "s" },
        );
        let _ = writeln!(
            out,
            "Launches: {} (global {}, local {}, {} work group{})",
            self.launches,
            self.geometry.global_size,
            self.geometry.local_size,
            self.geometry.work_groups(),
            if self.geometry.work_groups() == 1 { "" } else { "s" },
        );
        let _ = writeln!(out, "Baseline: {}", format_stats(&self.baseline));
        let _ = writeln!(out, "Sorted:   {}", format_stats(&self.result));
        let _ = writeln!(
            out,
            "Verified: {}",
            if self.verified { "yes" } else { "NO (device result differs from host baseline)" }
        );
        if let Some(profile) = &self.profiling {
            let _ = writeln!(out, "Profiling ({}):", profile.resolution.suffix());
            out.push_str(&profile.render());
        }
        out
    }
}

/// `Min / Max / Mean / Median` on one line.
pub fn format_stats<T: SortKey>(stats: &Statistics<T>) -> String {
    format!(
        "Min: {}, Max: {}, Mean: {:.4}, Median: {:.4}",
        stats.min, stats.max, stats.mean, stats.median
    )
}
