//! SensorSort -- accelerator-backed bitonic sorting of sensor measurements.
//!
//! This crate loads a sequence of numeric readings, pads it to a power of two,
//! sorts it in place on an accelerator with a bitonic sorting network, and
//! reports summary statistics before and after the sort.

pub mod accel;
pub mod config;
pub mod error;
pub mod input;
pub mod report;
pub mod sort;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use accel::buffer::DeviceBuffer;
use accel::Accelerator;
use config::SortConfig;
use error::{SortError, SortResult};
use report::RunReport;
use sort::geometry::WorkGroupSizer;
use sort::network::SortEngine;
use sort::profile::{LaunchKind, LaunchRecord, ProfilingCollector};
use sort::{pad, stats, NumericSequence, SortKey};

/// Sort `input` on `ctx` and reduce it to summary statistics.
///
/// Input and geometry are validated before the first device call. The device
/// buffer is released on every exit path.
pub fn run<T, A>(ctx: &A, input: &NumericSequence<T>, options: &SortConfig) -> SortResult<RunReport<T>>
where
    T: SortKey,
    A: Accelerator<T>,
{
    options.validate()?;
    if let Some(index) = input.as_slice().iter().position(|&v| !v.is_orderable()) {
        return Err(SortError::InvalidInput(format!(
            "value {} at index {} cannot be ordered",
            input.as_slice()[index],
            index
        )));
    }
    let padded = pad::pad(input)?;
    let baseline = stats::baseline(input)?;
    let geometry = WorkGroupSizer::size_for(
        ctx.caps(),
        padded.len(),
        options.local_size,
        options.use_preferred,
    )?;
    info!(
        input_len = padded.original_len(),
        padded_len = padded.len(),
        sentinels = padded.sentinel_count(),
        local_size = geometry.local_size,
        "starting bitonic sort"
    );

    let mut collector = ProfilingCollector::new();

    let (mut buffer, upload) = DeviceBuffer::upload(ctx, &padded)?;
    if options.profiling {
        collector.record(LaunchRecord {
            kind: LaunchKind::Upload,
            geometry: None,
            timestamps: ctx.timestamps(&upload)?,
        });
    }

    let launches = SortEngine::new(ctx, geometry)
        .verbose(options.verbose_kernel)
        .profiling(options.profiling)
        .sort(&mut buffer, &mut collector)?;

    let (sorted, download) = buffer.download()?;
    if options.profiling {
        collector.record(LaunchRecord {
            kind: LaunchKind::Download,
            geometry: None,
            timestamps: ctx.timestamps(&download)?,
        });
    }
    buffer.release()?;

    let result = stats::reduce(&sorted, padded.original_len())?;
    let verified = result == baseline;
    if !verified {
        warn!(
            device = %ctx.caps().name,
            "device result differs from host baseline"
        );
    }

    Ok(RunReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        backend: ctx.backend(),
        device: ctx.caps().name.clone(),
        element_type: T::CL_TYPE,
        input_len: padded.original_len(),
        padded_len: padded.len(),
        geometry,
        launches,
        baseline,
        result,
        verified,
        profiling: options
            .profiling
            .then(|| collector.summary(options.resolution)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel::cpu::CpuContext;

    #[test]
    fn test_run_fixture() {
        let ctx = CpuContext::new();
        let config = SortConfig {
            local_size: 4,
            ..SortConfig::default()
        };
        let report = run(&ctx, &NumericSequence::new(vec![5, 3, 8, 1, 9, 2]), &config).unwrap();

        assert_eq!(report.padded_len, 8);
        assert_eq!(report.launches, 6);
        assert_eq!(report.result.min, 1);
        assert_eq!(report.result.max, 9);
        assert!((report.result.mean - 4.6667).abs() < 1e-4);
        assert_eq!(report.result.median, 4.0);
        assert!(report.verified);
        assert!(report.profiling.is_none());
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn test_run_with_profiling_records_transfers() {
        let ctx = CpuContext::new();
        let config = SortConfig {
            local_size: 2,
            profiling: true,
            ..SortConfig::default()
        };
        let report = run(&ctx, &NumericSequence::new(vec![2.5f32, -1.0, 7.0]), &config).unwrap();

        let profile = report.profiling.unwrap();
        assert_eq!(profile.launches.len(), 3 + 2);
        assert_eq!(profile.launches[0].kind, LaunchKind::Upload);
        assert_eq!(profile.launches[4].kind, LaunchKind::Download);
        assert_eq!(profile.stages.len(), 2);
    }

    #[test]
    fn test_bad_geometry_never_touches_device() {
        let ctx = CpuContext::new();
        let config = SortConfig {
            local_size: 3,
            ..SortConfig::default()
        };
        let err = run(&ctx, &NumericSequence::new(vec![1, 2, 3, 4, 5]), &config).unwrap_err();
        assert!(matches!(err, SortError::Configuration(_)));
        assert_eq!(ctx.allocations(), 0);
    }
}
