//! End-to-end pipeline on the scalar CPU context.

use std::path::Path;

use sensorsort::accel::buffer::DeviceBuffer;
use sensorsort::accel::cl_errors::{CL_INVALID_WORK_GROUP_SIZE, CL_OUT_OF_RESOURCES};
use sensorsort::accel::cpu::CpuContext;
use sensorsort::config::SortConfig;
use sensorsort::error::SortError;
use sensorsort::input::{self, Field};
use sensorsort::sort::geometry::LaunchParameters;
use sensorsort::sort::network::SortEngine;
use sensorsort::sort::pad::pad;
use sensorsort::sort::profile::ProfilingCollector;
use sensorsort::sort::NumericSequence;

fn config(local_size: usize) -> SortConfig {
    SortConfig {
        local_size,
        verbose_kernel: false,
        ..SortConfig::default()
    }
}

#[test]
fn test_thousand_values_local_32() {
    let ctx = CpuContext::new();
    let data: NumericSequence<i32> = input::synthetic(1000, 1, -500.0, 500.0);

    let report = sensorsort::run(&ctx, &data, &config(32)).unwrap();

    assert_eq!(report.input_len, 1000);
    assert_eq!(report.padded_len, 1024);
    assert_eq!(report.launches, 55);
    assert_eq!(report.geometry.local_size, 32);
    assert_eq!(report.geometry.work_groups(), 32);
    assert!(report.verified);
    assert_eq!(ctx.launches(), 55);
    assert_eq!(ctx.live_buffers(), 0);

    let reference = data.sorted();
    assert_eq!(report.result.min, reference[0]);
    assert_eq!(report.result.max, reference[999]);
}

#[test]
fn test_sorted_prefix_matches_reference() {
    let ctx = CpuContext::new();
    let data: NumericSequence<f32> = input::synthetic(777, 9, -40.0, 45.0);
    let padded = pad(&data).unwrap();
    let geometry = LaunchParameters {
        global_size: padded.len(),
        local_size: 16,
    };

    let mut collector = ProfilingCollector::new();
    let (mut buffer, _) = DeviceBuffer::upload(&ctx, &padded).unwrap();
    SortEngine::new(&ctx, geometry)
        .sort(&mut buffer, &mut collector)
        .unwrap();
    let (sorted, _) = buffer.download().unwrap();
    buffer.release().unwrap();

    assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(&sorted[..777], data.sorted().as_slice());
    assert!(sorted[777..].iter().all(|v| *v == f32::INFINITY));
}

#[test]
fn test_fixture_statistics() {
    let ctx = CpuContext::new();
    let data = NumericSequence::new(vec![5, 3, 8, 1, 9, 2]);

    let report = sensorsort::run(&ctx, &data, &config(8)).unwrap();

    assert_eq!(report.padded_len, 8);
    assert_eq!(report.baseline, report.result);
    assert_eq!(report.result.min, 1);
    assert_eq!(report.result.max, 9);
    assert!((report.result.mean - 4.6667).abs() < 1e-4);
    assert_eq!(report.result.median, 4.0);
}

#[test]
fn test_single_value_runs_no_launches() {
    let ctx = CpuContext::new();
    let report = sensorsort::run(&ctx, &NumericSequence::new(vec![7u32]), &config(1)).unwrap();
    assert_eq!(report.padded_len, 1);
    assert_eq!(report.launches, 0);
    assert_eq!(report.result.median, 7.0);
    assert_eq!(ctx.live_buffers(), 0);
}

#[test]
fn test_preferred_size_capped_for_small_inputs() {
    let ctx = CpuContext::with_limits(256, 64);
    let options = SortConfig {
        use_preferred: true,
        ..config(0)
    };
    let report = sensorsort::run(&ctx, &NumericSequence::new(vec![3, 1, 2]), &options).unwrap();
    assert_eq!(report.geometry.local_size, 4);
    assert!(report.verified);
}

#[test]
fn test_launch_fault_aborts_and_releases_buffer() {
    let ctx = CpuContext::new().with_injected_fault(10, CL_OUT_OF_RESOURCES);
    let data: NumericSequence<i32> = input::synthetic(100, 3, 0.0, 1000.0);

    let err = sensorsort::run(&ctx, &data, &config(32)).unwrap_err();

    match err {
        SortError::Device(e) => {
            assert_eq!(e.code, CL_OUT_OF_RESOURCES);
            assert_eq!(e.name(), "CL_OUT_OF_RESOURCES");
        }
        other => panic!("expected device error, got {:?}", other),
    }
    assert_eq!(ctx.launches(), 10);
    assert_eq!(ctx.allocations(), 1);
    assert_eq!(ctx.live_buffers(), 0);
}

#[test]
fn test_geometry_rejected_before_device() {
    let ctx = CpuContext::new();
    let err = sensorsort::run(&ctx, &NumericSequence::new(vec![1, 2, 3, 4, 5, 6]), &config(3))
        .unwrap_err();
    assert!(matches!(err, SortError::Configuration(_)));
    assert_eq!(ctx.allocations(), 0);
}

#[test]
fn test_local_size_above_device_limit_rejected() {
    let ctx = CpuContext::with_limits(64, 32);
    let data: NumericSequence<i32> = input::synthetic(512, 5, 0.0, 10.0);
    let err = sensorsort::run(&ctx, &data, &config(128)).unwrap_err();
    assert!(matches!(err, SortError::Configuration(_)));
    assert_eq!(ctx.allocations(), 0);
}

#[test]
fn test_runtime_rejects_geometry_the_sizer_never_produces() {
    let ctx = CpuContext::with_limits(64, 32);
    let padded = pad(&NumericSequence::new(vec![4, 3, 2, 1])).unwrap();
    let geometry = LaunchParameters {
        global_size: 4,
        local_size: 128,
    };

    let mut collector = ProfilingCollector::new();
    let (mut buffer, _) = DeviceBuffer::upload(&ctx, &padded).unwrap();
    let err = SortEngine::new(&ctx, geometry)
        .sort(&mut buffer, &mut collector)
        .unwrap_err();
    buffer.release().unwrap();

    match err {
        SortError::Device(e) => assert_eq!(e.code, CL_INVALID_WORK_GROUP_SIZE),
        other => panic!("expected device error, got {:?}", other),
    }
}

#[test]
fn test_empty_input_is_invalid() {
    let ctx = CpuContext::new();
    let err = sensorsort::run(&ctx, &NumericSequence::<f32>::new(Vec::new()), &config(32))
        .unwrap_err();
    assert!(matches!(err, SortError::InvalidInput(_)));
    assert_eq!(ctx.allocations(), 0);
}

#[test]
fn test_nan_input_rejected_before_device() {
    let ctx = CpuContext::new();
    let data = NumericSequence::new(vec![3.0f32, f32::NAN, 1.0, 2.0, 0.5]);

    let err = sensorsort::run(&ctx, &data, &config(4)).unwrap_err();

    match err {
        SortError::InvalidInput(msg) => assert!(msg.contains("index 1"), "{}", msg),
        other => panic!("expected invalid input, got {:?}", other),
    }
    assert_eq!(ctx.allocations(), 0);
}

#[test]
fn test_sample_data_file() {
    let data: NumericSequence<f32> =
        input::load_file(Path::new("data/sample_temperatures.txt"), Field::Last).unwrap();
    assert_eq!(data.len(), 216);

    let ctx = CpuContext::new();
    let options = SortConfig {
        profiling: true,
        ..config(32)
    };
    let report = sensorsort::run(&ctx, &data, &options).unwrap();

    assert_eq!(report.padded_len, 256);
    assert_eq!(report.launches, 36);
    assert!(report.verified);
    let profile = report.profiling.unwrap();
    assert_eq!(profile.stages.len(), 8);
    assert_eq!(profile.launches.len(), 36 + 2);
}
