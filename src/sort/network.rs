//! Bitonic sorting network.
//!
//! A network over `2^k` elements runs `k` stages; stage `s` runs passes
//! `s, s-1, ..., 1`, and pass `p` compares elements `2^(p-1)` apart. Each
//! `(stage, pass)` round is one kernel launch. No barrier spans the whole
//! buffer inside a launch, so a round must complete before the next one
//! starts; the in-order command queue provides that ordering.

use serde::Serialize;
use tracing::{debug, info};

use super::geometry::LaunchParameters;
use super::profile::{LaunchKind, LaunchRecord, ProfilingCollector};
use super::SortKey;
use crate::accel::buffer::DeviceBuffer;
use crate::accel::Accelerator;
use crate::error::SortResult;

/// One round of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortStep {
    pub stage: u32,
    pub pass: u32,
}

impl SortStep {
    /// Index distance between compared elements.
    pub fn distance(&self) -> usize {
        1 << (self.pass - 1)
    }

    /// Size of the blocks whose sort direction alternates in this stage.
    pub fn block_size(&self) -> usize {
        1 << self.stage
    }
}

/// Iterator over the `(stage, pass)` rounds for a padded length.
#[derive(Debug, Clone)]
pub struct BitonicSchedule {
    stages: u32,
    next: Option<SortStep>,
}

impl BitonicSchedule {
    pub fn new(padded_len: usize) -> Self {
        debug_assert!(padded_len.is_power_of_two());
        let stages = padded_len.trailing_zeros();
        let next = (stages > 0).then_some(SortStep { stage: 1, pass: 1 });
        Self { stages, next }
    }
}

impl Iterator for BitonicSchedule {
    type Item = SortStep;

    fn next(&mut self) -> Option<SortStep> {
        let current = self.next?;
        self.next = if current.pass > 1 {
            Some(SortStep {
                stage: current.stage,
                pass: current.pass - 1,
            })
        } else if current.stage < self.stages {
            Some(SortStep {
                stage: current.stage + 1,
                pass: current.stage + 1,
            })
        } else {
            None
        };
        Some(current)
    }
}

/// Number of launches a full sort of `padded_len` elements takes.
pub fn launch_count(padded_len: usize) -> usize {
    let k = padded_len.trailing_zeros() as usize;
    k * (k + 1) / 2
}

/// Work of a single work item `gid` in round `step`.
///
/// Only the lower index of a pair acts. Blocks of `block_size` elements
/// alternate between ascending and descending order.
pub fn compare_exchange<T: PartialOrd + Copy>(data: &mut [T], gid: usize, step: SortStep) {
    let partner = gid ^ step.distance();
    if partner <= gid {
        return;
    }
    let ascending = gid & step.block_size() == 0;
    let (a, b) = (data[gid], data[partner]);
    let out_of_order = if ascending { a > b } else { a < b };
    if out_of_order {
        data[gid] = b;
        data[partner] = a;
    }
}

/// Launch sequencing for one run.
pub struct SortEngine<'a, A> {
    ctx: &'a A,
    geometry: LaunchParameters,
    verbose: bool,
    profiling: bool,
}

impl<'a, A> SortEngine<'a, A> {
    pub fn new(ctx: &'a A, geometry: LaunchParameters) -> Self {
        Self {
            ctx,
            geometry,
            verbose: false,
            profiling: false,
        }
    }

    /// Report work-group sizing before every stage.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Record one `LaunchRecord` per launch into the collector.
    pub fn profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    /// Sort `buffer` in place. Returns the number of launches issued.
    ///
    /// A failed launch aborts the sort; the buffer's contents are then
    /// undefined and the caller must discard the run.
    pub fn sort<T>(
        &self,
        buffer: &mut DeviceBuffer<'_, T, A>,
        collector: &mut ProfilingCollector,
    ) -> SortResult<usize>
    where
        T: SortKey,
        A: Accelerator<T>,
    {
        let padded_len = buffer.len();
        let mut pending = Vec::with_capacity(launch_count(padded_len));

        for step in BitonicSchedule::new(padded_len) {
            if self.verbose && step.pass == step.stage {
                let caps = self.ctx.caps();
                info!(
                    stage = step.stage,
                    preferred_work_group_size = caps.preferred_work_group_multiple,
                    max_work_group_size = caps.max_work_group_size,
                    global_size = self.geometry.global_size,
                    local_size = self.geometry.local_size,
                    "kernel launch options"
                );
            }

            let event = self.ctx.enqueue_compare_exchange(
                buffer.raw_mut(),
                step.stage,
                step.pass,
                self.geometry,
            )?;
            if self.profiling {
                pending.push((step, event));
            }
        }
        self.ctx.finish()?;

        let launches = launch_count(padded_len);
        for (step, event) in pending {
            let timestamps = self.ctx.timestamps(&event)?;
            collector.record(LaunchRecord {
                kind: LaunchKind::CompareExchange {
                    stage: step.stage,
                    pass: step.pass,
                },
                geometry: Some(self.geometry),
                timestamps,
            });
        }

        debug!(padded_len, launches, "bitonic network complete");
        Ok(launches)
    }
}
