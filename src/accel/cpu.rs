//! Scalar CPU context.
//!
//! Executes the compare-exchange kernel one work item at a time, enforcing
//! the same geometry rules an OpenCL runtime applies at enqueue time. Used as
//! the reference context and wherever no OpenCL device is available.

use std::cell::Cell;
use std::time::Instant;

use tracing::{debug, trace};

use super::cl_errors::{
    CL_INVALID_ARG_VALUE, CL_INVALID_GLOBAL_WORK_SIZE, CL_INVALID_MEM_OBJECT, CL_INVALID_VALUE,
    CL_INVALID_WORK_GROUP_SIZE, CL_MEM_OBJECT_ALLOCATION_FAILURE,
};
use super::{Accelerator, Backend, DeviceCaps, EventTimestamps};
use crate::error::DeviceError;
use crate::sort::geometry::LaunchParameters;
use crate::sort::network::{compare_exchange, SortStep};
use crate::sort::SortKey;

/// Largest single allocation the scalar context accepts, in elements.
const MAX_ELEMENTS: usize = 1 << 30;

pub struct CpuBuffer<T> {
    data: Vec<T>,
}

/// Host memory "device" with a monotonic clock for event timestamps.
pub struct CpuContext {
    caps: DeviceCaps,
    epoch: Instant,
    fault: Option<(usize, i32)>,
    launches: Cell<usize>,
    allocations: Cell<usize>,
    live_buffers: Cell<usize>,
}

impl CpuContext {
    pub fn new() -> Self {
        Self::with_limits(1024, 32)
    }

    /// Context reporting the given kernel work-group limits.
    pub fn with_limits(max_work_group_size: usize, preferred_work_group_multiple: usize) -> Self {
        Self {
            caps: DeviceCaps {
                name: "Scalar CPU reference".to_string(),
                vendor: "host".to_string(),
                max_work_group_size,
                preferred_work_group_multiple,
                global_mem_size: (MAX_ELEMENTS * std::mem::size_of::<u32>()) as u64,
            },
            epoch: Instant::now(),
            fault: None,
            launches: Cell::new(0),
            allocations: Cell::new(0),
            live_buffers: Cell::new(0),
        }
    }

    /// Make the kernel launch at zero-based `launch_index` fail with `code`.
    /// Exercises the abort path of a run without real hardware.
    pub fn with_injected_fault(mut self, launch_index: usize, code: i32) -> Self {
        self.fault = Some((launch_index, code));
        self
    }

    /// Kernel launches accepted so far.
    pub fn launches(&self) -> usize {
        self.launches.get()
    }

    /// Buffers allocated over the context's lifetime.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Buffers allocated and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.get()
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn check_geometry(&self, len: usize, geometry: LaunchParameters) -> Result<(), i32> {
        if geometry.global_size != len {
            return Err(CL_INVALID_GLOBAL_WORK_SIZE);
        }
        if geometry.local_size == 0
            || geometry.local_size > self.caps.max_work_group_size
            || geometry.global_size % geometry.local_size != 0
        {
            return Err(CL_INVALID_WORK_GROUP_SIZE);
        }
        Ok(())
    }
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SortKey> Accelerator<T> for CpuContext {
    type Buffer = CpuBuffer<T>;
    type Event = EventTimestamps;

    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn allocate(&self, len: usize) -> Result<CpuBuffer<T>, DeviceError> {
        if len == 0 {
            return Err(DeviceError::new("buffer allocation", CL_INVALID_VALUE));
        }
        if len > MAX_ELEMENTS {
            return Err(DeviceError::new(
                "buffer allocation",
                CL_MEM_OBJECT_ALLOCATION_FAILURE,
            ));
        }
        self.allocations.set(self.allocations.get() + 1);
        self.live_buffers.set(self.live_buffers.get() + 1);
        debug!(len, "allocated host buffer");
        Ok(CpuBuffer {
            data: vec![T::SENTINEL; len],
        })
    }

    fn write(&self, buffer: &mut CpuBuffer<T>, data: &[T]) -> Result<EventTimestamps, DeviceError> {
        let queued = self.now_ns();
        if data.len() != buffer.data.len() {
            return Err(DeviceError::new("buffer write", CL_INVALID_VALUE));
        }
        let start = self.now_ns();
        buffer.data.copy_from_slice(data);
        Ok(EventTimestamps {
            queued,
            submit: queued,
            start,
            end: self.now_ns(),
        })
    }

    fn read(&self, buffer: &CpuBuffer<T>, out: &mut [T]) -> Result<EventTimestamps, DeviceError> {
        let queued = self.now_ns();
        if out.len() != buffer.data.len() {
            return Err(DeviceError::new("buffer read", CL_INVALID_VALUE));
        }
        let start = self.now_ns();
        out.copy_from_slice(&buffer.data);
        Ok(EventTimestamps {
            queued,
            submit: queued,
            start,
            end: self.now_ns(),
        })
    }

    fn enqueue_compare_exchange(
        &self,
        buffer: &mut CpuBuffer<T>,
        stage: u32,
        pass: u32,
        geometry: LaunchParameters,
    ) -> Result<EventTimestamps, DeviceError> {
        let queued = self.now_ns();
        let during = || format!("compare-exchange stage {} pass {}", stage, pass);

        let index = self.launches.get();
        if let Some((at, code)) = self.fault {
            if at == index {
                return Err(DeviceError::new(during(), code));
            }
        }
        self.check_geometry(buffer.data.len(), geometry)
            .map_err(|code| DeviceError::new(during(), code))?;
        if pass == 0 || pass > stage || (1usize << stage) > buffer.data.len() {
            return Err(DeviceError::new(during(), CL_INVALID_ARG_VALUE));
        }
        self.launches.set(index + 1);

        let step = SortStep { stage, pass };
        let start = self.now_ns();
        for group in 0..geometry.work_groups() {
            let base = group * geometry.local_size;
            for lid in 0..geometry.local_size {
                compare_exchange(&mut buffer.data, base + lid, step);
            }
        }
        let end = self.now_ns();
        trace!(stage, pass, elapsed_ns = end - start, "scalar launch complete");

        Ok(EventTimestamps {
            queued,
            submit: queued,
            start,
            end,
        })
    }

    fn finish(&self) -> Result<(), DeviceError> {
        // Every command completes before its enqueue call returns.
        Ok(())
    }

    fn timestamps(&self, event: &EventTimestamps) -> Result<EventTimestamps, DeviceError> {
        Ok(*event)
    }

    fn release(&self, buffer: CpuBuffer<T>) -> Result<(), DeviceError> {
        let live = self.live_buffers.get();
        if live == 0 {
            return Err(DeviceError::new("buffer release", CL_INVALID_MEM_OBJECT));
        }
        self.live_buffers.set(live - 1);
        drop(buffer);
        Ok(())
    }
}
