//! OpenCL context (`--features opencl`).
//!
//! One platform/device selected by index, one context, one in-order command
//! queue and the compare-exchange kernel compiled for the element type.

use std::marker::PhantomData;
use std::ptr;

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ALL};
use opencl3::error_codes::ClError;
use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_WRITE};
use opencl3::platform::get_platforms;
use opencl3::program::Program;
use opencl3::types::{cl_uint, CL_BLOCKING};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cl_errors::{CL_BUILD_PROGRAM_FAILURE, CL_INVALID_VALUE};
use super::{Accelerator, Backend, DeviceCaps, EventTimestamps};
use crate::error::DeviceError;
use crate::sort::geometry::LaunchParameters;
use crate::sort::SortKey;

const BITONIC_KERNEL_SOURCE: &str = include_str!("../../kernels/bitonic.cl");
const BITONIC_KERNEL_NAME: &str = "bitonic_compare_exchange";

fn cl_err(during: impl Into<String>) -> impl FnOnce(ClError) -> DeviceError {
    let during = during.into();
    move |e| DeviceError::new(during, e.0)
}

/// One row of `sensorsort devices`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing {
    pub platform_index: usize,
    pub platform: String,
    pub device_index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub max_work_group_size: usize,
    pub global_mem_size: u64,
}

/// Enumerate every device on every platform.
pub fn probe_devices() -> Result<Vec<DeviceListing>, DeviceError> {
    let platforms = get_platforms().map_err(cl_err("platform query"))?;
    let mut listings = Vec::new();

    for (platform_index, platform) in platforms.iter().enumerate() {
        let platform_name = platform.name().unwrap_or_default().trim().to_string();
        let ids = platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(cl_err(format!("device query on platform {}", platform_index)))?;
        for (device_index, id) in ids.into_iter().enumerate() {
            let device = Device::new(id);
            listings.push(DeviceListing {
                platform_index,
                platform: platform_name.clone(),
                device_index,
                name: device.name().unwrap_or_default().trim().to_string(),
                vendor: device.vendor().unwrap_or_default().trim().to_string(),
                version: device.version().unwrap_or_default().trim().to_string(),
                max_work_group_size: device.max_work_group_size().unwrap_or(0),
                global_mem_size: device.global_mem_size().unwrap_or(0),
            });
        }
    }

    Ok(listings)
}

/// Number of OpenCL devices visible on this host; zero when the ICD loader
/// reports none or fails.
pub fn device_count() -> usize {
    match probe_devices() {
        Ok(devices) => devices.len(),
        Err(e) => {
            debug!(error = %e, "OpenCL device probe failed");
            0
        }
    }
}

pub struct OpenClContext<T> {
    device: Device,
    context: Context,
    queue: CommandQueue,
    kernel: Kernel,
    caps: DeviceCaps,
    _element: PhantomData<T>,
}

impl<T: SortKey> OpenClContext<T> {
    /// Select device `device_index` on platform `platform_index` and compile
    /// the sort kernel for `T`.
    pub fn new(platform_index: usize, device_index: usize, profiling: bool) -> Result<Self, DeviceError> {
        let platforms = get_platforms().map_err(cl_err("platform query"))?;
        let platform = platforms.get(platform_index).ok_or_else(|| {
            DeviceError::new("platform selection", CL_INVALID_VALUE).with_detail(format!(
                "platform index {} out of range ({} platform{} found)",
                platform_index,
                platforms.len(),
                if platforms.len() == 1 { "" } else { "s" }
            ))
        })?;
        let ids = platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(cl_err("device query"))?;
        let id = *ids.get(device_index).ok_or_else(|| {
            DeviceError::new("device selection", CL_INVALID_VALUE).with_detail(format!(
                "device index {} out of range ({} device{} on platform {})",
                device_index,
                ids.len(),
                if ids.len() == 1 { "" } else { "s" },
                platform_index
            ))
        })?;

        let device = Device::new(id);
        let name = device.name().unwrap_or_default().trim().to_string();
        let vendor = device.vendor().unwrap_or_default().trim().to_string();
        let global_mem_size = device.global_mem_size().unwrap_or(0);

        let context = Context::from_device(&device).map_err(cl_err("context creation"))?;

        // OpenCL 1.2 entry point; create_default_with_properties needs 2.0.
        let queue_props = if profiling { CL_QUEUE_PROFILING_ENABLE } else { 0 };
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, queue_props)
            .map_err(cl_err("command queue creation"))?;

        let options = format!("-D T={}", T::CL_TYPE);
        let mut program = Program::create_from_source(&context, BITONIC_KERNEL_SOURCE)
            .map_err(cl_err("program creation"))?;
        if let Err(e) = program.build(context.devices(), &options) {
            let status = program.get_build_status(id).unwrap_or_default();
            let build_options = program.get_build_options(id).unwrap_or_default();
            let log = program.get_build_log(id).unwrap_or_default();
            warn!(code = e.0, status, %build_options, "kernel build failed");
            return Err(DeviceError::new("program build", CL_BUILD_PROGRAM_FAILURE).with_detail(
                format!(
                    "build status: {}\nbuild options: {}\nbuild log:\n{}",
                    status, build_options, log
                ),
            ));
        }

        let kernel =
            Kernel::create(&program, BITONIC_KERNEL_NAME).map_err(cl_err("kernel creation"))?;
        let max_work_group_size = kernel
            .get_work_group_size(id)
            .map_err(cl_err("kernel work-group size query"))?;
        let preferred_work_group_multiple = kernel
            .get_work_group_size_multiple(id)
            .map_err(cl_err("kernel work-group multiple query"))?;

        info!(
            device = %name,
            %vendor,
            platform_index,
            device_index,
            element_type = T::CL_TYPE,
            max_work_group_size,
            preferred_work_group_multiple,
            profiling,
            "OpenCL context ready"
        );

        Ok(Self {
            device,
            context,
            queue,
            kernel,
            caps: DeviceCaps {
                name,
                vendor,
                max_work_group_size,
                preferred_work_group_multiple,
                global_mem_size,
            },
            _element: PhantomData,
        })
    }
}

impl<T> std::fmt::Debug for OpenClContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClContext")
            .field("device", &self.caps.name)
            .field("device_id", &self.device.id())
            .finish_non_exhaustive()
    }
}

impl<T: SortKey> Accelerator<T> for OpenClContext<T> {
    type Buffer = Buffer<T>;
    type Event = Event;

    fn backend(&self) -> Backend {
        Backend::OpenCl
    }

    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn allocate(&self, len: usize) -> Result<Buffer<T>, DeviceError> {
        // SAFETY: no host pointer is passed, the runtime owns the storage.
        let buffer = unsafe {
            Buffer::<T>::create(&self.context, CL_MEM_READ_WRITE, len, ptr::null_mut())
                .map_err(cl_err("buffer allocation"))?
        };
        debug!(len, "allocated device buffer");
        Ok(buffer)
    }

    fn write(&self, buffer: &mut Buffer<T>, data: &[T]) -> Result<Event, DeviceError> {
        // SAFETY: blocking write; `data` outlives the call.
        unsafe {
            self.queue
                .enqueue_write_buffer(buffer, CL_BLOCKING, 0, data, &[])
                .map_err(cl_err("buffer write"))
        }
    }

    fn read(&self, buffer: &Buffer<T>, out: &mut [T]) -> Result<Event, DeviceError> {
        // SAFETY: blocking read; `out` outlives the call.
        unsafe {
            self.queue
                .enqueue_read_buffer(buffer, CL_BLOCKING, 0, out, &[])
                .map_err(cl_err("buffer read"))
        }
    }

    fn enqueue_compare_exchange(
        &self,
        buffer: &mut Buffer<T>,
        stage: u32,
        pass: u32,
        geometry: LaunchParameters,
    ) -> Result<Event, DeviceError> {
        let stage_arg: cl_uint = stage;
        let pass_arg: cl_uint = pass;
        // SAFETY: argument order and types match the kernel signature.
        unsafe {
            ExecuteKernel::new(&self.kernel)
                .set_arg(&*buffer)
                .set_arg(&stage_arg)
                .set_arg(&pass_arg)
                .set_global_work_size(geometry.global_size)
                .set_local_work_size(geometry.local_size)
                .enqueue_nd_range(&self.queue)
                .map_err(cl_err(format!(
                    "compare-exchange stage {} pass {}",
                    stage, pass
                )))
        }
    }

    fn finish(&self) -> Result<(), DeviceError> {
        self.queue.finish().map_err(cl_err("queue finish"))
    }

    fn timestamps(&self, event: &Event) -> Result<EventTimestamps, DeviceError> {
        Ok(EventTimestamps {
            queued: event
                .profiling_command_queued()
                .map_err(cl_err("profiling query"))?,
            submit: event
                .profiling_command_submit()
                .map_err(cl_err("profiling query"))?,
            start: event
                .profiling_command_start()
                .map_err(cl_err("profiling query"))?,
            end: event
                .profiling_command_end()
                .map_err(cl_err("profiling query"))?,
        })
    }

    fn release(&self, buffer: Buffer<T>) -> Result<(), DeviceError> {
        // clReleaseMemObject runs in Buffer's Drop.
        drop(buffer);
        Ok(())
    }
}
