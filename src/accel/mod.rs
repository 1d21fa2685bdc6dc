//! Accelerator contexts -- OpenCL device or scalar CPU emulation.
//!
//! Every context exposes the same compare-exchange kernel behind the
//! [`Accelerator`] trait. Commands are issued on a single in-order queue, so
//! enqueue order is completion order.

pub mod buffer;
pub mod cl_errors;
pub mod cpu;
#[cfg(feature = "opencl")]
pub mod opencl;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DeviceError;
use crate::sort::geometry::LaunchParameters;
use crate::sort::SortKey;

/// Which context executes the sort.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// OpenCL if compiled in and a device is present, otherwise CPU.
    #[default]
    Auto,
    /// OpenCL device (requires the `opencl` feature)
    #[serde(rename = "opencl")]
    #[value(name = "opencl")]
    OpenCl,
    /// Scalar CPU emulation of the kernel
    Cpu,
}

impl Backend {
    /// Resolve `Auto` against what this build and host can offer.
    pub fn resolve(self) -> Backend {
        match self {
            Backend::Auto => {
                let resolved = if opencl_device_count() > 0 {
                    Backend::OpenCl
                } else {
                    Backend::Cpu
                };
                info!(?resolved, "auto-selected accelerator backend");
                resolved
            }
            other => other,
        }
    }
}

#[cfg(feature = "opencl")]
fn opencl_device_count() -> usize {
    opencl::device_count()
}

#[cfg(not(feature = "opencl"))]
fn opencl_device_count() -> usize {
    0
}

/// Device properties relevant to launch geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCaps {
    pub name: String,
    pub vendor: String,
    /// Largest work group the sort kernel may be launched with.
    pub max_work_group_size: usize,
    /// `CL_KERNEL_PREFERRED_WORK_GROUP_SIZE_MULTIPLE` for the sort kernel.
    pub preferred_work_group_multiple: usize,
    pub global_mem_size: u64,
}

/// Device clock readings for one command, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EventTimestamps {
    pub queued: u64,
    pub submit: u64,
    pub start: u64,
    pub end: u64,
}

/// An execution context holding a selected device and the compiled
/// compare-exchange kernel for element type `T`.
pub trait Accelerator<T: SortKey> {
    /// Device-resident storage for `T` values.
    type Buffer;
    /// Completion handle for one enqueued command.
    type Event;

    fn backend(&self) -> Backend;

    fn caps(&self) -> &DeviceCaps;

    fn allocate(&self, len: usize) -> Result<Self::Buffer, DeviceError>;

    /// Blocking host-to-device copy of `data` into `buffer`.
    fn write(&self, buffer: &mut Self::Buffer, data: &[T]) -> Result<Self::Event, DeviceError>;

    /// Blocking device-to-host copy of `buffer` into `out`.
    fn read(&self, buffer: &Self::Buffer, out: &mut [T]) -> Result<Self::Event, DeviceError>;

    /// Enqueue one `(stage, pass)` round of the bitonic network.
    fn enqueue_compare_exchange(
        &self,
        buffer: &mut Self::Buffer,
        stage: u32,
        pass: u32,
        geometry: LaunchParameters,
    ) -> Result<Self::Event, DeviceError>;

    /// Block until every enqueued command has completed.
    fn finish(&self) -> Result<(), DeviceError>;

    /// Timestamps of a completed command.
    fn timestamps(&self, event: &Self::Event) -> Result<EventTimestamps, DeviceError>;

    fn release(&self, buffer: Self::Buffer) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        let parsed: Backend = serde_json::from_str("\"opencl\"").unwrap();
        assert_eq!(parsed, Backend::OpenCl);
        let parsed: Backend = serde_json::from_str("\"cpu\"").unwrap();
        assert_eq!(parsed, Backend::Cpu);
        assert_eq!(Backend::default(), Backend::Auto);
    }

    #[cfg(not(feature = "opencl"))]
    #[test]
    fn test_auto_resolves_to_cpu_without_opencl() {
        assert_eq!(Backend::Auto.resolve(), Backend::Cpu);
        assert_eq!(Backend::OpenCl.resolve(), Backend::OpenCl);
    }
}
