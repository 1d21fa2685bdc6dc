//! Error taxonomy for a sort run.

use std::fmt;

use thiserror::Error;

use crate::accel::cl_errors;

/// Result alias used across the library.
pub type SortResult<T> = Result<T, SortError>;

#[derive(Debug, Error)]
pub enum SortError {
    /// The dataset cannot be sorted (empty, unparseable, unordered values).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Launch geometry or configuration rejected before touching the device.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failed accelerator call, identified by its OpenCL status code.
#[derive(Debug)]
pub struct DeviceError {
    pub during: String,
    pub code: i32,
    /// Extra diagnostics, e.g. the program build log.
    pub detail: Option<String>,
}

impl DeviceError {
    pub fn new(during: impl Into<String>, code: i32) -> Self {
        Self {
            during: during.into(),
            code,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Symbolic name of the status code, e.g. `CL_OUT_OF_RESOURCES`.
    pub fn name(&self) -> &'static str {
        cl_errors::error_name(self.code)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed with {} ({})", self.during, self.name(), self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n{}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for DeviceError {}

/// A device buffer handle went out of scope without an explicit release.
/// The memory is still freed on drop; this is only ever logged.
#[derive(Debug, Error)]
#[error("device buffer of {len} elements was not released explicitly; freed on drop")]
pub struct ResourceWarning {
    pub len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_message_uses_symbolic_name() {
        let err = DeviceError::new("enqueue stage 3 pass 1", -5);
        let msg = err.to_string();
        assert!(msg.contains("CL_OUT_OF_RESOURCES"));
        assert!(msg.contains("stage 3 pass 1"));
        assert!(msg.contains("(-5)"));
    }

    #[test]
    fn test_device_error_detail_is_appended() {
        let err = DeviceError::new("program build", -11).with_detail("Build Log: oops");
        let msg = SortError::from(err).to_string();
        assert!(msg.contains("CL_BUILD_PROGRAM_FAILURE"));
        assert!(msg.ends_with("Build Log: oops"));
    }
}
