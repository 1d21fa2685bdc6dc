//! Launch geometry for the compare-exchange kernel.

use serde::Serialize;

use crate::accel::DeviceCaps;
use crate::error::{SortError, SortResult};

/// Global/local work sizes shared by every launch of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchParameters {
    pub global_size: usize,
    pub local_size: usize,
}

impl LaunchParameters {
    pub fn work_groups(&self) -> usize {
        self.global_size / self.local_size
    }
}

/// Picks the work-group size for a padded length.
pub struct WorkGroupSizer;

impl WorkGroupSizer {
    /// Compute the launch geometry for `padded_len` work items.
    ///
    /// With `use_preferred` the kernel's preferred work-group multiple replaces
    /// `configured_local_size`; a preferred size larger than the whole
    /// dataset is capped at `padded_len`. Each work item pairs with
    /// `gid ^ distance`, so the local size must split `padded_len` evenly.
    pub fn size_for(
        caps: &DeviceCaps,
        padded_len: usize,
        configured_local_size: usize,
        use_preferred: bool,
    ) -> SortResult<LaunchParameters> {
        let local_size = if use_preferred {
            caps.preferred_work_group_multiple.min(padded_len)
        } else {
            configured_local_size
        };

        if local_size == 0 {
            return Err(SortError::Configuration(
                "local work-group size must be positive".to_string(),
            ));
        }
        if local_size > caps.max_work_group_size {
            return Err(SortError::Configuration(format!(
                "local work-group size {} exceeds the kernel maximum of {} on {}",
                local_size, caps.max_work_group_size, caps.name
            )));
        }
        if padded_len % local_size != 0 {
            return Err(SortError::Configuration(format!(
                "local work-group size {} does not evenly divide padded length {}",
                local_size, padded_len
            )));
        }

        Ok(LaunchParameters {
            global_size: padded_len,
            local_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(preferred: usize, max: usize) -> DeviceCaps {
        DeviceCaps {
            name: "test device".to_string(),
            vendor: "test".to_string(),
            max_work_group_size: max,
            preferred_work_group_multiple: preferred,
            global_mem_size: 1 << 30,
        }
    }

    #[test]
    fn test_configured_size_is_used() {
        let p = WorkGroupSizer::size_for(&caps(64, 1024), 1024, 32, false).unwrap();
        assert_eq!(p, LaunchParameters { global_size: 1024, local_size: 32 });
        assert_eq!(p.work_groups(), 32);
    }

    #[test]
    fn test_preferred_size_overrides_configured() {
        let p = WorkGroupSizer::size_for(&caps(64, 1024), 1024, 3, true).unwrap();
        assert_eq!(p.local_size, 64);
        assert_eq!(p.global_size, 1024);
    }

    #[test]
    fn test_preferred_size_capped_at_padded_len() {
        let p = WorkGroupSizer::size_for(&caps(32, 256), 8, 1, true).unwrap();
        assert_eq!(p.local_size, 8);
    }

    #[test]
    fn test_uneven_split_is_configuration_error() {
        let err = WorkGroupSizer::size_for(&caps(32, 256), 8, 3, false).unwrap_err();
        assert!(matches!(err, SortError::Configuration(_)));

        let err = WorkGroupSizer::size_for(&caps(32, 256), 8, 32, false).unwrap_err();
        assert!(matches!(err, SortError::Configuration(_)));
    }

    #[test]
    fn test_zero_and_oversized_local_size_rejected() {
        assert!(matches!(
            WorkGroupSizer::size_for(&caps(32, 256), 1024, 0, false),
            Err(SortError::Configuration(_))
        ));
        assert!(matches!(
            WorkGroupSizer::size_for(&caps(32, 256), 1024, 512, false),
            Err(SortError::Configuration(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let c = caps(16, 128);
        let a = WorkGroupSizer::size_for(&c, 4096, 128, false).unwrap();
        let b = WorkGroupSizer::size_for(&c, 4096, 128, false).unwrap();
        assert_eq!(a, b);
    }
}
