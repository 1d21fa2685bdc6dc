//! Device buffer lifecycle: allocate + upload, download, release.
//!
//! A [`DeviceBuffer`] owns its device allocation for the duration of a run.
//! `release` frees it explicitly; a handle dropped without one (early return,
//! `?` on an error) is still freed, and a [`ResourceWarning`] is logged.

use std::marker::PhantomData;

use tracing::{debug, error, warn};

use super::Accelerator;
use crate::error::{ResourceWarning, SortResult};
use crate::sort::pad::PaddedSequence;
use crate::sort::SortKey;

pub struct DeviceBuffer<'a, T, A>
where
    T: SortKey,
    A: Accelerator<T>,
{
    ctx: &'a A,
    inner: Option<A::Buffer>,
    len: usize,
    _element: PhantomData<T>,
}

impl<'a, T, A> DeviceBuffer<'a, T, A>
where
    T: SortKey,
    A: Accelerator<T>,
{
    /// Allocate `sequence.len()` elements on the device and copy the padded
    /// sequence into them. Blocks until the copy completes.
    pub fn upload(ctx: &'a A, sequence: &PaddedSequence<T>) -> SortResult<(Self, A::Event)> {
        let len = sequence.len();
        let raw = ctx.allocate(len)?;
        let mut buffer = Self {
            ctx,
            inner: Some(raw),
            len,
            _element: PhantomData,
        };
        // On a failed write `buffer` drops here and frees the allocation.
        let event = ctx.write(buffer.raw_mut(), sequence.as_slice())?;
        debug!(len, "uploaded padded sequence");
        Ok((buffer, event))
    }

    /// Copy the whole buffer back to the host. Blocks until done.
    pub fn download(&self) -> SortResult<(Vec<T>, A::Event)> {
        let mut out = vec![T::SENTINEL; self.len];
        let event = self.ctx.read(self.raw(), &mut out)?;
        debug!(len = self.len, "downloaded device buffer");
        Ok((out, event))
    }

    /// Free the device allocation.
    pub fn release(mut self) -> SortResult<()> {
        if let Some(raw) = self.inner.take() {
            self.ctx.release(raw)?;
            debug!(len = self.len, "released device buffer");
        }
        Ok(())
    }

    /// Element count, equal to the padded length.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn raw(&self) -> &A::Buffer {
        self.inner
            .as_ref()
            .unwrap_or_else(|| unreachable!("device buffer used after release"))
    }

    pub(crate) fn raw_mut(&mut self) -> &mut A::Buffer {
        self.inner
            .as_mut()
            .unwrap_or_else(|| unreachable!("device buffer used after release"))
    }
}

impl<'a, T, A> Drop for DeviceBuffer<'a, T, A>
where
    T: SortKey,
    A: Accelerator<T>,
{
    fn drop(&mut self) {
        if let Some(raw) = self.inner.take() {
            let warning = ResourceWarning { len: self.len };
            warn!(%warning, "device buffer dropped without release");
            if let Err(e) = self.ctx.release(raw) {
                error!(error = %e, "failed to free device buffer on drop");
            }
        }
    }
}
