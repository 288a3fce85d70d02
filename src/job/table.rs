use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{V2dError, V2dResult};
use crate::job::queue::Job;

/// Opaque reference to a job held by a [`crate::V2d`] engine.
///
/// Ids come from one process-wide counter and are never reused, so a handle that outlived its
/// job, or one issued by another engine, is rejected instead of reaching a different job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobHandle(u64);

impl JobHandle {
    /// Sentinel that never names a job.
    pub const NULL: Self = Self(0);

    /// Rebuild a handle from [`JobHandle::raw`], e.g. across an FFI boundary.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Integer form of the handle.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Return `true` for [`JobHandle::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Jobs between `begin` and `end`, keyed by handle.
#[derive(Debug, Default)]
pub(crate) struct JobTable {
    jobs: Mutex<HashMap<u64, Job>>,
}

impl JobTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Job>> {
        // The map stays consistent even if a holder panicked: every mutation is a single map op.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, job: Job) -> JobHandle {
        let handle = JobHandle::next();
        self.lock().insert(handle.0, job);
        handle
    }

    pub(crate) fn with_job<R>(
        &self,
        handle: JobHandle,
        f: impl FnOnce(&mut Job) -> V2dResult<R>,
    ) -> V2dResult<R> {
        if handle.is_null() {
            return Err(V2dError::InvalidHandle);
        }
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&handle.0)
            .ok_or(V2dError::InvalidHandle)?;
        f(job)
    }

    pub(crate) fn take(&self, handle: JobHandle) -> V2dResult<Job> {
        if handle.is_null() {
            return Err(V2dError::InvalidHandle);
        }
        self.lock()
            .remove(&handle.0)
            .ok_or(V2dError::InvalidHandle)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/table.rs"]
mod tests;
