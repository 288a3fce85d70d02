use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::foundation::error::V2dResult;
use crate::job::queue::Job;
use crate::job::table::{JobHandle, JobTable};
use crate::submit::device::{DEFAULT_DEVICE_PATH, DeviceProvider, SharedDevice};
use crate::submit::driver::submit_tasks;
use crate::sync::fence::{DEFAULT_FENCE_TIMEOUT, DrainStats, drain_fences};
use crate::task::builder::{BitblitParams, BlendParams, FillParams, Task};

/// Options controlling how a [`V2d`] engine submits jobs.
#[derive(Clone, Debug)]
pub struct V2dOpts {
    /// Device node tasks are written to.
    pub device_path: PathBuf,
    /// Bound on each completion-fence wait. Fixed for the engine's lifetime.
    pub fence_timeout: Duration,
    /// After a failed write, still wait on and close the fences of tasks the device already
    /// accepted.
    pub drain_on_short_write: bool,
}

impl Default for V2dOpts {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
            drain_on_short_write: true,
        }
    }
}

/// Per-job submission statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Tasks accepted by the device.
    pub tasks_written: usize,
    /// How their completion fences resolved.
    pub fences: DrainStats,
}

/// Job assembly and submission engine.
///
/// Jobs are built either as owned [`Job`] values passed to [`V2d::submit`], or through the
/// handle protocol: [`V2d::begin_job`], `add_*_task`, then [`V2d::end_job`]. Different threads
/// may drive different jobs on the same engine concurrently.
pub struct V2d {
    opts: V2dOpts,
    provider: Arc<dyn DeviceProvider>,
    jobs: JobTable,
}

impl fmt::Debug for V2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V2d")
            .field("opts", &self.opts)
            .field("live_jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

impl Default for V2d {
    fn default() -> Self {
        Self::new(V2dOpts::default())
    }
}

impl V2d {
    /// Engine writing to the process-wide node at `opts.device_path`.
    ///
    /// The node is opened on the first submission, not here.
    pub fn new(opts: V2dOpts) -> Self {
        let provider = Arc::new(SharedDevice::new(opts.device_path.clone()));
        Self::with_provider(opts, provider)
    }

    /// Engine writing to whatever `provider` hands out. `opts.device_path` is ignored.
    pub fn with_provider(opts: V2dOpts, provider: Arc<dyn DeviceProvider>) -> Self {
        Self {
            opts,
            provider,
            jobs: JobTable::default(),
        }
    }

    /// Engine options.
    pub fn opts(&self) -> &V2dOpts {
        &self.opts
    }

    /// Start an empty job and return its handle.
    pub fn begin_job(&self) -> JobHandle {
        let handle = self.jobs.insert(Job::new());
        tracing::trace!(handle = handle.raw(), "job started");
        handle
    }

    /// Append a solid fill to the job behind `handle`.
    pub fn add_fill_task(&self, handle: JobHandle, params: &FillParams) -> V2dResult<()> {
        let task = Task::fill(params);
        self.jobs.with_job(handle, move |job| job.push(task))
    }

    /// Append a bit-block transfer to the job behind `handle`.
    pub fn add_bitblit_task(&self, handle: JobHandle, params: &BitblitParams) -> V2dResult<()> {
        let task = Task::bitblit(params);
        self.jobs.with_job(handle, move |job| job.push(task))
    }

    /// Append a blend to the job behind `handle`.
    pub fn add_blend_task(&self, handle: JobHandle, params: &BlendParams) -> V2dResult<()> {
        let task = Task::blend(params);
        self.jobs.with_job(handle, move |job| job.push(task))
    }

    /// Submit the job behind `handle` and wait for it to complete.
    ///
    /// The handle is dead once this returns, whatever the outcome, and every task of the job
    /// has been released.
    #[tracing::instrument(skip_all, fields(handle = handle.raw()))]
    pub fn end_job(&self, handle: JobHandle) -> V2dResult<()> {
        let job = self.jobs.take(handle)?;
        self.submit(job).map(|_| ())
    }

    /// Drop the job behind `handle` without writing anything to the device.
    pub fn abandon_job(&self, handle: JobHandle) -> V2dResult<()> {
        let job = self.jobs.take(handle)?;
        tracing::debug!(handle = handle.raw(), tasks = job.len(), "job abandoned");
        Ok(())
    }

    /// Jobs started but not yet ended or abandoned.
    pub fn live_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Write every task of `job` to the device in order, then wait on their completion fences
    /// in the same order.
    ///
    /// If the device cannot be acquired nothing is written. If a write fails, the remaining
    /// tasks are never written and the write error is returned; with
    /// [`V2dOpts::drain_on_short_write`] the fences of tasks already accepted are drained first.
    /// Otherwise the first fence failure is returned after every fence has been released.
    #[tracing::instrument(skip_all, fields(tasks = job.len()))]
    pub fn submit(&self, job: Job) -> V2dResult<JobStats> {
        let mut tasks = job.into_tasks();
        let device = self.provider.acquire()?;

        let outcome = submit_tasks(device.as_ref(), &mut tasks);
        if let Some(err) = outcome.error {
            if self.opts.drain_on_short_write {
                if let Err(fence_err) = drain_fences(&mut tasks, self.opts.fence_timeout) {
                    tracing::warn!(%fence_err, "fence failure while unwinding a failed job");
                }
            } else if outcome.accepted > 0 {
                tracing::warn!(
                    accepted = outcome.accepted,
                    "leaving fences of accepted tasks undrained"
                );
            }
            return Err(err);
        }

        let fences = drain_fences(&mut tasks, self.opts.fence_timeout)?;
        tracing::debug!(tasks = outcome.accepted, ?fences, "job complete");
        Ok(JobStats {
            tasks_written: outcome.accepted,
            fences,
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
