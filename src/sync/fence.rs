use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::foundation::error::{V2dError, V2dResult};
use crate::task::builder::{Task, TaskState};

/// Default bound on a single completion-fence wait.
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Why a fence poll failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PollFault {
    /// `POLLERR` was raised on the fence.
    ErrorFlag,
    /// `POLLNVAL`: the descriptor is not open.
    InvalidFd,
    /// `poll` itself failed with this errno.
    Os(i32),
}

impl fmt::Display for PollFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorFlag => f.write_str("POLLERR"),
            Self::InvalidFd => f.write_str("POLLNVAL"),
            Self::Os(errno) => write!(f, "{}", io::Error::from_raw_os_error(*errno)),
        }
    }
}

/// How one completion fence resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FenceOutcome {
    /// The task carried no completion fence.
    Absent,
    /// The fence became readable.
    Signaled,
    /// Nothing signaled before the deadline.
    TimedOut,
    /// The fence reported an error.
    PollError(PollFault),
}

/// Per-job fence counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Tasks whose fence signaled.
    pub signaled: usize,
    /// Submitted tasks that carried no completion fence.
    pub absent: usize,
    /// Fences that timed out.
    pub timed_out: usize,
    /// Fences that reported an error.
    pub poll_errors: usize,
}

impl DrainStats {
    /// Tasks that reached [`TaskState::Drained`].
    pub fn drained(&self) -> usize {
        self.signaled + self.absent + self.timed_out + self.poll_errors
    }
}

/// Block until `fd` is readable or `timeout` elapses.
///
/// Interrupted polls are retried with the time left to the original deadline; a timeout is
/// never retried. Negative fds are reported as [`FenceOutcome::Absent`] without polling.
pub fn wait_fence(fd: RawFd, timeout: Duration) -> FenceOutcome {
    if fd < 0 {
        return FenceOutcome::Absent;
    }

    let deadline = Instant::now() + timeout;
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout_ms = libc::c_int::try_from(remaining.as_millis()).unwrap_or(libc::c_int::MAX);

        // SAFETY: `pfd` is a live, exclusively borrowed array of exactly one `pollfd`.
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        if ret > 0 {
            if pfd.revents & libc::POLLNVAL != 0 {
                return FenceOutcome::PollError(PollFault::InvalidFd);
            }
            if pfd.revents & libc::POLLERR != 0 {
                return FenceOutcome::PollError(PollFault::ErrorFlag);
            }
            return FenceOutcome::Signaled;
        }
        if ret == 0 {
            return FenceOutcome::TimedOut;
        }

        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => continue,
            _ => return FenceOutcome::PollError(PollFault::Os(err.raw_os_error().unwrap_or(0))),
        }
    }
}

/// Close a fence fd handed out by the driver. Negative fds are ignored.
///
/// Fence fds arrive as plain integers from the kernel, so they are closed directly rather than
/// adopted as `OwnedFd`.
pub fn close_fence(fd: RawFd) {
    if fd < 0 {
        return;
    }
    // SAFETY: the fd was produced by the driver for this task and is closed exactly once here;
    // the record slot it came from has already been reset.
    let ret = unsafe { libc::close(fd) };
    if ret < 0 {
        tracing::warn!(fd, err = %io::Error::last_os_error(), "failed to close fence fd");
    }
}

/// Wait on every submitted task's completion fence in order, releasing both fences of each.
///
/// A failing fence never stops the walk: later tasks are still waited on and closed. The first
/// failure is returned once every task has been drained. Tasks that were never submitted and
/// tasks already drained are skipped.
pub fn drain_fences(tasks: &mut [Task], timeout: Duration) -> V2dResult<DrainStats> {
    let mut stats = DrainStats::default();
    let mut first_err = None;

    for (index, task) in tasks.iter_mut().enumerate() {
        if task.state != TaskState::Submitted {
            continue;
        }

        let (acquire, complete) = task.record.take_fences();
        let outcome = wait_fence(complete, timeout);
        close_fence(complete);
        close_fence(acquire);

        task.fence_outcome = Some(outcome);
        task.state = TaskState::Drained;

        let err = match outcome {
            FenceOutcome::Signaled => {
                stats.signaled += 1;
                None
            }
            FenceOutcome::Absent => {
                stats.absent += 1;
                None
            }
            FenceOutcome::TimedOut => {
                stats.timed_out += 1;
                Some(V2dError::FenceTimeout {
                    index,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            FenceOutcome::PollError(fault) => {
                stats.poll_errors += 1;
                Some(V2dError::fence_poll(index, fault.to_string()))
            }
        };

        match err {
            Some(err) => {
                tracing::warn!(index, %err, "task completion not confirmed");
                first_err.get_or_insert(err);
            }
            None => tracing::debug!(index, ?outcome, "task fence drained"),
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(stats),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/fence.rs"]
mod tests;
