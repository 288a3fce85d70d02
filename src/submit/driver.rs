use crate::foundation::error::V2dError;
use crate::submit::device::TaskDevice;
use crate::task::abi::TaskRecord;
use crate::task::builder::{Task, TaskState};

/// Result of writing a job's tasks to the device.
#[derive(Debug, Default)]
pub struct SubmitOutcome {
    /// Tasks the device accepted, all at the front of the job.
    pub accepted: usize,
    /// Failure that stopped submission, if any.
    pub error: Option<V2dError>,
}

impl SubmitOutcome {
    /// Return `true` when every task was accepted.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Write every task to `device` in order, one full record per write.
///
/// Each task's fence slots are reset to absent before its write. A write that fails or
/// transfers anything other than exactly one record stops submission: later tasks stay
/// [`TaskState::Appended`] and are never written. Accepted tasks move to
/// [`TaskState::Submitted`] and own whatever fences the device stored in their record.
pub fn submit_tasks(device: &dyn TaskDevice, tasks: &mut [Task]) -> SubmitOutcome {
    let expected = TaskRecord::wire_size();
    let mut outcome = SubmitOutcome::default();

    for (index, task) in tasks.iter_mut().enumerate() {
        task.record.clear_fences();
        let kind = task.kind();

        match device.write_task(&mut task.record) {
            Ok(written) if written == expected => {
                task.state = TaskState::Submitted;
                outcome.accepted += 1;
                tracing::debug!(
                    index,
                    ?kind,
                    acquire = task.record.acquire_fence_fd,
                    complete = task.record.complete_fence_fd,
                    "task written"
                );
            }
            Ok(written) => {
                tracing::warn!(index, written, expected, "short write, aborting job");
                outcome.error = Some(V2dError::ShortWrite {
                    index,
                    written,
                    expected,
                });
                break;
            }
            Err(source) => {
                tracing::warn!(index, err = %source, "task write rejected, aborting job");
                outcome.error = Some(V2dError::DeviceWrite { index, source });
                break;
            }
        }
    }

    outcome
}

#[cfg(test)]
#[path = "../../tests/unit/submit/driver.rs"]
mod tests;
