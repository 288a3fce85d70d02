use crate::foundation::abort::reserve_or_abort;
use crate::foundation::error::{V2dError, V2dResult};
use crate::task::builder::{BitblitParams, BlendParams, FillParams, Task, TaskKind, TaskState};

/// Most tasks a single job may hold.
pub const MAX_TASKS_PER_JOB: usize = 64;

/// Ordered batch of tasks submitted to the device as one unit.
///
/// Append order is submission order. The job owns its tasks; they are released exactly once
/// when the job is submitted or dropped.
#[derive(Debug, Default)]
pub struct Job {
    tasks: Vec<Task>,
    last_kind: TaskKind,
}

impl Job {
    /// Create an empty job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a solid fill.
    pub fn add_fill_task(&mut self, params: &FillParams) -> V2dResult<()> {
        self.push_with(TaskKind::Fill, || Task::fill(params))
    }

    /// Append a bit-block transfer.
    pub fn add_bitblit_task(&mut self, params: &BitblitParams) -> V2dResult<()> {
        self.push_with(TaskKind::Bitblit, || Task::bitblit(params))
    }

    /// Append a blend.
    pub fn add_blend_task(&mut self, params: &BlendParams) -> V2dResult<()> {
        self.push_with(TaskKind::Blend, || Task::blend(params))
    }

    /// Append an already built task. On rejection the task is dropped.
    pub fn push(&mut self, task: Task) -> V2dResult<()> {
        let kind = task.kind();
        self.push_with(kind, move || task)
    }

    fn push_with(&mut self, kind: TaskKind, build: impl FnOnce() -> Task) -> V2dResult<()> {
        if self.tasks.len() >= MAX_TASKS_PER_JOB {
            tracing::warn!(
                ?kind,
                max = MAX_TASKS_PER_JOB,
                "task rejected: job is full"
            );
            return Err(V2dError::CapacityExceeded {
                max: MAX_TASKS_PER_JOB,
            });
        }
        reserve_or_abort(&mut self.tasks, 1, "job task slot");

        let mut task = build();
        task.state = TaskState::Appended;
        self.tasks.push(task);
        self.last_kind = kind;
        Ok(())
    }

    /// Number of tasks held.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Return `true` when no task has been appended.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Kind of the most recently appended task.
    pub fn last_kind(&self) -> TaskKind {
        self.last_kind
    }

    /// Borrow the tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub(crate) fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

#[cfg(test)]
#[path = "../../tests/unit/job/queue.rs"]
mod tests;
