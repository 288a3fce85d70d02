use std::io;
use std::sync::Mutex;

use super::*;
use crate::foundation::core::{Area, ColorFormat, FillColor, Surface};
use crate::task::builder::FillParams;

/// Device that answers each write from a script and remembers the fill rectangles it saw.
struct ScriptedDevice {
    replies: Mutex<Vec<io::Result<usize>>>,
    seen: Mutex<Vec<u16>>,
}

impl ScriptedDevice {
    fn new(mut replies: Vec<io::Result<usize>>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<u16> {
        self.seen.lock().unwrap().clone()
    }
}

impl TaskDevice for ScriptedDevice {
    fn write_task(&self, record: &mut TaskRecord) -> io::Result<usize> {
        assert_eq!(record.acquire_fence_fd, -1);
        assert_eq!(record.complete_fence_fd, -1);
        self.seen.lock().unwrap().push(record.param.dst_rect.x);
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Ok(TaskRecord::wire_size()))
    }
}

fn tasks(n: u16) -> Vec<Task> {
    (0..n)
        .map(|x| {
            let mut task = Task::fill(&FillParams {
                dst: Surface::packed(3, 320, 240, ColorFormat::Rgba8888),
                dst_rect: Area::new(x, 0, 8, 8),
                color: FillColor::rgba8888(0x00ff_cc66),
            });
            task.state = TaskState::Appended;
            // Stale values must never reach the device.
            task.record.acquire_fence_fd = 77;
            task.record.complete_fence_fd = 78;
            task
        })
        .collect()
}

#[test]
fn every_task_is_written_in_order() {
    let device = ScriptedDevice::new(Vec::new());
    let mut tasks = tasks(5);

    let outcome = submit_tasks(&device, &mut tasks);

    assert!(outcome.is_complete());
    assert_eq!(outcome.accepted, 5);
    assert_eq!(device.seen(), vec![0, 1, 2, 3, 4]);
    assert!(tasks.iter().all(|t| t.state() == TaskState::Submitted));
}

#[test]
fn short_write_stops_the_job() {
    let size = TaskRecord::wire_size();
    let device = ScriptedDevice::new(vec![Ok(size), Ok(size - 8)]);
    let mut tasks = tasks(4);

    let outcome = submit_tasks(&device, &mut tasks);

    assert_eq!(outcome.accepted, 1);
    match outcome.error {
        Some(V2dError::ShortWrite {
            index,
            written,
            expected,
        }) => {
            assert_eq!(index, 1);
            assert_eq!(written, size - 8);
            assert_eq!(expected, size);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(device.seen(), vec![0, 1]);
    assert_eq!(tasks[0].state(), TaskState::Submitted);
    assert!(tasks[1..].iter().all(|t| t.state() == TaskState::Appended));
}

#[test]
fn oversized_reply_is_also_a_short_write() {
    let device = ScriptedDevice::new(vec![Ok(TaskRecord::wire_size() + 1)]);
    let mut tasks = tasks(2);

    let outcome = submit_tasks(&device, &mut tasks);

    assert_eq!(outcome.accepted, 0);
    assert!(matches!(outcome.error, Some(V2dError::ShortWrite { index: 0, .. })));
}

#[test]
fn write_error_stops_the_job() {
    let size = TaskRecord::wire_size();
    let device = ScriptedDevice::new(vec![
        Ok(size),
        Ok(size),
        Err(io::Error::from_raw_os_error(libc::EINVAL)),
    ]);
    let mut tasks = tasks(6);

    let outcome = submit_tasks(&device, &mut tasks);

    assert_eq!(outcome.accepted, 2);
    let err = outcome.error.expect("write error");
    assert!(err.is_submission_failure());
    assert!(matches!(err, V2dError::DeviceWrite { index: 2, .. }));
    assert_eq!(device.seen(), vec![0, 1, 2]);
}

#[test]
fn empty_job_writes_nothing() {
    let device = ScriptedDevice::new(Vec::new());
    let outcome = submit_tasks(&device, &mut []);
    assert!(outcome.is_complete());
    assert_eq!(outcome.accepted, 0);
    assert!(device.seen().is_empty());
}
