use super::*;
use crate::foundation::core::{Area, BlendConf, ColorFormat, CscMode, FillColor, Surface};

fn fill_params(x: u16) -> FillParams {
    FillParams {
        dst: Surface::packed(3, 320, 240, ColorFormat::Rgba8888),
        dst_rect: Area::new(x, 0, 16, 16),
        color: FillColor::rgba8888(0x00ff_cc66),
    }
}

fn blit_params() -> BitblitParams {
    let s = Surface::packed(4, 320, 240, ColorFormat::Rgba8888);
    BitblitParams {
        dst: s,
        dst_rect: Area::new(64, 32, 200, 180),
        src: s,
        src_rect: Area::new(53, 37, 200, 180),
        csc: CscMode::None,
    }
}

#[test]
fn new_job_is_empty() {
    let job = Job::new();
    assert!(job.is_empty());
    assert_eq!(job.len(), 0);
    assert_eq!(job.last_kind(), TaskKind::None);
}

#[test]
fn append_preserves_call_order_and_tracks_last_kind() {
    let mut job = Job::new();
    job.add_fill_task(&fill_params(0)).unwrap();
    job.add_bitblit_task(&blit_params()).unwrap();
    assert_eq!(job.last_kind(), TaskKind::Bitblit);
    job.add_blend_task(&BlendParams {
        blend: Some(BlendConf::single_layer(Area::full(8, 8))),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(job.last_kind(), TaskKind::Blend);
    job.add_fill_task(&fill_params(48)).unwrap();
    assert_eq!(job.last_kind(), TaskKind::Fill);

    let kinds: Vec<_> = job.tasks().iter().map(Task::kind).collect();
    assert_eq!(
        kinds,
        [
            TaskKind::Fill,
            TaskKind::Bitblit,
            TaskKind::Blend,
            TaskKind::Fill
        ]
    );
    assert_eq!(job.tasks()[3].record().param.dst_rect.x, 48);
    assert!(job.tasks().iter().all(|t| t.state() == TaskState::Appended));
}

#[test]
fn task_past_capacity_is_rejected_without_touching_the_job() {
    let mut job = Job::new();
    for i in 0..MAX_TASKS_PER_JOB {
        job.add_fill_task(&fill_params(i as u16)).unwrap();
    }
    assert_eq!(job.len(), 64);

    let err = job.add_bitblit_task(&blit_params()).unwrap_err();
    assert!(matches!(err, V2dError::CapacityExceeded { max: 64 }));
    assert_eq!(job.len(), 64);
    assert_eq!(job.last_kind(), TaskKind::Fill);
    assert_eq!(job.tasks()[63].record().param.dst_rect.x, 63);

    let err = job.push(Task::fill(&fill_params(99))).unwrap_err();
    assert!(matches!(err, V2dError::CapacityExceeded { .. }));
    assert_eq!(job.len(), 64);
}

#[test]
fn push_accepts_prebuilt_tasks() {
    let mut job = Job::new();
    let task = Task::bitblit(&blit_params());
    assert_eq!(task.state(), TaskState::Built);
    job.push(task).unwrap();
    assert_eq!(job.last_kind(), TaskKind::Bitblit);
    assert_eq!(job.tasks()[0].state(), TaskState::Appended);
}
