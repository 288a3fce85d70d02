//! `v2d` assembles batches of 2D-accelerator operations and submits them to the V2D kernel
//! driver as one unit of work.
//!
//! A job is an ordered list of up to [`MAX_TASKS_PER_JOB`] tasks:
//!
//! - solid fills ([`FillParams`])
//! - scaled / rotated copies ([`BitblitParams`])
//! - two-layer alpha blends with an optional mask ([`BlendParams`])
//!
//! [`V2d`] writes each task to the device node in append order, then waits on every task's
//! completion fence in the same order and releases all fence descriptors, even when some fail.
//!
//! ```no_run
//! use v2d::{Area, ColorFormat, FillColor, FillParams, Surface, V2d, V2dOpts};
//!
//! # fn main() -> v2d::V2dResult<()> {
//! # let dmabuf_fd = 3;
//! let v2d = V2d::new(V2dOpts::default());
//! let job = v2d.begin_job();
//! v2d.add_fill_task(
//!     job,
//!     &FillParams {
//!         dst: Surface::packed(dmabuf_fd, 320, 240, ColorFormat::Rgba8888),
//!         dst_rect: Area::new(32, 32, 210, 180),
//!         color: FillColor::rgba8888(0x00ff_cc66),
//!     },
//! )?;
//! v2d.end_job(job)?;
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod foundation;
mod job;
mod session;
mod submit;
mod sync;
mod task;

#[doc(hidden)]
pub use crate::foundation::alloc_track;

pub use crate::foundation::core::{
    Area, BlendCmd, BlendConf, BlendLayerConf, ColorFormat, CscMode, Dither, FbcBbox, FbcDecoder,
    FbcDecoderMode, FbcEncoder, FbcFormat, FillColor, MAX_PALETTE_ENTRIES, Palette, RotateAngle,
    Surface,
};
pub use crate::foundation::error::{V2dError, V2dResult};

pub use crate::job::queue::{Job, MAX_TASKS_PER_JOB};
pub use crate::job::table::JobHandle;
pub use crate::session::{JobStats, V2d, V2dOpts};
pub use crate::submit::device::{
    DEFAULT_DEVICE_PATH, DeviceNode, DeviceProvider, SharedDevice, TaskDevice, close_shared,
    open_shared, shutdown_shared_devices,
};
pub use crate::submit::driver::{SubmitOutcome, submit_tasks};
pub use crate::sync::fence::{
    DEFAULT_FENCE_TIMEOUT, DrainStats, FenceOutcome, PollFault, close_fence, drain_fences,
    wait_fence,
};
pub use crate::task::abi::{self, FENCE_ABSENT, TaskRecord};
pub use crate::task::builder::{
    BitblitParams, BlendParams, FillParams, Task, TaskKind, TaskState,
};
