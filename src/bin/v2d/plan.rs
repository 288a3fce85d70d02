//! Declarative job description for `v2d run`.
//!
//! A plan names the dma-bufs it needs and refers to them by name from each task, so it can be
//! written without knowing any fd up front:
//!
//! ```json
//! {
//!   "buffers": { "out": { "size": 307200, "fill": 128 } },
//!   "tasks": [
//!     { "op": "fill",
//!       "dst": { "buffer": "out", "width": 320, "height": 240, "format": "rgba8888" },
//!       "dst_rect": { "x": 32, "y": 32, "w": 210, "h": 180 },
//!       "color": { "format": "rgba8888", "value": 16764006 } }
//!   ],
//!   "dump": { "out": "fill.raw" }
//! }
//! ```

use std::collections::BTreeMap;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use v2d::{
    Area, BitblitParams, BlendConf, BlendParams, ColorFormat, CscMode, Dither, FbcBbox,
    FbcDecoder, FbcDecoderMode, FbcEncoder, FbcFormat, FillColor, FillParams, Job, Palette,
    RotateAngle, Surface, V2dError, V2dResult,
};

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobPlan {
    pub buffers: BTreeMap<String, BufferSpec>,
    pub tasks: Vec<TaskSpec>,
    /// Buffers written out to files once the job has completed.
    #[serde(default)]
    pub dump: BTreeMap<String, PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferSpec {
    /// Bytes requested; rounded up to whole pages.
    pub size: usize,
    /// Heap to allocate from. Defaults to the system heap.
    #[serde(default)]
    pub heap: Option<String>,
    /// Byte every location is set to before the job runs.
    #[serde(default)]
    pub fill: Option<u8>,
    /// File copied into the buffer before the job runs.
    #[serde(default)]
    pub load: Option<PathBuf>,
}

impl BufferSpec {
    /// Whether the CLI touches the buffer through a CPU mapping.
    pub fn cpu_access(&self, name: &str, plan: &JobPlan) -> bool {
        self.fill.is_some() || self.load.is_some() || plan.dump.contains_key(name)
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FbcDecoderSpec {
    pub buffer: String,
    #[serde(default)]
    pub offset: u32,
    /// Defaults to the whole surface.
    #[serde(default)]
    pub bbox: Option<FbcBbox>,
    pub format: FbcFormat,
    #[serde(default)]
    pub mode: FbcDecoderMode,
    #[serde(default)]
    pub split: bool,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FbcEncoderSpec {
    pub buffer: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub bbox: Option<FbcBbox>,
    pub format: FbcFormat,
    #[serde(default)]
    pub split: bool,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceSpec {
    pub buffer: String,
    #[serde(default)]
    pub offset: u32,
    pub width: u16,
    pub height: u16,
    /// Packed stride when omitted.
    #[serde(default)]
    pub stride: Option<u16>,
    pub format: ColorFormat,
    #[serde(default)]
    pub fbc_decoder: Option<FbcDecoderSpec>,
    #[serde(default)]
    pub fbc_encoder: Option<FbcEncoderSpec>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TaskSpec {
    Fill {
        dst: SurfaceSpec,
        /// Whole surface when omitted.
        #[serde(default)]
        dst_rect: Option<Area>,
        color: FillColor,
    },
    Bitblit {
        dst: SurfaceSpec,
        #[serde(default)]
        dst_rect: Option<Area>,
        src: SurfaceSpec,
        #[serde(default)]
        src_rect: Option<Area>,
        #[serde(default)]
        csc: CscMode,
    },
    Blend {
        #[serde(default)]
        background: Option<SurfaceSpec>,
        #[serde(default)]
        background_rect: Option<Area>,
        #[serde(default)]
        foreground: Option<SurfaceSpec>,
        #[serde(default)]
        foreground_rect: Option<Area>,
        #[serde(default)]
        mask: Option<SurfaceSpec>,
        #[serde(default)]
        mask_rect: Option<Area>,
        dst: SurfaceSpec,
        #[serde(default)]
        dst_rect: Option<Area>,
        #[serde(default)]
        blend: Option<BlendConf>,
        #[serde(default)]
        foreground_rotate: RotateAngle,
        #[serde(default)]
        background_rotate: RotateAngle,
        #[serde(default)]
        foreground_csc: CscMode,
        #[serde(default)]
        background_csc: CscMode,
        #[serde(default)]
        palette: Option<Palette>,
        #[serde(default)]
        dither: Dither,
    },
}

impl JobPlan {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read plan '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse plan '{}'", path.display()))
    }

    /// Reject plans that reference undeclared buffers or exceed one job, before anything is
    /// allocated.
    pub fn validate(&self) -> V2dResult<()> {
        if self.tasks.len() > v2d::MAX_TASKS_PER_JOB {
            return Err(V2dError::validation(format!(
                "plan has {} tasks, a job holds at most {}",
                self.tasks.len(),
                v2d::MAX_TASKS_PER_JOB
            )));
        }
        let known = |name: &str| -> V2dResult<()> {
            if self.buffers.contains_key(name) {
                Ok(())
            } else {
                Err(V2dError::validation(format!("unknown buffer '{name}'")))
            }
        };
        for name in self.dump.keys() {
            known(name)?;
        }
        for task in &self.tasks {
            for s in task.surfaces() {
                known(&s.buffer)?;
                if let Some(d) = &s.fbc_decoder {
                    known(&d.buffer)?;
                }
                if let Some(e) = &s.fbc_encoder {
                    known(&e.buffer)?;
                }
            }
        }
        Ok(())
    }

    /// Build the job, resolving buffer names through `fd_of`.
    pub fn build_job(&self, fd_of: &dyn Fn(&str) -> Option<RawFd>) -> V2dResult<Job> {
        let mut job = Job::new();
        for task in &self.tasks {
            task.append_to(&mut job, fd_of)?;
        }
        Ok(job)
    }
}

impl TaskSpec {
    fn surfaces(&self) -> Vec<&SurfaceSpec> {
        match self {
            Self::Fill { dst, .. } => vec![dst],
            Self::Bitblit { dst, src, .. } => vec![dst, src],
            Self::Blend {
                background,
                foreground,
                mask,
                dst,
                ..
            } => [background.as_ref(), foreground.as_ref(), mask.as_ref(), Some(dst)]
                .into_iter()
                .flatten()
                .collect(),
        }
    }

    fn append_to(&self, job: &mut Job, fd_of: &dyn Fn(&str) -> Option<RawFd>) -> V2dResult<()> {
        let resolve = |s: &SurfaceSpec| s.resolve(fd_of);
        let resolve_opt = |s: &Option<SurfaceSpec>| s.as_ref().map(resolve).transpose();

        match self {
            Self::Fill {
                dst,
                dst_rect,
                color,
            } => {
                let dst = resolve(dst)?;
                job.add_fill_task(&FillParams {
                    dst,
                    dst_rect: dst_rect.unwrap_or_else(|| dst.full_area()),
                    color: *color,
                })
            }
            Self::Bitblit {
                dst,
                dst_rect,
                src,
                src_rect,
                csc,
            } => {
                let dst = resolve(dst)?;
                let src = resolve(src)?;
                job.add_bitblit_task(&BitblitParams {
                    dst,
                    dst_rect: dst_rect.unwrap_or_else(|| dst.full_area()),
                    src,
                    src_rect: src_rect.unwrap_or_else(|| src.full_area()),
                    csc: *csc,
                })
            }
            Self::Blend {
                background,
                background_rect,
                foreground,
                foreground_rect,
                mask,
                mask_rect,
                dst,
                dst_rect,
                blend,
                foreground_rotate,
                background_rotate,
                foreground_csc,
                background_csc,
                palette,
                dither,
            } => {
                let dst = resolve(dst)?;
                let dst_rect = dst_rect.unwrap_or_else(|| dst.full_area());
                job.add_blend_task(&BlendParams {
                    background: resolve_opt(background)?,
                    background_rect: *background_rect,
                    foreground: resolve_opt(foreground)?,
                    foreground_rect: *foreground_rect,
                    mask: resolve_opt(mask)?,
                    mask_rect: *mask_rect,
                    dst: Some(dst),
                    dst_rect: Some(dst_rect),
                    blend: Some(blend.unwrap_or_else(|| BlendConf::single_layer(dst_rect))),
                    foreground_rotate: *foreground_rotate,
                    background_rotate: *background_rotate,
                    foreground_csc: *foreground_csc,
                    background_csc: *background_csc,
                    palette: palette.clone(),
                    dither: *dither,
                })
            }
        }
    }
}

fn lookup(name: &str, fd_of: &dyn Fn(&str) -> Option<RawFd>) -> V2dResult<RawFd> {
    fd_of(name).ok_or_else(|| V2dError::validation(format!("unknown buffer '{name}'")))
}

impl SurfaceSpec {
    fn resolve(&self, fd_of: &dyn Fn(&str) -> Option<RawFd>) -> V2dResult<Surface> {
        let fd = lookup(&self.buffer, fd_of)?;
        let mut s = Surface::packed(fd, self.width, self.height, self.format).with_offset(self.offset);
        if let Some(stride) = self.stride {
            s.stride = stride;
        }
        let bbox =
            |b: Option<FbcBbox>| b.unwrap_or_else(|| FbcBbox::covering(self.width, self.height));
        if let Some(d) = &self.fbc_decoder {
            s.fbc_decoder = Some(FbcDecoder {
                fd: lookup(&d.buffer, fd_of)?,
                offset: d.offset,
                bbox: bbox(d.bbox),
                format: d.format,
                mode: d.mode,
                split: d.split,
            });
        }
        if let Some(e) = &self.fbc_encoder {
            s.fbc_encoder = Some(FbcEncoder {
                fd: lookup(&e.buffer, fd_of)?,
                offset: e.offset,
                bbox: bbox(e.bbox),
                format: e.format,
                split: e.split,
            });
        }
        Ok(s)
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/bin/plan.rs"]
mod tests;
