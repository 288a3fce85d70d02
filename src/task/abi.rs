//! Fixed-size task record exchanged with the V2D kernel driver.
//!
//! One [`TaskRecord`] is written per task. The driver fills the two trailing fence slots in
//! place, so the record is always handed over as a mutable buffer. Nothing in this crate reads
//! the record back except the fence slots.

use bytemuck::{Pod, Zeroable};

use crate::foundation::core::{
    Area, BlendConf, BlendLayerConf, FbcDecoder, FbcEncoder, FillColor, MAX_PALETTE_ENTRIES,
    Palette, Surface,
};

/// Value of an empty fence slot.
pub const FENCE_ABSENT: i32 = -1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct AreaRecord {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl From<Area> for AreaRecord {
    fn from(a: Area) -> Self {
        Self {
            x: a.x,
            y: a.y,
            w: a.w,
            h: a.h,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct FillColorRecord {
    pub format: u32,
    pub color_value: u32,
}

impl From<FillColor> for FillColorRecord {
    fn from(c: FillColor) -> Self {
        Self {
            format: c.format.raw(),
            color_value: c.value,
        }
    }
}

/// Solid color standing in for a layer's pixel data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct SolidColorRecord {
    pub fill_color: FillColorRecord,
    pub enable: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct FbcDecRecord {
    pub fd: i32,
    pub offset: u32,
    pub bbox_left: u16,
    pub bbox_top: u16,
    pub bbox_right: u16,
    pub bbox_bottom: u16,
    pub format: u32,
    pub mode: u32,
    pub is_split: u32,
}

impl From<FbcDecoder> for FbcDecRecord {
    fn from(d: FbcDecoder) -> Self {
        Self {
            fd: d.fd,
            offset: d.offset,
            bbox_left: d.bbox.left,
            bbox_top: d.bbox.top,
            bbox_right: d.bbox.right,
            bbox_bottom: d.bbox.bottom,
            format: d.format as u32,
            mode: d.mode as u32,
            is_split: u32::from(d.split),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct FbcEncRecord {
    pub fd: i32,
    pub offset: u32,
    pub bbox_left: u16,
    pub bbox_top: u16,
    pub bbox_right: u16,
    pub bbox_bottom: u16,
    pub format: u32,
    pub is_split: u32,
}

impl From<FbcEncoder> for FbcEncRecord {
    fn from(e: FbcEncoder) -> Self {
        Self {
            fd: e.fd,
            offset: e.offset,
            bbox_left: e.bbox.left,
            bbox_top: e.bbox.top,
            bbox_right: e.bbox.right,
            bbox_bottom: e.bbox.bottom,
            format: e.format as u32,
            is_split: u32::from(e.split),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct SurfaceRecord {
    pub solid_color: SolidColorRecord,
    pub w: u16,
    pub h: u16,
    pub stride: u16,
    pub reserved: u16,
    pub format: u32,
    pub fbc_enable: u32,
    pub fd: i32,
    pub offset: u32,
    pub fbc_dec: FbcDecRecord,
    pub fbc_enc: FbcEncRecord,
}

impl From<&Surface> for SurfaceRecord {
    fn from(s: &Surface) -> Self {
        Self {
            solid_color: SolidColorRecord::default(),
            w: s.width,
            h: s.height,
            stride: s.stride,
            reserved: 0,
            format: s.format.raw(),
            fbc_enable: u32::from(s.is_compressed()),
            fd: s.fd,
            offset: s.offset,
            fbc_dec: s.fbc_decoder.map(FbcDecRecord::from).unwrap_or_default(),
            fbc_enc: s.fbc_encoder.map(FbcEncRecord::from).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct BackgroundRecord {
    pub fill_color: FillColorRecord,
    pub enable: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct BlendLayerRecord {
    pub blend_area: AreaRecord,
    pub global_alpha_enable: u32,
    pub global_alpha: u32,
}

impl From<BlendLayerConf> for BlendLayerRecord {
    fn from(l: BlendLayerConf) -> Self {
        Self {
            blend_area: l.area.into(),
            global_alpha_enable: u32::from(l.global_alpha.is_some()),
            global_alpha: l.global_alpha.map_or(0, u32::from),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct BlendConfRecord {
    pub blend_cmd: u32,
    pub bgcolor: BackgroundRecord,
    pub blend_layer: [BlendLayerRecord; 2],
}

impl From<&BlendConf> for BlendConfRecord {
    fn from(c: &BlendConf) -> Self {
        Self {
            blend_cmd: c.cmd as u32,
            bgcolor: BackgroundRecord {
                fill_color: c.background.map(FillColorRecord::from).unwrap_or_default(),
                enable: u32::from(c.background.is_some()),
            },
            blend_layer: c.layers.map(BlendLayerRecord::from),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct PaletteRecord {
    pub len: u32,
    pub entries: [u32; MAX_PALETTE_ENTRIES],
}

impl From<&Palette> for PaletteRecord {
    fn from(p: &Palette) -> Self {
        let mut rec = Self::zeroed();
        let n = p.len().min(MAX_PALETTE_ENTRIES);
        rec.entries[..n].copy_from_slice(&p.entries()[..n]);
        rec.len = n as u32;
        rec
    }
}

/// Full operation description: three input layers, destination, blend and per-layer modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ParamRecord {
    pub layer0: SurfaceRecord,
    pub l0_rect: AreaRecord,
    pub layer1: SurfaceRecord,
    pub l1_rect: AreaRecord,
    pub mask: SurfaceRecord,
    pub mask_rect: AreaRecord,
    pub dst: SurfaceRecord,
    pub dst_rect: AreaRecord,
    pub blend_conf: BlendConfRecord,
    pub l0_rotate: u32,
    pub l1_rotate: u32,
    pub l0_csc: u32,
    pub l1_csc: u32,
    pub dither: u32,
    pub palette: PaletteRecord,
}

/// One task as written to the device node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct TaskRecord {
    /// Operation parameters.
    pub param: ParamRecord,
    /// Fence the hardware waits on before reading inputs. Filled by the driver.
    pub acquire_fence_fd: i32,
    /// Fence signaled when the output is written. Filled by the driver.
    pub complete_fence_fd: i32,
}

const _: () = assert!(size_of::<TaskRecord>() == 1488);

impl TaskRecord {
    /// Fully zeroed record with both fence slots empty.
    pub fn new() -> Self {
        let mut rec = Self::zeroed();
        rec.clear_fences();
        rec
    }

    /// Size in bytes of one record on the wire.
    pub const fn wire_size() -> usize {
        size_of::<Self>()
    }

    /// Reset both fence slots to [`FENCE_ABSENT`].
    pub fn clear_fences(&mut self) {
        self.acquire_fence_fd = FENCE_ABSENT;
        self.complete_fence_fd = FENCE_ABSENT;
    }

    /// Move both fence fds out of the record, leaving the slots empty.
    ///
    /// Returns `(acquire, complete)`.
    pub fn take_fences(&mut self) -> (i32, i32) {
        let fences = (self.acquire_fence_fd, self.complete_fence_fd);
        self.clear_fences();
        fences
    }

    /// Borrow the record as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Borrow the record as mutable raw bytes, for handing to the driver.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }
}

impl Default for TaskRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/abi.rs"]
mod tests;
