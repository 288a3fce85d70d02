use std::os::fd::RawFd;

use crate::foundation::error::{V2dError, V2dResult};

/// Largest palette the hardware accepts.
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// Pixel rectangle on a surface, in hardware 16-bit coordinates.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Area {
    /// Left edge.
    pub x: u16,
    /// Top edge.
    pub y: u16,
    /// Width in pixels.
    pub w: u16,
    /// Height in pixels.
    pub h: u16,
}

impl Area {
    /// Create an area from its origin and size.
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    /// Area covering a whole `w x h` surface.
    pub const fn full(w: u16, h: u16) -> Self {
        Self::new(0, 0, w, h)
    }

    /// Return `true` when the area covers no pixels.
    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Pixel formats understood by the accelerator.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum ColorFormat {
    #[default]
    Rgb888 = 0,
    Rgbx8888 = 1,
    Rgba8888 = 2,
    Argb8888 = 3,
    Rgb565 = 4,
    Nv12 = 5,
    Rgba5658 = 6,
    Argb8565 = 7,
    A8 = 8,
    Y8 = 9,
    L8Rgba8888 = 10,
    L8Rgb888 = 11,
    L8Rgb565 = 12,
    Bgr888 = 13,
    Bgrx8888 = 14,
    Bgra8888 = 15,
    Abgr8888 = 16,
    Bgr565 = 17,
    Nv21 = 18,
    Bgra5658 = 19,
    Abgr8565 = 20,
    L8Bgra8888 = 22,
    L8Bgr888 = 23,
    L8Bgr565 = 24,
}

impl ColorFormat {
    /// Raw value stored in the task record.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Bytes per pixel of the first plane.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgbx8888
            | Self::Rgba8888
            | Self::Argb8888
            | Self::Bgrx8888
            | Self::Bgra8888
            | Self::Abgr8888 => 4,
            Self::Rgb888
            | Self::Bgr888
            | Self::Rgba5658
            | Self::Argb8565
            | Self::Bgra5658
            | Self::Abgr8565 => 3,
            Self::Rgb565 | Self::Bgr565 => 2,
            Self::Nv12
            | Self::Nv21
            | Self::A8
            | Self::Y8
            | Self::L8Rgba8888
            | Self::L8Rgb888
            | Self::L8Rgb565
            | Self::L8Bgra8888
            | Self::L8Bgr888
            | Self::L8Bgr565 => 1,
        }
    }

    /// Return `true` for two-plane YUV 4:2:0 formats.
    pub fn is_semi_planar(self) -> bool {
        matches!(self, Self::Nv12 | Self::Nv21)
    }

    /// Bytes needed to hold a `height`-line image with the given first-plane `stride`.
    pub fn frame_len(self, stride: u32, height: u32) -> u64 {
        let luma = u64::from(stride) * u64::from(height);
        if self.is_semi_planar() {
            luma + luma / 2
        } else {
            luma
        }
    }
}

/// Color-space conversion applied to an input layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum CscMode {
    RgbToBt601Wide = 0,
    Bt601WideToRgb = 1,
    RgbToBt601Narrow = 2,
    Bt601NarrowToRgb = 3,
    RgbToBt709Wide = 4,
    Bt709WideToRgb = 5,
    RgbToBt709Narrow = 6,
    Bt709NarrowToRgb = 7,
    Bt601WideToBt709Wide = 8,
    Bt601WideToBt709Narrow = 9,
    Bt601WideToBt601Narrow = 10,
    Bt601NarrowToBt709Wide = 11,
    Bt601NarrowToBt709Narrow = 12,
    Bt601NarrowToBt601Wide = 13,
    Bt709WideToBt601Wide = 14,
    Bt709WideToBt601Narrow = 15,
    Bt709WideToBt709Narrow = 16,
    Bt709NarrowToBt601Wide = 17,
    Bt709NarrowToBt601Narrow = 18,
    Bt709NarrowToBt709Wide = 19,
    RgbToGrey = 20,
    RgbToRgb = 21,
    /// No conversion. The hardware treats this out-of-range value as "bypass".
    #[default]
    None = 22,
}

impl CscMode {
    /// Raw value stored in the task record.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Rotation or mirroring applied to an input layer.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum RotateAngle {
    #[default]
    Rot0 = 0,
    Rot90 = 1,
    Rot180 = 2,
    Rot270 = 3,
    Mirror = 4,
    Flip = 5,
}

impl RotateAngle {
    /// Raw value stored in the task record.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Output dithering.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum Dither {
    #[default]
    None = 0,
    Dither4x4 = 1,
    Dither8x8 = 2,
}

impl Dither {
    /// Raw value stored in the task record.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Blend engine command.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum BlendCmd {
    /// Alpha blending of the enabled layers.
    #[default]
    Alpha = 0,
    /// Raster operation between layers.
    Rop2 = 1,
}

/// Source format of a frame-buffer-compressed (FBC) input.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum FbcFormat {
    #[default]
    Nv12 = 0,
    Rgb888 = 1,
    Argb8888 = 2,
    Rgb565 = 3,
}

/// FBC decoder scan mode.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
#[allow(missing_docs)]
pub enum FbcDecoderMode {
    #[default]
    ScanLine = 0,
    LdcY = 1,
    LdcUv = 2,
}

/// Inclusive bounding box of the valid FBC payload.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[allow(missing_docs)]
pub struct FbcBbox {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

impl FbcBbox {
    /// Bounding box covering a whole `w x h` image.
    pub fn covering(w: u16, h: u16) -> Self {
        Self {
            left: 0,
            top: 0,
            right: w.saturating_sub(1),
            bottom: h.saturating_sub(1),
        }
    }
}

/// Compressed-input description for a layer surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FbcDecoder {
    /// DMA-BUF fd holding header and payload.
    pub fd: RawFd,
    /// Byte offset of the header inside `fd`.
    #[serde(default)]
    pub offset: u32,
    /// Valid payload region.
    pub bbox: FbcBbox,
    /// Compressed pixel format.
    pub format: FbcFormat,
    /// Scan mode.
    #[serde(default)]
    pub mode: FbcDecoderMode,
    /// Split-block layout.
    #[serde(default)]
    pub split: bool,
}

/// Compressed-output description for the destination surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FbcEncoder {
    /// DMA-BUF fd receiving header and payload.
    pub fd: RawFd,
    /// Byte offset of the payload inside `fd`.
    #[serde(default)]
    pub offset: u32,
    /// Valid payload region.
    pub bbox: FbcBbox,
    /// Compressed pixel format.
    pub format: FbcFormat,
    /// Split-block layout.
    #[serde(default)]
    pub split: bool,
}

/// Pixel buffer used as a task input layer or destination.
///
/// The fd is borrowed: the surface never opens or closes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Surface {
    /// DMA-BUF fd backing the pixels.
    pub fd: RawFd,
    /// Byte offset of the first pixel inside `fd`.
    #[serde(default)]
    pub offset: u32,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Line pitch in bytes (first plane).
    pub stride: u16,
    /// Pixel format.
    pub format: ColorFormat,
    /// Compressed input, for layer surfaces.
    #[serde(default)]
    pub fbc_decoder: Option<FbcDecoder>,
    /// Compressed output, for the destination surface.
    #[serde(default)]
    pub fbc_encoder: Option<FbcEncoder>,
}

impl Surface {
    /// Uncompressed surface with a packed stride (`width * bytes_per_pixel`).
    pub fn packed(fd: RawFd, width: u16, height: u16, format: ColorFormat) -> Self {
        let stride = u32::from(width) * format.bytes_per_pixel();
        Self {
            fd,
            offset: 0,
            width,
            height,
            stride: u16::try_from(stride).unwrap_or(u16::MAX),
            format,
            fbc_decoder: None,
            fbc_encoder: None,
        }
    }

    /// Return the same surface starting `offset` bytes into its buffer.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Return `true` when the surface is frame-buffer compressed in either direction.
    pub fn is_compressed(&self) -> bool {
        self.fbc_decoder.is_some() || self.fbc_encoder.is_some()
    }

    /// Area covering the whole surface.
    pub fn full_area(&self) -> Area {
        Area::full(self.width, self.height)
    }
}

/// Solid fill color in an explicit format.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FillColor {
    /// Format `value` is encoded in.
    pub format: ColorFormat,
    /// Packed color value.
    pub value: u32,
}

impl FillColor {
    /// Color packed as RGBA8888.
    pub const fn rgba8888(value: u32) -> Self {
        Self {
            format: ColorFormat::Rgba8888,
            value,
        }
    }
}

/// Per-layer blend configuration.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BlendLayerConf {
    /// Destination region the layer is blended into.
    pub area: Area,
    /// Constant alpha multiplied into the layer. `None` uses per-pixel alpha only.
    #[serde(default)]
    pub global_alpha: Option<u8>,
}

/// Blend engine configuration for a task.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BlendConf {
    /// Blend command.
    #[serde(default)]
    pub cmd: BlendCmd,
    /// Background color under all layers. `None` disables it.
    #[serde(default)]
    pub background: Option<FillColor>,
    /// Layer 0 (background) and layer 1 (foreground) settings.
    #[serde(default)]
    pub layers: [BlendLayerConf; 2],
}

impl BlendConf {
    /// Alpha blend with only layer 0 enabled over `area`.
    pub fn single_layer(area: Area) -> Self {
        let mut conf = Self::default();
        conf.layers[0].area = area;
        conf
    }
}

/// Color lookup table for `L8*` formats.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct Palette {
    entries: Vec<u32>,
}

impl Palette {
    /// Create a palette from packed color entries.
    pub fn new(entries: Vec<u32>) -> V2dResult<Self> {
        if entries.len() > MAX_PALETTE_ENTRIES {
            return Err(V2dError::validation(format!(
                "palette holds {} entries, at most {MAX_PALETTE_ENTRIES} are supported",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    /// Borrow the palette entries.
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` when the palette is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<Vec<u32>> for Palette {
    type Error = V2dError;

    fn try_from(entries: Vec<u32>) -> V2dResult<Self> {
        Self::new(entries)
    }
}

impl From<Palette> for Vec<u32> {
    fn from(p: Palette) -> Self {
        p.entries
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
