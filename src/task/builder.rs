use crate::foundation::core::{
    Area, BlendCmd, BlendConf, CscMode, Dither, FillColor, Palette, RotateAngle, Surface,
};
use crate::sync::fence::FenceOutcome;
use crate::task::abi::{
    AreaRecord, BlendConfRecord, PaletteRecord, SolidColorRecord, SurfaceRecord, TaskRecord,
};

/// Operation family of a task. Diagnostic only; the record itself carries the semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum TaskKind {
    /// No task appended yet.
    #[default]
    None = 0,
    /// Scaled / rotated copy.
    Bitblit = 1,
    /// Solid color fill.
    Fill = 2,
    /// Multi-layer alpha blend.
    Blend = 3,
}

/// Lifecycle of one task from construction to fence release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Built, not yet part of a job.
    Built,
    /// Held by a job, not yet written to the device.
    Appended,
    /// Accepted by the device; fences may be outstanding.
    Submitted,
    /// Fence fds released. Terminal.
    Drained,
}

/// Inputs of a solid fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FillParams {
    /// Destination surface.
    pub dst: Surface,
    /// Region of `dst` to fill.
    pub dst_rect: Area,
    /// Fill color.
    pub color: FillColor,
}

/// Inputs of a bit-block transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BitblitParams {
    /// Destination surface.
    pub dst: Surface,
    /// Region of `dst` written.
    pub dst_rect: Area,
    /// Source surface.
    pub src: Surface,
    /// Region of `src` read.
    pub src_rect: Area,
    /// Color-space conversion applied to the source.
    #[serde(default)]
    pub csc: CscMode,
}

/// Inputs of a blend. Every `None` leaves the matching record section zeroed.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlendParams {
    /// Layer 0.
    pub background: Option<Surface>,
    /// Region of layer 0 read.
    pub background_rect: Option<Area>,
    /// Layer 1.
    pub foreground: Option<Surface>,
    /// Region of layer 1 read.
    pub foreground_rect: Option<Area>,
    /// Mask layer.
    pub mask: Option<Surface>,
    /// Region of the mask read.
    pub mask_rect: Option<Area>,
    /// Destination surface.
    pub dst: Option<Surface>,
    /// Region of `dst` written.
    pub dst_rect: Option<Area>,
    /// Blend configuration.
    pub blend: Option<BlendConf>,
    /// Rotation of layer 1.
    pub foreground_rotate: RotateAngle,
    /// Rotation of layer 0.
    pub background_rotate: RotateAngle,
    /// Conversion of layer 1.
    pub foreground_csc: CscMode,
    /// Conversion of layer 0.
    pub background_csc: CscMode,
    /// Lookup table for `L8*` inputs.
    pub palette: Option<Palette>,
    /// Output dithering.
    pub dither: Dither,
}

/// One hardware operation, owned by a job until submission ends.
#[derive(Clone, Debug)]
pub struct Task {
    pub(crate) record: TaskRecord,
    kind: TaskKind,
    pub(crate) state: TaskState,
    pub(crate) fence_outcome: Option<FenceOutcome>,
}

impl Task {
    fn from_record(kind: TaskKind, record: TaskRecord) -> Self {
        Self {
            record,
            kind,
            state: TaskState::Built,
            fence_outcome: None,
        }
    }

    /// Build a solid fill.
    ///
    /// Layer 0 becomes a pseudo-source carrying the color, blended over the whole destination
    /// rectangle with no color-space conversion.
    pub fn fill(p: &FillParams) -> Self {
        let mut rec = TaskRecord::new();
        let param = &mut rec.param;

        param.l0_csc = CscMode::None.raw();
        param.layer0.solid_color = SolidColorRecord {
            fill_color: p.color.into(),
            enable: 1,
        };
        param.dst = SurfaceRecord::from(&p.dst);
        param.dst_rect = p.dst_rect.into();

        param.blend_conf.blend_cmd = BlendCmd::Alpha as u32;
        param.blend_conf.bgcolor.enable = 0;
        param.blend_conf.blend_layer[0].blend_area = p.dst_rect.into();

        Self::from_record(TaskKind::Fill, rec)
    }

    /// Build a copy of `src_rect` into `dst_rect`, scaling when the sizes differ.
    pub fn bitblit(p: &BitblitParams) -> Self {
        let mut rec = TaskRecord::new();
        let param = &mut rec.param;

        param.l0_csc = p.csc.raw();
        param.layer0 = SurfaceRecord::from(&p.src);
        param.l0_rect = p.src_rect.into();
        param.dst = SurfaceRecord::from(&p.dst);
        param.dst_rect = p.dst_rect.into();

        param.blend_conf.bgcolor.enable = 0;
        param.blend_conf.blend_layer[0].blend_area = p.dst_rect.into();

        Self::from_record(TaskKind::Bitblit, rec)
    }

    /// Build a blend of up to two layers (plus mask) into the destination.
    pub fn blend(p: &BlendParams) -> Self {
        fn surface(s: Option<&Surface>) -> SurfaceRecord {
            s.map(SurfaceRecord::from).unwrap_or_default()
        }
        fn area(a: Option<Area>) -> AreaRecord {
            a.map(AreaRecord::from).unwrap_or_default()
        }

        let mut rec = TaskRecord::new();
        let param = &mut rec.param;

        param.l0_csc = p.background_csc.raw();
        param.l1_csc = p.foreground_csc.raw();
        param.l0_rotate = p.background_rotate.raw();
        param.l1_rotate = p.foreground_rotate.raw();
        param.dither = p.dither.raw();

        param.layer0 = surface(p.background.as_ref());
        param.l0_rect = area(p.background_rect);
        param.layer1 = surface(p.foreground.as_ref());
        param.l1_rect = area(p.foreground_rect);
        param.mask = surface(p.mask.as_ref());
        param.mask_rect = area(p.mask_rect);
        param.dst = surface(p.dst.as_ref());
        param.dst_rect = area(p.dst_rect);

        if let Some(conf) = p.blend.as_ref() {
            param.blend_conf = BlendConfRecord::from(conf);
        }
        if let Some(palette) = p.palette.as_ref() {
            param.palette = PaletteRecord::from(palette);
        }

        Self::from_record(TaskKind::Blend, rec)
    }

    /// Operation family.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// How the completion fence resolved, once the task has been synchronized.
    pub fn fence_outcome(&self) -> Option<FenceOutcome> {
        self.fence_outcome
    }

    /// Borrow the record that will be written to the device.
    pub fn record(&self) -> &TaskRecord {
        &self.record
    }
}

#[cfg(test)]
#[path = "../../tests/unit/task/builder.rs"]
mod tests;
