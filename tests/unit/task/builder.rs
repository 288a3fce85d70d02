use super::*;
use crate::foundation::core::{BlendLayerConf, ColorFormat, FbcBbox, FbcDecoder, FbcFormat};
use crate::task::abi::FENCE_ABSENT;

fn rgba_dst(fd: i32) -> Surface {
    Surface::packed(fd, 320, 240, ColorFormat::Rgba8888)
}

#[test]
fn fill_synthesizes_solid_color_layer() {
    let dst_rect = Area::new(32, 32, 210, 180);
    let task = Task::fill(&FillParams {
        dst: rgba_dst(11),
        dst_rect,
        color: FillColor::rgba8888(0x00ff_cc66),
    });
    let p = &task.record().param;

    assert_eq!(task.kind(), TaskKind::Fill);
    assert_eq!(task.state(), TaskState::Built);
    assert_eq!(p.layer0.solid_color.enable, 1);
    assert_eq!(p.layer0.solid_color.fill_color.color_value, 0x00ff_cc66);
    assert_eq!(
        p.layer0.solid_color.fill_color.format,
        ColorFormat::Rgba8888.raw()
    );
    assert_eq!(p.layer0.fd, 0);
    assert_eq!(p.l0_csc, CscMode::None.raw());
    assert_eq!(p.dst.fd, 11);
    assert_eq!(p.dst.stride, 1280);
    assert_eq!(p.dst_rect, AreaRecord::from(dst_rect));
    assert_eq!(p.blend_conf.blend_layer[0].blend_area, AreaRecord::from(dst_rect));
    assert_eq!(p.blend_conf.blend_layer[1], Default::default());
    assert_eq!(p.blend_conf.bgcolor.enable, 0);
}

#[test]
fn bitblit_copies_source_and_honors_csc() {
    let params = BitblitParams {
        dst: rgba_dst(4),
        dst_rect: Area::new(64, 32, 200, 180),
        src: rgba_dst(3),
        src_rect: Area::new(53, 37, 200, 180),
        csc: CscMode::None,
    };
    let task = Task::bitblit(&params);
    let p = &task.record().param;

    assert_eq!(task.kind(), TaskKind::Bitblit);
    assert_eq!(p.layer0.fd, 3);
    assert_eq!(p.l0_rect, AreaRecord::from(params.src_rect));
    assert_eq!(p.dst.fd, 4);
    assert_eq!(p.dst_rect, AreaRecord::from(params.dst_rect));
    assert_eq!(p.l0_csc, CscMode::None.raw());
    assert_eq!(p.layer0.solid_color.enable, 0);
    assert_eq!(
        p.blend_conf.blend_layer[0].blend_area,
        AreaRecord::from(params.dst_rect)
    );

    let converted = Task::bitblit(&BitblitParams {
        csc: CscMode::Bt601NarrowToRgb,
        ..params
    });
    assert_eq!(
        converted.record().param.l0_csc,
        CscMode::Bt601NarrowToRgb.raw()
    );
}

#[test]
fn blend_leaves_omitted_sections_zeroed() {
    let bg = Surface {
        fbc_decoder: Some(FbcDecoder {
            fd: 21,
            offset: 0,
            bbox: FbcBbox::covering(320, 240),
            format: FbcFormat::Nv12,
            mode: Default::default(),
            split: false,
        }),
        ..Surface::packed(0, 320, 240, ColorFormat::Nv12)
    };
    let dst = Surface::packed(22, 320, 240, ColorFormat::Rgb888);
    let task = Task::blend(&BlendParams {
        background: Some(bg),
        background_rect: Some(bg.full_area()),
        dst: Some(dst),
        dst_rect: Some(dst.full_area()),
        blend: Some(BlendConf::single_layer(dst.full_area())),
        background_rotate: RotateAngle::Mirror,
        background_csc: CscMode::Bt601NarrowToRgb,
        ..Default::default()
    });
    let p = &task.record().param;

    assert_eq!(task.kind(), TaskKind::Blend);
    assert_eq!(p.layer0.fbc_enable, 1);
    assert_eq!(p.layer0.fbc_dec.fd, 21);
    assert_eq!(p.l0_rotate, RotateAngle::Mirror.raw());
    assert_eq!(p.l0_csc, CscMode::Bt601NarrowToRgb.raw());
    assert_eq!(p.l1_csc, CscMode::None.raw());
    assert_eq!(p.layer1, SurfaceRecord::default());
    assert_eq!(p.l1_rect, AreaRecord::default());
    assert_eq!(p.mask, SurfaceRecord::default());
    assert_eq!(p.dst.fd, 22);
    assert_eq!(p.palette.len, 0);
    assert_eq!(p.dither, Dither::None.raw());
}

#[test]
fn blend_copies_palette_dither_and_layer_settings() {
    let fg = Surface::packed(30, 64, 64, ColorFormat::L8Rgba8888);
    let mut conf = BlendConf::single_layer(Area::full(64, 64));
    conf.layers[1] = BlendLayerConf {
        area: Area::new(8, 8, 32, 32),
        global_alpha: Some(200),
    };
    let task = Task::blend(&BlendParams {
        foreground: Some(fg),
        foreground_rect: Some(fg.full_area()),
        foreground_rotate: RotateAngle::Rot90,
        blend: Some(conf),
        palette: Some(Palette::new(vec![0xff00_00ff; 4]).unwrap()),
        dither: Dither::Dither4x4,
        ..Default::default()
    });
    let p = &task.record().param;

    assert_eq!(p.layer1.fd, 30);
    assert_eq!(p.l1_rotate, RotateAngle::Rot90.raw());
    assert_eq!(p.blend_conf.blend_layer[1].global_alpha, 200);
    assert_eq!(p.palette.len, 4);
    assert_eq!(p.dither, Dither::Dither4x4.raw());
    assert_eq!(p.layer0, SurfaceRecord::default());
}

#[test]
fn empty_blend_is_all_zero_except_defaults() {
    let task = Task::blend(&BlendParams::default());
    let p = &task.record().param;
    assert_eq!(p.dst, SurfaceRecord::default());
    assert_eq!(p.blend_conf, Default::default());
    assert_eq!(p.l0_csc, CscMode::None.raw());
}

#[test]
fn built_tasks_start_with_absent_fences() {
    let task = Task::blend(&BlendParams::default());
    assert_eq!(task.record().acquire_fence_fd, FENCE_ABSENT);
    assert_eq!(task.record().complete_fence_fd, FENCE_ABSENT);
    assert!(task.fence_outcome().is_none());
}

#[test]
fn task_kinds_are_distinct() {
    let kinds = [
        TaskKind::None,
        TaskKind::Bitblit,
        TaskKind::Fill,
        TaskKind::Blend,
    ];
    for (i, a) in kinds.iter().enumerate() {
        for b in &kinds[i + 1..] {
            assert_ne!(*a as u32, *b as u32);
        }
    }
}
