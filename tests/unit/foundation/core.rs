use super::*;

#[test]
fn area_emptiness() {
    assert!(Area::default().is_empty());
    assert!(Area::new(4, 4, 0, 10).is_empty());
    assert!(!Area::full(320, 240).is_empty());
}

#[test]
fn no_conversion_is_the_default_csc() {
    assert_eq!(CscMode::default(), CscMode::None);
    assert_eq!(CscMode::None.raw(), 22);
    assert_eq!(CscMode::RgbToRgb.raw(), 21);
}

#[test]
fn packed_surface_stride_follows_format() {
    let s = Surface::packed(7, 320, 240, ColorFormat::Rgba8888);
    assert_eq!(s.stride, 320 * 4);
    assert_eq!(s.full_area(), Area::new(0, 0, 320, 240));
    assert!(!s.is_compressed());

    let nv12 = Surface::packed(7, 320, 240, ColorFormat::Nv12);
    assert_eq!(nv12.stride, 320);
    assert_eq!(
        ColorFormat::Nv12.frame_len(u32::from(nv12.stride), 240),
        115_200
    );
}

#[test]
fn palette_rejects_oversized_tables() {
    assert!(Palette::new(vec![0; MAX_PALETTE_ENTRIES]).is_ok());
    let err = Palette::new(vec![0; MAX_PALETTE_ENTRIES + 1]).unwrap_err();
    assert!(err.to_string().contains("at most 256"));
}

#[test]
fn palette_size_is_checked_on_deserialize() {
    let ok: Palette = serde_json::from_str("[1, 2, 3]").unwrap();
    assert_eq!(ok.entries(), &[1, 2, 3]);

    let too_many = serde_json::to_string(&vec![0u32; 300]).unwrap();
    assert!(serde_json::from_str::<Palette>(&too_many).is_err());
}

#[test]
fn surface_json_uses_snake_case_formats() {
    let s: Surface = serde_json::from_str(
        r#"{ "fd": 3, "width": 320, "height": 240, "stride": 1280, "format": "rgba8888" }"#,
    )
    .unwrap();
    assert_eq!(s.format, ColorFormat::Rgba8888);
    assert_eq!(s.offset, 0);
    assert!(s.fbc_decoder.is_none());
}

#[test]
fn fbc_bbox_is_inclusive() {
    let b = FbcBbox::covering(320, 240);
    assert_eq!((b.right, b.bottom), (319, 239));
}
