use super::*;

#[test]
fn identical_frames_match() {
    let frame = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
    compare(&frame, &frame).unwrap();
}

#[test]
fn first_mismatching_word_is_reported() {
    let err = compare(&[0, 0, 0, 0, 1, 2, 3, 4], &[0, 0, 0, 0, 1, 2, 3, 5]).unwrap_err();
    assert!(err.to_string().contains("word 1"), "{err}");
}

#[test]
fn trailing_bytes_are_compared() {
    let err = compare(&[0, 0, 0, 0, 7], &[0, 0, 0, 0, 8]).unwrap_err();
    assert!(err.to_string().contains("word 1"), "{err}");
}

#[test]
fn length_mismatch_fails_both_ways() {
    let long = [0u8; 12];
    let short = [0u8; 8];
    let err = compare(&long, &short).unwrap_err();
    assert!(err.to_string().contains("12 bytes, reference is 8"), "{err}");
    let err = compare(&short, &long).unwrap_err();
    assert!(err.to_string().contains("8 bytes, reference is 12"), "{err}");
}

#[test]
fn fence_timeout_flag_is_hidden_but_accepted() {
    use clap::CommandFactory as _;

    let help = Cli::command().render_long_help().to_string();
    assert!(!help.contains("fence-timeout-ms"), "{help}");

    let cli = Cli::try_parse_from(["v2d", "--fence-timeout-ms", "150", "fill"]).unwrap();
    assert_eq!(cli.fence_timeout_ms, 150);
    let cli = Cli::try_parse_from(["v2d", "fill"]).unwrap();
    assert_eq!(cli.fence_timeout_ms, 3000);
}
