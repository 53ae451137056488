use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use pngify::{convert, guess_format, ColorModel, ConversionError, ImageFormat, Pixel, Rect, PNG};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Converts a fixture into a fresh directory and decodes the result.
fn convert_fixture(name: &str) -> (TempDir, pngify::Raster) {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    convert(fixture(name), &output).unwrap();
    let bytes = fs::read(&output).unwrap();
    assert_eq!(guess_format(&bytes), Some(ImageFormat::Png));
    let raster = PNG::decode(&bytes).unwrap();
    (dir, raster)
}

fn palette() -> Vec<Pixel> {
    vec![
        Pixel::opaque(255, 0, 0),
        Pixel::opaque(0, 255, 0),
        Pixel::opaque(0, 0, 255),
        Pixel::opaque(255, 255, 255),
    ]
}

fn pngify() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pngify"))
}

#[test]
fn gif_becomes_png() {
    let (_dir, raster) = convert_fixture("palette_2x2.gif");
    assert_eq!(raster.bounds(), Rect::from_size(2, 2));
    assert_eq!(raster.color(), &ColorModel::Paletted(palette()));
    assert_eq!(raster.samples(), [0, 1, 2, 3]);
}

#[test]
fn png_survives_reencoding() {
    let (_dir, raster) = convert_fixture("palette_2x2.png");
    assert_eq!(raster.color(), &ColorModel::Paletted(palette()));
    assert_eq!(raster.samples(), [0, 1, 2, 3]);

    let expected = PNG::decode(&fs::read(fixture("rgb_adam7.png")).unwrap()).unwrap();
    let (_dir, converted) = convert_fixture("rgb_adam7.png");
    assert_eq!(converted, expected);
}

#[test]
fn jpeg_becomes_png() {
    let (_dir, raster) = convert_fixture("grey_8x8.jpg");
    assert_eq!((raster.width(), raster.height()), (8, 8));
    let pixel = raster.rgba(3, 5).unwrap();
    assert!(pixel.red.abs_diff(128) <= 2, "{pixel:?}");
}

#[test]
fn gif_offset_is_dropped_but_size_kept() {
    let (_dir, raster) = convert_fixture("offset_transparent.gif");
    assert_eq!(raster.bounds(), Rect::from_size(2, 2));
    assert_eq!(raster.rgba(0, 0), Some(Pixel::new(200, 210, 220, 0)));
    assert_eq!(raster.rgba(1, 1), Some(Pixel::opaque(10, 20, 30)));
}

#[test]
fn conversion_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    convert(fixture("noise_64x64.gif"), &first).unwrap();
    convert(fixture("noise_64x64.gif"), &second).unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());

    // converting into an existing file replaces it
    convert(fixture("palette_2x2.gif"), &first).unwrap();
    let raster = PNG::decode(&fs::read(&first).unwrap()).unwrap();
    assert_eq!(raster.bounds(), Rect::from_size(2, 2));
}

#[test]
fn input_is_never_modified() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.gif");
    fs::copy(fixture("interlaced.gif"), &input).unwrap();
    let before = fs::read(&input).unwrap();
    convert(&input, dir.path().join("out.png")).unwrap();
    assert_eq!(fs::read(&input).unwrap(), before);
}

#[test]
fn missing_input_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let err = convert("does/not/exist.gif", &output).unwrap_err();
    assert!(matches!(err, ConversionError::Open { .. }));
    insta::assert_snapshot!(err.to_string(), @"failed to open image 'does/not/exist.gif'");
    assert!(!output.exists());
}

#[test]
fn non_image_input_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.jpg");
    fs::write(&input, b"just some text").unwrap();
    let output = dir.path().join("out.png");
    let err = convert(&input, &output).unwrap_err();
    assert!(matches!(err, ConversionError::Decode { .. }));
    assert_eq!(err.path(), input);
    assert!(!output.exists());
}

#[test]
fn missing_output_directory_is_a_create_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no/such/dir/out.png");
    let err = convert(fixture("palette_2x2.png"), &output).unwrap_err();
    assert!(matches!(err, ConversionError::Create { .. }));
    assert_eq!(err.path(), output);
    assert!(!output.exists());
}

#[test]
fn encode_failure_keeps_the_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    // a 2x1 screen holding a frame with no columns, which decodes but cannot be encoded
    let input = dir.path().join("empty.gif");
    fs::write(
        &input,
        b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff\
          \x2c\x00\x00\x00\x00\x00\x00\x01\x00\x00\x02\x01\x2c\x00\x3b",
    )
    .unwrap();
    let output = dir.path().join("out.png");
    fs::write(&output, "old").unwrap();

    let err = convert(&input, &output).unwrap_err();
    assert!(matches!(err, ConversionError::Encode { .. }));
    assert_eq!(err.path(), output);
    assert_eq!(fs::read(&output).unwrap(), b"old");
    // no temp file left next to the output
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn binary_converts_with_flags() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("converted.png");
    let status = pngify()
        .arg("--input")
        .arg(fixture("palette_2x2.gif"))
        .arg("--output")
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    let raster = PNG::decode(&fs::read(&output).unwrap()).unwrap();
    assert_eq!(raster.samples(), [0, 1, 2, 3]);
}

#[test]
fn binary_uses_default_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(fixture("palette_2x2.gif"), dir.path().join("input.png")).unwrap();
    let status = pngify().current_dir(dir.path()).status().unwrap();
    assert!(status.success());
    assert!(dir.path().join("crop_optimized.png").exists());
}

#[test]
fn binary_treats_missing_input_as_success() {
    let dir = tempfile::tempdir().unwrap();
    let output = pngify()
        .current_dir(dir.path())
        .args(["--input", "nope.gif"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
    assert!(!dir.path().join("crop_optimized.png").exists());
}

#[test]
fn binary_fails_on_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.png"), b"\x89PNG\r\n\x1a\nbroken").unwrap();
    let output = pngify().current_dir(dir.path()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to decode image 'input.png'"), "{stderr}");
    assert!(!dir.path().join("crop_optimized.png").exists());
}
