use anyhow::{ensure, Context};
use miniz_oxide::{deflate::compress_to_vec_zlib, inflate::decompress_to_vec_zlib_with_limit};

use crate::{chunks::ihdr::IHDRChunk, scanlines::image_data_size};

const COMPRESSION_LEVEL: u8 = 9;

pub(crate) fn compress_data(filtered: &[u8]) -> Vec<u8> {
    compress_to_vec_zlib(filtered, COMPRESSION_LEVEL)
}

/// Inflates the concatenated IDAT payload, which must hold exactly the image data the
/// header describes.
pub(crate) fn decompress_data(
    compressed_data: &[u8],
    header: &IHDRChunk,
) -> anyhow::Result<Vec<u8>> {
    let expected = image_data_size(header)?;
    let data = decompress_to_vec_zlib_with_limit(compressed_data, expected)
        .context("Failed to decompress image data.")?;
    ensure!(
        data.len() == expected,
        "not enough image data: expected {expected} bytes, found {}",
        data.len()
    );
    Ok(data)
}
