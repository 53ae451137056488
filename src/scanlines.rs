use anyhow::{ensure, Context};

use crate::{
    chunks::ihdr::{IHDRChunk, Interlacing},
    interlacing::{adam7, SubImage},
};

/// The reduced images stored in the image data: one for plain images, up to seven for Adam7.
pub(crate) fn sub_images(header: &IHDRChunk) -> Vec<SubImage> {
    let (width, height) = (header.width as usize, header.height as usize);
    match header.interlace_method {
        Interlacing::None => vec![SubImage::full(width, height)],
        Interlacing::Adam7 => adam7(width, height).collect(),
    }
}

fn pass_size(header: &IHDRChunk, sub_image: &SubImage) -> Option<usize> {
    (header.row_size(sub_image.width) + 1).checked_mul(sub_image.height)
}

/// Length of the inflated image data: every scanline of every pass, filter bytes included.
pub(crate) fn image_data_size(header: &IHDRChunk) -> anyhow::Result<usize> {
    sub_images(header)
        .iter()
        .try_fold(0usize, |total, sub_image| {
            total.checked_add(pass_size(header, sub_image)?)
        })
        .with_context(|| format!("a {}x{} image is too large", header.width, header.height))
}

pub(crate) struct Pass<'a> {
    pub(crate) sub_image: SubImage,
    pub(crate) scanlines: &'a [u8],
}

/// Splits inflated image data into the filtered scanlines of each pass.
pub(crate) fn split_passes<'a>(
    image_data: &'a [u8],
    header: &IHDRChunk,
) -> anyhow::Result<Vec<Pass<'a>>> {
    let mut rest = image_data;
    let mut passes = vec![];
    for sub_image in sub_images(header) {
        let size = pass_size(header, &sub_image).context("image is too large")?;
        ensure!(rest.len() >= size, "not enough image data");
        let (scanlines, tail) = rest.split_at(size);
        rest = tail;
        passes.push(Pass {
            sub_image,
            scanlines,
        });
    }
    ensure!(rest.is_empty(), "too much image data");
    Ok(passes)
}
