use std::borrow::Cow;

use anyhow::ensure;
use log::debug;

use crate::{
    chunks::{
        idat::IDATChunk,
        iend::IENDChunk,
        ihdr::{ColorType, IHDRChunk},
        plte::{Entry, PLTEChunk},
        trns::tRNSChunk,
        ParseableChunk,
    },
    decoder::{ImageStream, PNGDecoder, SIGNATURE},
    filters::{filter_scanlines, reconstruct_scanlines},
    image_data::{compress_data, decompress_data},
    interlacing::SubImage,
    raster::{ColorModel, Raster, Rect},
    scanlines::{split_passes, Pass},
    Pixel,
};

/// Largest IDAT payload the encoder puts in a single chunk.
const MAX_IDAT_SIZE: usize = 1 << 20;

pub struct PNG;

impl PNG {
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Raster> {
        let decoder = PNGDecoder::new(bytes)?;
        let (decoder, header) = decoder.parse_ihdr()?;
        let stream = decoder.read_image_stream(&header)?;
        let mut color = color_model(&header, &stream);
        let image_data = decompress_data(&stream.compressed, &header)?;

        let bpp = color.bytes_per_pixel();
        let mut samples = vec![0; header.width as usize * header.height as usize * bpp];
        for Pass {
            sub_image,
            scanlines,
        } in split_passes(&image_data, &header)?
        {
            let SubImage {
                width,
                mut pixel_indices,
                ..
            } = sub_image;
            let row_size = header.row_size(width);
            let rows = reconstruct_scanlines(scanlines, row_size, header.filter_width())?;
            for row in rows.chunks_exact(row_size) {
                let pixels = unpack_row(&header, stream.transparency.as_ref(), row, width);
                for (pixel, index) in pixels.chunks_exact(bpp).zip(&mut pixel_indices) {
                    samples[index * bpp..(index + 1) * bpp].copy_from_slice(pixel);
                }
            }
        }
        if let ColorModel::Paletted(palette) = &mut color {
            // indices past a short PLTE read as opaque black
            let used = samples.iter().max().map_or(0, |&max| usize::from(max) + 1);
            if used > palette.len() {
                palette.resize(used, Pixel::opaque(0, 0, 0));
            }
        }
        debug!(
            "decoded {}x{} PNG: {:?} at {} bits, {:?}",
            header.width, header.height, header.color_type, header.bit_depth, header.interlace_method
        );
        Raster::new(Rect::from_size(header.width, header.height), color, samples)
    }

    /// Encodes the raster as a non-interlaced PNG. The output only depends on the raster.
    pub fn encode(raster: &Raster) -> anyhow::Result<Vec<u8>> {
        let (width, height) = (raster.width(), raster.height());
        ensure!(
            width > 0 && height > 0,
            "cannot encode an empty {width}x{height} image"
        );
        let (color_type, bit_depth, raw) = layout(raster);
        let header = IHDRChunk::new(width, height, bit_depth, color_type);
        header.validate()?;

        let mut bytes = SIGNATURE.to_vec();
        bytes.extend(header.to_bytes());
        if let ColorModel::Paletted(palette) = raster.color() {
            let entries = palette
                .iter()
                .map(|px| Entry(px.red, px.green, px.blue))
                .collect();
            bytes.extend(PLTEChunk::new(entries).to_bytes());
            if let Some(last) = palette.iter().rposition(|px| !px.is_opaque()) {
                let alphas = palette[..=last].iter().map(|px| px.alpha).collect();
                bytes.extend(tRNSChunk::new(alphas).to_bytes());
            }
        }

        let filtered = filter_scanlines(
            &raw,
            header.row_size(width as usize),
            header.filter_width(),
            color_type != ColorType::IndexedColor,
        );
        let compressed = compress_data(&filtered);
        for data in compressed.chunks(MAX_IDAT_SIZE) {
            bytes.extend(IDATChunk { data }.to_bytes());
        }
        bytes.extend(IENDChunk.to_bytes());
        debug!(
            "encoded {width}x{height} PNG: {color_type:?} at {bit_depth} bits, {} bytes",
            bytes.len()
        );
        Ok(bytes)
    }
}

fn color_model(header: &IHDRChunk, stream: &ImageStream) -> ColorModel {
    let wide = header.bit_depth == 16;
    let transparency = stream.transparency.as_ref();
    match header.color_type {
        ColorType::Greyscale => match (transparency.and_then(tRNSChunk::as_greyscale), wide) {
            (None, false) => ColorModel::Gray8,
            (None, true) => ColorModel::Gray16,
            (Some(_), false) => ColorModel::GrayAlpha8,
            (Some(_), true) => ColorModel::GrayAlpha16,
        },
        ColorType::Truecolor => match (transparency.and_then(tRNSChunk::as_truecolor), wide) {
            (None, false) => ColorModel::Rgb8,
            (None, true) => ColorModel::Rgb16,
            (Some(_), false) => ColorModel::Rgba8,
            (Some(_), true) => ColorModel::Rgba16,
        },
        ColorType::IndexedColor => {
            let entries = stream.palette.as_ref().map_or(&[][..], PLTEChunk::entries);
            ColorModel::Paletted(
                entries
                    .iter()
                    .enumerate()
                    .map(|(i, Entry(r, g, b))| {
                        let alpha = transparency.map_or(u8::MAX, |t| t.as_palette(i as u8));
                        Pixel::new(*r, *g, *b, alpha)
                    })
                    .collect(),
            )
        }
        ColorType::GreyscaleWithAlpha if wide => ColorModel::GrayAlpha16,
        ColorType::GreyscaleWithAlpha => ColorModel::GrayAlpha8,
        ColorType::TruecolorWithAlpha if wide => ColorModel::Rgba16,
        ColorType::TruecolorWithAlpha => ColorModel::Rgba8,
    }
}

/// Sample values of a row packed at `depth` bits (1, 2, 4 or 8), most significant bits first.
fn packed_samples(row: &[u8], depth: u8) -> impl Iterator<Item = u8> + '_ {
    let per_byte = 8 / depth;
    let mask = ((1u16 << depth) - 1) as u8;
    row.iter()
        .flat_map(move |&byte| (0..per_byte).map(move |i| (byte >> (8 - depth * (i + 1))) & mask))
}

/// Converts one unfiltered row into `width` pixels laid out as [`color_model`] describes.
fn unpack_row(
    header: &IHDRChunk,
    transparency: Option<&tRNSChunk>,
    row: &[u8],
    width: usize,
) -> Vec<u8> {
    let depth = header.bit_depth;
    match header.color_type {
        ColorType::Greyscale => {
            let key = transparency.and_then(tRNSChunk::as_greyscale);
            let mut out = Vec::with_capacity(width * 4);
            if depth == 16 {
                for sample in row.chunks_exact(2) {
                    out.extend_from_slice(sample);
                    if let Some(key) = key {
                        let alpha = if u16::from_be_bytes([sample[0], sample[1]]) == key {
                            0
                        } else {
                            u8::MAX
                        };
                        out.extend([alpha, alpha]);
                    }
                }
            } else {
                let max = (1u16 << depth) - 1;
                for value in packed_samples(row, depth).take(width) {
                    out.push((value as u16 * 255 / max) as u8);
                    if let Some(key) = key {
                        out.push(if value as u16 == key { 0 } else { u8::MAX });
                    }
                }
            }
            out
        }
        ColorType::Truecolor => match transparency.and_then(tRNSChunk::as_truecolor) {
            None => row.to_vec(),
            Some(key) => {
                let size = if depth == 16 { 2 } else { 1 };
                let mut out = Vec::with_capacity(width * 4 * size);
                for px in row.chunks_exact(3 * size) {
                    let channel = |i: usize| {
                        if size == 2 {
                            u16::from_be_bytes([px[2 * i], px[2 * i + 1]])
                        } else {
                            px[i] as u16
                        }
                    };
                    let alpha = if (channel(0), channel(1), channel(2)) == key {
                        0
                    } else {
                        u8::MAX
                    };
                    out.extend_from_slice(px);
                    out.extend(std::iter::repeat(alpha).take(size));
                }
                out
            }
        },
        ColorType::IndexedColor => packed_samples(row, depth).take(width).collect(),
        ColorType::GreyscaleWithAlpha | ColorType::TruecolorWithAlpha => row.to_vec(),
    }
}

/// Picks the PNG color type and bit depth for a raster and returns its rows in that layout.
fn layout(raster: &Raster) -> (ColorType, u8, Cow<'_, [u8]>) {
    let samples = raster.samples();
    let borrowed = Cow::Borrowed(samples);
    match raster.color() {
        ColorModel::Gray8 => (ColorType::Greyscale, 8, borrowed),
        ColorModel::Gray16 => (ColorType::Greyscale, 16, borrowed),
        ColorModel::GrayAlpha8 if is_opaque(samples, 2, 1) => {
            (ColorType::Greyscale, 8, strip_alpha(samples, 2, 1))
        }
        ColorModel::GrayAlpha8 => (ColorType::GreyscaleWithAlpha, 8, borrowed),
        ColorModel::GrayAlpha16 if is_opaque(samples, 4, 2) => {
            (ColorType::Greyscale, 16, strip_alpha(samples, 4, 2))
        }
        ColorModel::GrayAlpha16 => (ColorType::GreyscaleWithAlpha, 16, borrowed),
        ColorModel::Rgb8 => (ColorType::Truecolor, 8, borrowed),
        ColorModel::Rgb16 => (ColorType::Truecolor, 16, borrowed),
        ColorModel::Rgba8 if is_opaque(samples, 4, 1) => {
            (ColorType::Truecolor, 8, strip_alpha(samples, 4, 1))
        }
        ColorModel::Rgba8 => (ColorType::TruecolorWithAlpha, 8, borrowed),
        ColorModel::Rgba16 if is_opaque(samples, 8, 2) => {
            (ColorType::Truecolor, 16, strip_alpha(samples, 8, 2))
        }
        ColorModel::Rgba16 => (ColorType::TruecolorWithAlpha, 16, borrowed),
        ColorModel::Paletted(palette) => {
            let depth = match palette.len() {
                0..=2 => 1,
                3..=4 => 2,
                5..=16 => 4,
                _ => 8,
            };
            let packed = pack_indices(samples, raster.width() as usize, depth);
            (ColorType::IndexedColor, depth, packed)
        }
    }
}

fn is_opaque(samples: &[u8], bpp: usize, alpha_size: usize) -> bool {
    samples
        .chunks_exact(bpp)
        .all(|px| px[bpp - alpha_size..].iter().all(|&b| b == u8::MAX))
}

fn strip_alpha(samples: &[u8], bpp: usize, alpha_size: usize) -> Cow<'static, [u8]> {
    samples
        .chunks_exact(bpp)
        .flat_map(|px| &px[..bpp - alpha_size])
        .copied()
        .collect::<Vec<_>>()
        .into()
}

fn pack_indices(samples: &[u8], width: usize, depth: u8) -> Cow<'_, [u8]> {
    if depth == 8 {
        return Cow::Borrowed(samples);
    }
    let per_byte = (8 / depth) as usize;
    samples
        .chunks_exact(width)
        .flat_map(|row| {
            row.chunks(per_byte).map(|group| {
                group.iter().enumerate().fold(0u8, |byte, (i, &index)| {
                    byte | index << (8 - depth as usize * (i + 1))
                })
            })
        })
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::PNG;
    use crate::{
        chunks::write_chunk,
        raster::{ColorModel, Raster, Rect},
        Pixel,
    };

    fn rgb_pixel(x: u8, y: u8) -> [u8; 3] {
        [x * 40 + 7, y * 50 + 3, (x + y) * 15 + 100]
    }

    fn contains_chunk(png: &[u8], chunk_type: &[u8; 4]) -> bool {
        png.windows(4).any(|window| window == chunk_type)
    }

    #[test]
    fn decodes_indexed_image() {
        let raster = PNG::decode(include_bytes!("../tests/fixtures/palette_2x2.png")).unwrap();
        assert_eq!(
            raster.color(),
            &ColorModel::Paletted(vec![
                Pixel::opaque(255, 0, 0),
                Pixel::opaque(0, 255, 0),
                Pixel::opaque(0, 0, 255),
                Pixel::opaque(255, 255, 255),
            ])
        );
        assert_eq!(raster.samples(), [0, 1, 2, 3]);
    }

    #[test]
    fn short_palettes_are_padded_with_black() {
        let mut png = include_bytes!("../tests/fixtures/palette_2x2.png").to_vec();
        // swap the four color PLTE, which follows the signature and IHDR, for a two color one
        assert_eq!(&png[37..41], b"PLTE");
        png.splice(33..57, write_chunk(b"PLTE", &[255, 0, 0, 0, 255, 0]));
        let raster = PNG::decode(&png).unwrap();
        assert_eq!(
            raster.color(),
            &ColorModel::Paletted(vec![
                Pixel::opaque(255, 0, 0),
                Pixel::opaque(0, 255, 0),
                Pixel::opaque(0, 0, 0),
                Pixel::opaque(0, 0, 0),
            ])
        );
        assert_eq!(raster.samples(), [0, 1, 2, 3]);
    }

    #[test]
    fn decodes_every_filter_type() {
        let raster = PNG::decode(include_bytes!("../tests/fixtures/rgb_filters.png")).unwrap();
        assert_eq!(raster.color(), &ColorModel::Rgb8);
        let expected = (0..5)
            .flat_map(|y| (0..5).flat_map(move |x| rgb_pixel(x, y)))
            .collect::<Vec<_>>();
        assert_eq!(raster.samples(), expected);
    }

    #[test]
    fn adam7_matches_the_plain_image() {
        let plain = PNG::decode(include_bytes!("../tests/fixtures/rgb_filters.png")).unwrap();
        let interlaced = PNG::decode(include_bytes!("../tests/fixtures/rgb_adam7.png")).unwrap();
        assert_eq!(plain, interlaced);
    }

    #[test]
    fn grey_transparency_becomes_alpha() {
        let raster = PNG::decode(include_bytes!("../tests/fixtures/gray16_trns.png")).unwrap();
        assert_eq!(raster.color(), &ColorModel::GrayAlpha16);
        assert_eq!(
            raster.samples(),
            [0, 0, 0xff, 0xff, 0x12, 0x34, 0, 0, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn low_bit_depth_grey_is_scaled() {
        let raster = PNG::decode(include_bytes!("../tests/fixtures/gray2.png")).unwrap();
        assert_eq!(raster.color(), &ColorModel::Gray8);
        assert_eq!(
            raster.samples(),
            [0, 85, 170, 255, 0, 255, 170, 85, 0, 255]
        );
    }

    #[test]
    fn rejects_corrupted_data() {
        let mut data = include_bytes!("../tests/fixtures/rgb_filters.png").to_vec();
        data[40] ^= 0x55;
        assert!(PNG::decode(&data).is_err());

        let data = include_bytes!("../tests/fixtures/rgb_filters.png");
        assert!(PNG::decode(&data[..data.len() - 20]).is_err());
    }

    #[test]
    fn opaque_alpha_is_dropped() {
        let raster = Raster::new(
            Rect::from_size(2, 1),
            ColorModel::Rgba8,
            vec![1, 2, 3, 255, 4, 5, 6, 255],
        )
        .unwrap();
        let png = PNG::encode(&raster).unwrap();
        assert_eq!(png[25], 2, "color type should be truecolor");

        let decoded = PNG::decode(&png).unwrap();
        assert_eq!(decoded.color(), &ColorModel::Rgb8);
        assert_eq!(decoded.samples(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn translucent_pixels_keep_alpha() {
        let raster = Raster::new(
            Rect::from_size(1, 2),
            ColorModel::GrayAlpha8,
            vec![10, 255, 20, 128],
        )
        .unwrap();
        let decoded = PNG::decode(&PNG::encode(&raster).unwrap()).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn small_palettes_use_packed_indices() {
        let palette = vec![Pixel::opaque(0, 0, 0), Pixel::opaque(255, 255, 255)];
        let raster = Raster::new(
            Rect::from_size(11, 2),
            ColorModel::Paletted(palette),
            (0..22).map(|i| (i % 3 == 0) as u8).collect(),
        )
        .unwrap();
        let png = PNG::encode(&raster).unwrap();
        assert_eq!(png[24], 1, "bit depth");
        assert_eq!(png[25], 3, "color type should be indexed");
        assert!(!contains_chunk(&png, b"tRNS"));

        assert_eq!(PNG::decode(&png).unwrap(), raster);
    }

    #[test]
    fn translucent_palette_entries_get_a_trns_chunk() {
        let palette = vec![
            Pixel::new(1, 2, 3, 0),
            Pixel::new(4, 5, 6, 77),
            Pixel::opaque(7, 8, 9),
        ];
        let raster = Raster::new(
            Rect::from_size(3, 1),
            ColorModel::Paletted(palette),
            vec![2, 1, 0],
        )
        .unwrap();
        let png = PNG::encode(&raster).unwrap();
        assert_eq!(png[24], 2, "bit depth");
        assert!(contains_chunk(&png, b"tRNS"));

        assert_eq!(PNG::decode(&png).unwrap(), raster);
    }

    #[test]
    fn sixteen_bit_samples_survive_encoding() {
        let raster = Raster::new(
            Rect::from_size(2, 1),
            ColorModel::Rgb16,
            vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xff, 0xfe, 0xfd, 0xfc, 0xfb, 0xfa],
        )
        .unwrap();
        let png = PNG::encode(&raster).unwrap();
        assert_eq!(png[24], 16, "bit depth");
        assert_eq!(PNG::decode(&png).unwrap(), raster);
    }

    #[test]
    fn offset_bounds_encode_by_size() {
        let raster = Raster::new(
            Rect::new(5, 7, 7, 8),
            ColorModel::Gray8,
            vec![100, 200],
        )
        .unwrap();
        let decoded = PNG::decode(&PNG::encode(&raster).unwrap()).unwrap();
        assert_eq!(decoded.bounds(), Rect::from_size(2, 1));
        assert_eq!(decoded.samples(), raster.samples());
    }

    #[test]
    fn refuses_empty_images() {
        let raster = Raster::new(Rect::from_size(0, 3), ColorModel::Rgb8, vec![]).unwrap();
        let err = PNG::encode(&raster).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"cannot encode an empty 0x3 image");
    }
}
