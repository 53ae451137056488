use anyhow::{bail, ensure};
use nom::{
    combinator::map_res,
    number::complete::{be_u32, u8},
    sequence::tuple,
    IResult,
};

use super::{write_chunk, ParseableChunk};

/// Largest width or height a PNG may declare.
const MAX_DIMENSION: u32 = i32::MAX as u32;

#[derive(Debug, Clone)]
pub struct IHDRChunk {
    pub width: u32,
    pub height: u32,
    pub(crate) bit_depth: u8,
    pub(crate) color_type: ColorType,
    pub(crate) compression_method: u8,
    pub(crate) filter_method: u8,
    pub(crate) interlace_method: Interlacing,
}
impl IHDRChunk {
    pub(crate) fn new(width: u32, height: u32, bit_depth: u8, color_type: ColorType) -> Self {
        Self {
            width,
            height,
            bit_depth,
            color_type,
            compression_method: 0,
            filter_method: 0,
            interlace_method: Interlacing::None,
        }
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_DIMENSION).contains(&self.width) && (1..=MAX_DIMENSION).contains(&self.height),
            "invalid image dimensions {}x{}",
            self.width,
            self.height
        );
        let allowed: &[u8] = match self.color_type {
            ColorType::Greyscale => &[1, 2, 4, 8, 16],
            ColorType::IndexedColor => &[1, 2, 4, 8],
            ColorType::Truecolor
            | ColorType::GreyscaleWithAlpha
            | ColorType::TruecolorWithAlpha => &[8, 16],
        };
        if !allowed.contains(&self.bit_depth) {
            bail!(
                "bit depth {} is not allowed for {:?} images",
                self.bit_depth,
                self.color_type
            );
        }
        ensure!(
            self.compression_method == 0,
            "unknown compression method {}",
            self.compression_method
        );
        ensure!(
            self.filter_method == 0,
            "unknown filter method {}",
            self.filter_method
        );
        Ok(())
    }

    /// Distance in bytes between a byte and the matching byte of the previous pixel.
    pub(crate) fn filter_width(&self) -> usize {
        let channel_count = self.color_type.channel_count() as usize;
        let sample_width = usize::max(self.bit_depth as usize / 8, 1);
        channel_count * sample_width
    }

    /// Bits used by one pixel.
    pub(crate) fn pixel_width(&self) -> usize {
        self.color_type.channel_count() as usize * self.bit_depth as usize
    }

    /// Bytes used by a row of `width` pixels, without the filter type byte.
    pub(crate) fn row_size(&self, width: usize) -> usize {
        (width * self.pixel_width()).div_ceil(8)
    }
}
impl<'a> ParseableChunk<'a> for IHDRChunk {
    type Output = Vec<u8>;

    const HEADER: &'static [u8; 4] = b"IHDR";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        let (rest, (width, height, bit_depth, color_type, compression_method, filter_method)) =
            tuple((
                be_u32,
                be_u32,
                u8,
                map_res(u8, ColorType::try_from),
                u8,
                u8,
            ))(chunk_data)?;
        let (rest, interlace_method) = map_res(u8, Interlacing::try_from)(rest)?;
        Ok((
            rest,
            IHDRChunk {
                width,
                height,
                bit_depth,
                color_type,
                compression_method,
                filter_method,
                interlace_method,
            },
        ))
    }

    fn to_bytes(&self) -> Self::Output {
        let mut data = Vec::with_capacity(13);
        data.extend(self.width.to_be_bytes());
        data.extend(self.height.to_be_bytes());
        data.extend([
            self.bit_depth,
            self.color_type as u8,
            self.compression_method,
            self.filter_method,
            self.interlace_method as u8,
        ]);
        write_chunk(Self::HEADER, &data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorType {
    Greyscale = 0,
    Truecolor = 2,
    IndexedColor = 3,
    GreyscaleWithAlpha = 4,
    TruecolorWithAlpha = 6,
}
impl TryFrom<u8> for ColorType {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Greyscale),
            2 => Ok(Self::Truecolor),
            3 => Ok(Self::IndexedColor),
            4 => Ok(Self::GreyscaleWithAlpha),
            6 => Ok(Self::TruecolorWithAlpha),
            i => bail!("unknown color type {i}"),
        }
    }
}
impl ColorType {
    pub(crate) fn channel_count(&self) -> u8 {
        match self {
            Self::Greyscale => 1,
            Self::IndexedColor => 1,
            Self::GreyscaleWithAlpha => 2,
            Self::Truecolor => 3,
            Self::TruecolorWithAlpha => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interlacing {
    None = 0,
    Adam7 = 1,
}
impl TryFrom<u8> for Interlacing {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Adam7),
            i => bail!("unknown interlace method {i}"),
        }
    }
}
