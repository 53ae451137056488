use std::fmt;

use anyhow::{anyhow, Context};
use log::debug;
use nom::{bytes::complete::tag, IResult};

use crate::{
    decoder,
    gif::{self, GIF},
    jpeg::JPEG,
    png::PNG,
    raster::Raster,
};

/// Formats the converter can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Jpeg,
    Png,
}
impl ImageFormat {
    /// Short lowercase tag used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}
impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Probe {
    format: ImageFormat,
    magic: fn(&[u8]) -> IResult<&[u8], &[u8]>,
    decode: fn(&[u8]) -> anyhow::Result<Raster>,
}

fn jpeg_signature(input: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(b"\xff\xd8")(input)
}

/// Tried in order; the first probe whose magic matches decodes the input.
static PROBES: [Probe; 3] = [
    Probe {
        format: ImageFormat::Gif,
        magic: gif::parse_signature,
        decode: GIF::decode,
    },
    Probe {
        format: ImageFormat::Jpeg,
        magic: jpeg_signature,
        decode: JPEG::decode,
    },
    Probe {
        format: ImageFormat::Png,
        magic: decoder::parse_signature,
        decode: PNG::decode,
    },
];

fn probe(bytes: &[u8]) -> Option<&'static Probe> {
    PROBES.iter().find(|probe| (probe.magic)(bytes).is_ok())
}

/// Detects the format from the leading bytes of `bytes`.
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    probe(bytes).map(|probe| probe.format)
}

/// Decodes `bytes` with the first codec that recognizes them.
pub fn decode(bytes: &[u8]) -> anyhow::Result<(Raster, ImageFormat)> {
    let probe = probe(bytes).ok_or_else(|| anyhow!("unknown image format"))?;
    debug!("input looks like {}", probe.format);
    let raster = (probe.decode)(bytes).with_context(|| format!("invalid {} data", probe.format))?;
    Ok((raster, probe.format))
}
