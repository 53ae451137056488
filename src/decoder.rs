use std::marker::PhantomData;

use anyhow::{anyhow, bail, ensure, Context};
use log::trace;
use nom::{bytes::complete::tag, IResult};

use crate::chunks::{
    ihdr::{ColorType, IHDRChunk},
    iter_chunks,
    plte::PLTEChunk,
    trns::tRNSChunk,
    Chunk,
};

pub(crate) const SIGNATURE: &[u8; 8] = b"\x89PNG\x0d\x0a\x1a\x0a";

pub(crate) struct PNGDecoder<'a, State>(&'a [u8], PhantomData<State>);

pub(crate) struct Start;
pub(crate) struct Chunks;

/// Everything after the header that is needed to rebuild the pixels.
pub(crate) struct ImageStream {
    pub(crate) palette: Option<PLTEChunk>,
    pub(crate) transparency: Option<tRNSChunk>,
    pub(crate) compressed: Vec<u8>,
}

impl<'a> PNGDecoder<'a, Start> {
    pub fn new(data: &'a [u8]) -> anyhow::Result<Self> {
        let (rest, _) = parse_signature(data)
            .map_err(|_| anyhow!("input doesn't start with expected signature"))?;
        Ok(Self(rest, PhantomData))
    }

    pub fn parse_ihdr(self) -> anyhow::Result<(PNGDecoder<'a, Chunks>, IHDRChunk)> {
        let mut chunks = iter_chunks(self.0);
        match chunks.next() {
            Some(Ok(Chunk::IHDR(ihdr))) => {
                ihdr.validate()?;
                trace!("IHDR: {ihdr:?}");
                Ok((PNGDecoder(chunks.remaining(), PhantomData), ihdr))
            }
            Some(Err(err)) => Err(err.context("failed to read IHDR")),
            _ => bail!("first chunk is not IHDR"),
        }
    }
}

impl<'a> PNGDecoder<'a, Chunks> {
    /// Reads the remaining chunks up to IEND, collecting palette, transparency and the
    /// concatenated IDAT payload.
    pub fn read_image_stream(self, header: &IHDRChunk) -> anyhow::Result<ImageStream> {
        let mut stream = ImageStream {
            palette: None,
            transparency: None,
            compressed: vec![],
        };
        let mut seen_idat = false;
        for chunk in iter_chunks(self.0) {
            match chunk.context("failed to read chunk")? {
                Chunk::IHDR(_) => bail!("duplicate IHDR chunk"),
                Chunk::PLTE(palette) => {
                    ensure!(!seen_idat, "PLTE chunk after image data");
                    stream.palette = Some(palette);
                }
                Chunk::tRNS(transparency) => {
                    ensure!(!seen_idat, "tRNS chunk after image data");
                    stream.transparency = Some(transparency);
                }
                Chunk::IDAT(idat) => {
                    seen_idat = true;
                    stream.compressed.extend_from_slice(idat.data);
                }
                Chunk::IEND => {
                    ensure!(seen_idat, "no IDAT chunk before IEND");
                    if header.color_type == ColorType::IndexedColor {
                        ensure!(stream.palette.is_some(), "indexed image without a PLTE chunk");
                    }
                    return Ok(stream);
                }
                Chunk::Unknown(raw) => {
                    trace!("skipping {} chunk", String::from_utf8_lossy(raw.chunk_type));
                }
            }
        }
        bail!("missing IEND chunk")
    }
}

pub(crate) fn parse_signature(input: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(SIGNATURE)(input)
}
