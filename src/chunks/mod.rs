use anyhow::anyhow;
use nom::{
    bytes::complete::take,
    combinator::map_res,
    error::{Error, ErrorKind},
    number::complete::be_u32,
    IResult,
};

use crate::crc::chunk_crc;

pub(crate) mod idat;
pub(crate) mod iend;
pub(crate) mod ihdr;
pub(crate) mod plte;
pub(crate) mod trns;

#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug)]
pub(crate) enum Chunk<'a> {
    IHDR(ihdr::IHDRChunk),
    PLTE(plte::PLTEChunk),
    tRNS(trns::tRNSChunk),
    IDAT(idat::IDATChunk<'a>),
    IEND,
    Unknown(RawChunk<'a>),
}

pub(crate) fn iter_chunks(source: &[u8]) -> ChunkIter {
    ChunkIter {
        source,
        finished: false,
    }
}

pub(crate) struct ChunkIter<'a> {
    source: &'a [u8],
    finished: bool,
}
impl<'a> ChunkIter<'a> {
    /// Input not yet consumed by the iterator.
    pub(crate) fn remaining(&self) -> &'a [u8] {
        self.source
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = anyhow::Result<Chunk<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match parse_chunk(self.source) {
            Ok((rest, chunk)) => {
                self.source = rest;
                if matches!(chunk, Chunk::IEND) {
                    self.finished = true;
                }
                Some(Ok(chunk))
            }
            Err(e) => {
                self.finished = true;
                let kind = match e {
                    nom::Err::Error(e) | nom::Err::Failure(e) => e.code,
                    nom::Err::Incomplete(_) => ErrorKind::Eof,
                };
                Some(Err(match kind {
                    ErrorKind::Verify => anyhow!("chunk CRC mismatch"),
                    ErrorKind::MapRes => anyhow!("chunk contains an invalid field"),
                    _ => anyhow!("chunk is truncated or malformed"),
                }))
            }
        }
    }
}

fn parse_chunk(input: &[u8]) -> IResult<&[u8], Chunk<'_>> {
    let (rest, (header, chunk_data)) = valid_chunk(input)?;
    let chunk = match header {
        ihdr::IHDRChunk::HEADER => Chunk::IHDR(ihdr::IHDRChunk::from_bytes(chunk_data)?.1),
        plte::PLTEChunk::HEADER => Chunk::PLTE(plte::PLTEChunk::from_bytes(chunk_data)?.1),
        trns::tRNSChunk::HEADER => Chunk::tRNS(trns::tRNSChunk::from_bytes(chunk_data)?.1),
        idat::IDATChunk::HEADER => Chunk::IDAT(idat::IDATChunk::from_bytes(chunk_data)?.1),
        iend::IENDChunk::HEADER => Chunk::IEND,
        _ => Chunk::Unknown(RawChunk {
            chunk_type: header,
            _chunk_data: chunk_data,
        }),
    };
    Ok((rest, chunk))
}

#[derive(Debug)]
pub(crate) struct RawChunk<'a> {
    pub(crate) chunk_type: &'a [u8; 4],
    _chunk_data: &'a [u8],
}

fn chunk_type(input: &[u8]) -> IResult<&[u8], &[u8; 4]> {
    map_res(take(4usize), <&[u8; 4]>::try_from)(input)
}

/// Splits one length-prefixed chunk off the input and checks its CRC.
fn valid_chunk(input: &[u8]) -> IResult<&[u8], (&[u8; 4], &[u8])> {
    let (input, length) = be_u32(input)?;
    let (input, header) = chunk_type(input)?;
    let (input, data) = take(length as usize)(input)?;
    let (rest, crc) = be_u32(input)?;
    if crc != chunk_crc(header, data) {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify)));
    }
    Ok((rest, (header, data)))
}

/// Serializes a chunk: length, type, data and CRC.
pub(crate) fn write_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() + 12);
    bytes.extend((data.len() as u32).to_be_bytes());
    bytes.extend(chunk_type);
    bytes.extend(data);
    bytes.extend(chunk_crc(chunk_type, data).to_be_bytes());
    bytes
}

pub(crate) trait ParseableChunk<'a>: Sized {
    type Output: AsRef<[u8]>;
    const HEADER: &'static [u8; 4];

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self>;
    fn to_bytes(&self) -> Self::Output;
}
