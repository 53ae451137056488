use super::{write_chunk, ParseableChunk};
use nom::IResult;

/// Transparency information; its layout depends on the image color type.
#[allow(non_camel_case_types)]
#[derive(Debug)]
pub struct tRNSChunk {
    inner: Vec<u8>,
}
impl tRNSChunk {
    pub(crate) fn new(inner: Vec<u8>) -> Self {
        Self { inner }
    }

    fn sample(&self, index: usize) -> Option<u16> {
        let bytes = self.inner.get(index * 2..index * 2 + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// The transparent grey level.
    pub(crate) fn as_greyscale(&self) -> Option<u16> {
        self.sample(0)
    }

    /// The transparent color.
    pub(crate) fn as_truecolor(&self) -> Option<(u16, u16, u16)> {
        Some((self.sample(0)?, self.sample(1)?, self.sample(2)?))
    }

    /// Alpha of a palette entry; entries past the end of the chunk are opaque.
    pub(crate) fn as_palette(&self, index: u8) -> u8 {
        *self.inner.get(index as usize).unwrap_or(&255)
    }
}
impl<'a> ParseableChunk<'a> for tRNSChunk {
    type Output = Vec<u8>;

    const HEADER: &'static [u8; 4] = b"tRNS";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        Ok((
            &chunk_data[chunk_data.len()..],
            tRNSChunk {
                inner: chunk_data.to_vec(),
            },
        ))
    }

    fn to_bytes(&self) -> Self::Output {
        write_chunk(Self::HEADER, &self.inner)
    }
}
