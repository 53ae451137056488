use super::{write_chunk, ParseableChunk};
use nom::IResult;

#[derive(Debug)]
pub(crate) struct IDATChunk<'a> {
    pub(crate) data: &'a [u8],
}
impl<'a> ParseableChunk<'a> for IDATChunk<'a> {
    type Output = Vec<u8>;

    const HEADER: &'static [u8; 4] = b"IDAT";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        Ok((&chunk_data[chunk_data.len()..], IDATChunk { data: chunk_data }))
    }

    fn to_bytes(&self) -> Self::Output {
        write_chunk(Self::HEADER, self.data)
    }
}
