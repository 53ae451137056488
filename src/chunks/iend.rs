use super::{write_chunk, ParseableChunk};

pub(crate) struct IENDChunk;
impl<'a> ParseableChunk<'a> for IENDChunk {
    type Output = Vec<u8>;

    const HEADER: &'static [u8; 4] = b"IEND";

    fn from_bytes(chunk_data: &'a [u8]) -> nom::IResult<&'a [u8], Self> {
        Ok((chunk_data, Self))
    }

    fn to_bytes(&self) -> Self::Output {
        write_chunk(Self::HEADER, &[])
    }
}
