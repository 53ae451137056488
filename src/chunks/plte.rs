use super::{write_chunk, ParseableChunk};
use nom::{
    bytes::complete::take,
    combinator::map,
    error::{Error, ErrorKind},
    multi::count,
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry(pub u8, pub u8, pub u8);

#[derive(Debug)]
pub struct PLTEChunk {
    colors: Vec<Entry>,
}
impl PLTEChunk {
    pub(crate) fn new(colors: Vec<Entry>) -> Self {
        Self { colors }
    }

    pub(crate) fn entries(&self) -> &[Entry] {
        &self.colors
    }
}
impl<'a> ParseableChunk<'a> for PLTEChunk {
    type Output = Vec<u8>;

    const HEADER: &'static [u8; 4] = b"PLTE";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        if chunk_data.is_empty() || chunk_data.len() % 3 != 0 || chunk_data.len() > 256 * 3 {
            return Err(nom::Err::Failure(Error::new(chunk_data, ErrorKind::LengthValue)));
        }
        let entry_count = chunk_data.len() / 3;
        let (rest, entries) = count(
            map(take(3usize), |i: &[u8]| Entry(i[0], i[1], i[2])),
            entry_count,
        )(chunk_data)?;
        Ok((rest, PLTEChunk { colors: entries }))
    }

    fn to_bytes(&self) -> Self::Output {
        let data = self
            .colors
            .iter()
            .flat_map(|Entry(r, g, b)| [*r, *g, *b])
            .collect::<Vec<_>>();
        write_chunk(Self::HEADER, &data)
    }
}
