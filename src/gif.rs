use anyhow::{anyhow, bail, ensure, Context};
use log::{debug, trace};
use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    combinator::{cond, map, verify},
    multi::{length_data, many0},
    number::complete::{le_u16, u8},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::{
    lzw,
    raster::{ColorModel, Raster, Rect},
    Pixel,
};

/// Rows of an interlaced frame are stored in four passes: `(first row, step)`.
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

pub struct GIF;

impl GIF {
    /// Decodes the first frame. The frame rectangle becomes the raster bounds.
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Raster> {
        let (input, _) =
            parse_signature(bytes).map_err(|_| anyhow!("input doesn't start with a GIF signature"))?;
        let (mut input, screen) = screen_descriptor(input)
            .map_err(|_| anyhow!("truncated logical screen descriptor"))?;
        let mut transparent = None;
        loop {
            let (rest, block) =
                block(input).map_err(|_| anyhow!("truncated or malformed GIF block"))?;
            input = rest;
            match block {
                Block::GraphicControl(index) => transparent = index,
                Block::Extension(label) => trace!("skipping extension {label:#04x}"),
                Block::Image(frame) => return decode_frame(screen, frame, transparent),
                Block::Trailer => bail!("GIF ends before any image"),
            }
        }
    }
}

pub(crate) fn parse_signature(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((tag(b"GIF87a"), tag(b"GIF89a")))(input)
}

struct ScreenDescriptor {
    width: u16,
    height: u16,
    global_table: Option<Vec<Pixel>>,
}

struct Frame<'a> {
    bounds: Rect,
    interlaced: bool,
    local_table: Option<Vec<Pixel>>,
    min_code_size: u8,
    data: Vec<&'a [u8]>,
}

enum Block<'a> {
    /// Transparent color index, if the extension sets one.
    GraphicControl(Option<u8>),
    Extension(u8),
    Image(Frame<'a>),
    Trailer,
}

fn screen_descriptor(input: &[u8]) -> IResult<&[u8], ScreenDescriptor> {
    let (input, (width, height, flags, _background, _aspect_ratio)) =
        tuple((le_u16, le_u16, u8, u8, u8))(input)?;
    let (input, global_table) = color_table(flags)(input)?;
    Ok((
        input,
        ScreenDescriptor {
            width,
            height,
            global_table,
        },
    ))
}

/// A color table, present when the high bit of `flags` is set, with `2 << (flags & 7)` entries.
fn color_table(flags: u8) -> impl Fn(&[u8]) -> IResult<&[u8], Option<Vec<Pixel>>> {
    move |input| {
        let size = 2usize << (flags & 0x07);
        cond(
            flags & 0x80 != 0,
            map(take(size * 3), |table: &[u8]| {
                table
                    .chunks_exact(3)
                    .map(|rgb| Pixel::opaque(rgb[0], rgb[1], rgb[2]))
                    .collect()
            }),
        )(input)
    }
}

/// Length-prefixed data blocks up to the zero-length terminator.
fn sub_blocks(input: &[u8]) -> IResult<&[u8], Vec<&[u8]>> {
    terminated(
        many0(length_data(verify(u8, |&len: &u8| len != 0))),
        tag(b"\x00"),
    )(input)
}

fn graphic_control(input: &[u8]) -> IResult<&[u8], Option<u8>> {
    map(sub_blocks, |blocks| {
        blocks
            .first()
            .filter(|block| block.len() >= 4 && block[0] & 0x01 != 0)
            .map(|block| block[3])
    })(input)
}

fn frame(input: &[u8]) -> IResult<&[u8], Frame> {
    let (input, (left, top, width, height, flags)) =
        tuple((le_u16, le_u16, le_u16, le_u16, u8))(input)?;
    let (input, local_table) = color_table(flags)(input)?;
    let (input, (min_code_size, data)) = pair(u8, sub_blocks)(input)?;
    let (left, top) = (u32::from(left), u32::from(top));
    Ok((
        input,
        Frame {
            bounds: Rect::new(left, top, left + u32::from(width), top + u32::from(height)),
            interlaced: flags & 0x40 != 0,
            local_table,
            min_code_size,
            data,
        },
    ))
}

fn block(input: &[u8]) -> IResult<&[u8], Block> {
    alt((
        map(preceded(tag(b"\x21\xf9"), graphic_control), Block::GraphicControl),
        map(preceded(tag(b"\x21"), pair(u8, sub_blocks)), |(label, _)| {
            Block::Extension(label)
        }),
        map(preceded(tag(b"\x2c"), frame), Block::Image),
        map(tag(b"\x3b"), |_| Block::Trailer),
    ))(input)
}

fn decode_frame(
    screen: ScreenDescriptor,
    frame: Frame,
    transparent: Option<u8>,
) -> anyhow::Result<Raster> {
    let bounds = frame.bounds;
    let screen_bounds = Rect::from_size(screen.width.into(), screen.height.into());
    ensure!(
        bounds.is_within(&screen_bounds),
        "frame {}x{} at ({}, {}) does not fit the {}x{} screen",
        bounds.width(),
        bounds.height(),
        bounds.min_x,
        bounds.min_y,
        screen.width,
        screen.height
    );
    let mut palette = frame
        .local_table
        .or(screen.global_table)
        .context("GIF has no color table")?;
    if let Some(index) = transparent.map(usize::from) {
        // a transparent index past the table grows it with transparent black
        if index >= palette.len() {
            palette.resize(index + 1, Pixel::default());
        }
        palette[index].alpha = 0;
    }

    let (width, height) = (bounds.width() as usize, bounds.height() as usize);
    let pixel_count = width * height;
    // data left over once the frame is full is ignored
    let mut indices = lzw::decode(&frame.data.concat(), frame.min_code_size, pixel_count)
        .context("failed to decompress image data")?;
    ensure!(
        indices.len() == pixel_count,
        "not enough image data: expected {pixel_count} pixels, found {}",
        indices.len()
    );
    if frame.interlaced && width > 0 {
        indices = deinterlace(&indices, width, height);
    }
    debug!(
        "decoded {width}x{height} GIF frame at ({}, {}), {} colors, interlaced: {}",
        bounds.min_x,
        bounds.min_y,
        palette.len(),
        frame.interlaced
    );
    Raster::new(bounds, ColorModel::Paletted(palette), indices)
}

/// Moves the rows of an interlaced frame back into top-to-bottom order.
fn deinterlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0; indices.len()];
    let rows = INTERLACE_PASSES
        .iter()
        .flat_map(|&(first, step)| (first..height).step_by(step));
    for (line, y) in indices.chunks_exact(width).zip(rows) {
        out[y * width..(y + 1) * width].copy_from_slice(line);
    }
    out
}
