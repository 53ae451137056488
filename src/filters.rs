use anyhow::{anyhow, ensure};

/// Scanline filter types. `a` is the byte one pixel to the left, `b` the byte above and `c` the
/// byte above and to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}
impl Filter {
    const ALL: [Filter; 5] = [
        Filter::None,
        Filter::Sub,
        Filter::Up,
        Filter::Average,
        Filter::Paeth,
    ];

    fn predict(&self, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => 0,
            Filter::Sub => a,
            Filter::Up => b,
            Filter::Average => ((a as u16 + b as u16) / 2) as u8,
            Filter::Paeth => paeth(a, b, c),
        }
    }

    pub fn filter(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        x.wrapping_sub(self.predict(a, b, c))
    }

    pub fn reconstruct(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        x.wrapping_add(self.predict(a, b, c))
    }
}
impl TryFrom<u8> for Filter {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| anyhow!("unknown filter type {value}"))
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Applies `op` to every byte of `row`, left to right, so earlier results feed later ones.
fn apply(row: &mut [u8], previous: &[u8], bpp: usize, op: impl Fn(u8, u8, u8, u8) -> u8) {
    for i in 0..row.len() {
        let a = if i >= bpp { row[i - bpp] } else { 0 };
        let c = if i >= bpp { previous[i - bpp] } else { 0 };
        row[i] = op(row[i], a, previous[i], c);
    }
}

/// Undoes the filtering of `data`, a sequence of scanlines each prefixed with its filter type.
/// Returns the raw rows without their filter bytes.
pub(crate) fn reconstruct_scanlines(
    data: &[u8],
    row_size: usize,
    bpp: usize,
) -> anyhow::Result<Vec<u8>> {
    ensure!(
        data.len() % (row_size + 1) == 0,
        "image data does not divide into scanlines of {} bytes",
        row_size + 1
    );
    let mut rows = Vec::with_capacity(data.len() / (row_size + 1) * row_size);
    let mut previous = vec![0; row_size];
    for line in data.chunks_exact(row_size + 1) {
        let filter = Filter::try_from(line[0])?;
        let mut row = line[1..].to_vec();
        apply(&mut row, &previous, bpp, |x, a, b, c| {
            filter.reconstruct(x, a, b, c)
        });
        rows.extend_from_slice(&row);
        previous = row;
    }
    Ok(rows)
}

fn filter_row(filter: Filter, row: &[u8], previous: &[u8], bpp: usize) -> Vec<u8> {
    (0..row.len())
        .map(|i| {
            let a = if i >= bpp { row[i - bpp] } else { 0 };
            let c = if i >= bpp { previous[i - bpp] } else { 0 };
            filter.filter(row[i], a, previous[i], c)
        })
        .collect()
}

/// Sum of the filtered bytes read as signed values; smaller usually compresses better.
fn cost(filtered: &[u8]) -> u64 {
    filtered.iter().map(|&x| (x as i8).unsigned_abs() as u64).sum()
}

/// Filters raw rows of `row_size` bytes. With `adaptive` set every row gets the filter
/// with the lowest [`cost`], otherwise every row uses [`Filter::None`].
pub(crate) fn filter_scanlines(raw: &[u8], row_size: usize, bpp: usize, adaptive: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / row_size.max(1));
    let mut previous = vec![0; row_size];
    for row in raw.chunks_exact(row_size) {
        let (filter, filtered) = if adaptive {
            Filter::ALL
                .iter()
                .map(|&filter| (filter, filter_row(filter, row, &previous, bpp)))
                .min_by_key(|(_, filtered)| cost(filtered))
                .unwrap_or((Filter::None, row.to_vec()))
        } else {
            (Filter::None, row.to_vec())
        };
        out.push(filter as u8);
        out.extend(filtered);
        previous.copy_from_slice(row);
    }
    out
}
