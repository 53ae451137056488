use anyhow::{bail, ensure};

/// GIF codes never grow past 12 bits.
const MAX_CODE_WIDTH: u8 = 12;
const TABLE_SIZE: usize = 1 << MAX_CODE_WIDTH;

/// Reads variable-width codes, least significant bit first.
struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}
impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn read(&mut self, width: u8) -> Option<u16> {
        let mut code = 0;
        for bit in 0..width {
            let byte = self.data.get(self.position / 8)?;
            code |= (((byte >> (self.position % 8)) & 1) as u16) << bit;
            self.position += 1;
        }
        Some(code)
    }
}

/// String table stored as prefix links, so every entry is one code plus one byte.
struct Table {
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    length: Vec<u16>,
}
impl Table {
    fn new(clear: u16) -> Self {
        let mut table = Self {
            prefix: vec![0; TABLE_SIZE],
            suffix: vec![0; TABLE_SIZE],
            length: vec![0; TABLE_SIZE],
        };
        for code in 0..clear as usize {
            table.suffix[code] = code as u8;
            table.length[code] = 1;
        }
        table
    }

    fn push(&mut self, code: u16, prefix: u16, suffix: u8) {
        let code = code as usize;
        self.prefix[code] = prefix;
        self.suffix[code] = suffix;
        self.length[code] = self.length[prefix as usize] + 1;
    }

    /// Appends the string for `code` to `out` and returns its first byte.
    fn emit(&self, code: u16, out: &mut Vec<u8>) -> u8 {
        let start = out.len();
        out.resize(start + self.length[code as usize] as usize, 0);
        let mut code = code as usize;
        for slot in out[start..].iter_mut().rev() {
            *slot = self.suffix[code];
            code = self.prefix[code] as usize;
        }
        out[start]
    }
}

/// Decodes a GIF LZW stream, stopping once `limit` bytes are produced or the end code is read.
///
/// Output past `limit` is dropped. The caller decides whether a short result is an error.
pub(crate) fn decode(data: &[u8], min_code_size: u8, limit: usize) -> anyhow::Result<Vec<u8>> {
    ensure!(
        (2..=8).contains(&min_code_size),
        "invalid LZW minimum code size {min_code_size}"
    );
    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut table = Table::new(clear);
    let mut reader = BitReader::new(data);
    let mut width = min_code_size + 1;
    let mut next = end + 1;
    let mut previous: Option<u16> = None;
    let mut out = Vec::new();

    while out.len() < limit {
        let Some(code) = reader.read(width) else {
            break;
        };
        if code == clear {
            width = min_code_size + 1;
            next = end + 1;
            previous = None;
            continue;
        }
        if code == end {
            break;
        }
        match previous {
            None => {
                ensure!(code < clear, "invalid LZW code {code} after a clear code");
                table.emit(code, &mut out);
            }
            Some(prefix) => {
                let first = if code < next {
                    table.emit(code, &mut out)
                } else if code == next {
                    let first = table.emit(prefix, &mut out);
                    out.push(first);
                    first
                } else {
                    bail!("invalid LZW code {code}, table has {next} entries");
                };
                if (next as usize) < TABLE_SIZE {
                    table.push(next, prefix, first);
                    next += 1;
                    if next == 1 << width && width < MAX_CODE_WIDTH {
                        width += 1;
                    }
                }
            }
        }
        previous = Some(code);
    }
    out.truncate(limit);
    Ok(out)
}

#[cfg(test)]
pub(crate) fn encode(data: &[u8], min_code_size: u8) -> Vec<u8> {
    use std::collections::HashMap;

    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut width = min_code_size + 1;
    let mut next = end + 1;
    let mut table = HashMap::new();
    let (mut bytes, mut buffer, mut bits) = (vec![], 0u32, 0u8);
    let mut write = |code: u16, width: u8| {
        buffer |= (code as u32) << bits;
        bits += width;
        while bits >= 8 {
            bytes.push(buffer as u8);
            buffer >>= 8;
            bits -= 8;
        }
    };

    write(clear, width);
    let mut current: Option<u16> = None;
    for &byte in data {
        let Some(code) = current else {
            current = Some(byte as u16);
            continue;
        };
        if let Some(&entry) = table.get(&(code, byte)) {
            current = Some(entry);
            continue;
        }
        write(code, width);
        if (next as usize) < TABLE_SIZE {
            table.insert((code, byte), next);
            next += 1;
            if next > 1 << width && width < MAX_CODE_WIDTH {
                width += 1;
            }
        }
        current = Some(byte as u16);
    }
    if let Some(code) = current {
        write(code, width);
        if next == 1 << width && width < MAX_CODE_WIDTH {
            width += 1;
        }
    }
    write(end, width);
    if bits > 0 {
        bytes.push(buffer as u8);
    }
    bytes
}
