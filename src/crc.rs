const CRC_TABLE: [u32; 256] = {
    let mut table = [0; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut i = 0;
        while i < 8 {
            if c & 1 != 0 {
                c = 0xedb88320 ^ (c >> 1);
            } else {
                c >>= 1;
            }
            i += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
};

fn update_crc(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, &b| {
        CRC_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8)
    })
}

/// CRC of a chunk, covering the chunk type and the chunk data but not the length.
pub(crate) fn chunk_crc(chunk_type: &[u8; 4], data: &[u8]) -> u32 {
    update_crc(update_crc(0xffffffff, chunk_type), data) ^ 0xffffffff
}
