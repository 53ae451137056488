use anyhow::{anyhow, bail, Context};
use log::debug;
use zune_jpeg::JpegDecoder;

use crate::raster::{ColorModel, Raster, Rect};

pub struct JPEG;

impl JPEG {
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Raster> {
        let mut decoder = JpegDecoder::new(bytes);
        let pixels = decoder
            .decode()
            .map_err(|err| anyhow!("JPEG decoder failed: {err:?}"))?;
        let info = decoder
            .info()
            .context("JPEG decoder returned no image header")?;
        let (width, height) = (u32::from(info.width), u32::from(info.height));
        let area = width as usize * height as usize;
        if area == 0 || pixels.len() % area != 0 {
            bail!(
                "JPEG decoder produced {} bytes for a {width}x{height} image",
                pixels.len()
            );
        }
        let color = match pixels.len() / area {
            1 => ColorModel::Gray8,
            3 => ColorModel::Rgb8,
            4 => ColorModel::Rgba8,
            channels => bail!("unsupported JPEG output with {channels} channels"),
        };
        debug!("decoded {width}x{height} JPEG as {color:?}");
        Raster::new(Rect::from_size(width, height), color, pixels)
    }
}
