mod chunks;
mod codecs;
mod crc;
mod decoder;
mod error;
mod filters;
mod gif;
mod image_data;
mod interlacing;
mod jpeg;
mod lzw;
mod pixel;
mod png;
mod raster;
mod scanlines;

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use log::info;
use tempfile::NamedTempFile;

pub use codecs::{decode, guess_format, ImageFormat};
pub use error::ConversionError;
pub use gif::GIF;
pub use jpeg::JPEG;
pub use pixel::Pixel;
pub use png::PNG;
pub use raster::{ColorModel, Raster, Rect};

/// Decodes the image at `input`, whatever its format, and writes it to `output` as a PNG.
///
/// The output is written to a temporary file next to `output` and renamed into place, so a
/// failed conversion never leaves a partial file behind.
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(), ConversionError> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let (raster, format) = read_image(input)?;
    info!(
        "loaded image: format={format}, width={}, height={}",
        raster.width(),
        raster.height()
    );
    write_png(&raster, output)?;
    info!("saved PNG to {}", output.display());
    Ok(())
}

fn read_image(path: &Path) -> Result<(Raster, ImageFormat), ConversionError> {
    let decode_error = |source: anyhow::Error| ConversionError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(|source| ConversionError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = vec![];
    file.read_to_end(&mut bytes)
        .map_err(|err| decode_error(anyhow::Error::new(err).context("failed to read input")))?;
    codecs::decode(&bytes).map_err(decode_error)
}

fn write_png(raster: &Raster, path: &Path) -> Result<(), ConversionError> {
    let create_error = |source: io::Error| ConversionError::Create {
        path: path.to_path_buf(),
        source,
    };
    let encode_error = |source: anyhow::Error| ConversionError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(directory).map_err(create_error)?;
    let png = PNG::encode(raster).map_err(encode_error)?;
    file.write_all(&png)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|err| encode_error(err.into()))?;
    #[cfg(unix)]
    {
        use std::{fs, os::unix::fs::PermissionsExt};
        // an existing output keeps its mode, a new one gets 0o644
        let permissions = fs::metadata(path)
            .map(|metadata| metadata.permissions())
            .unwrap_or_else(|_| fs::Permissions::from_mode(0o644));
        fs::set_permissions(file.path(), permissions).map_err(create_error)?;
    }
    file.persist(path).map_err(|err| create_error(err.error))?;
    Ok(())
}
