use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// A failed conversion, tagged with the stage that failed and the path involved.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to open image '{}'", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Unknown format, corrupt data or a read failure.
    #[error("failed to decode image '{}'", .path.display())]
    Decode {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("failed to create output file '{}'", .path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to save PNG to '{}'", .path.display())]
    Encode {
        path: PathBuf,
        source: anyhow::Error,
    },
}
impl ConversionError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Open { path, .. }
            | Self::Decode { path, .. }
            | Self::Create { path, .. }
            | Self::Encode { path, .. } => path,
        }
    }
}
