//! Errors returned by the codec
use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Everything that can go wrong while reading or writing a GIF stream.
///
/// Every operation returns its error directly; there is no "last error"
/// state kept anywhere.
#[derive(Error, Debug)]
pub enum GifError {
    /// The stream does not start with `GIF87a` or `GIF89a`.
    #[error("not a GIF file")]
    NotAGifFile,
    /// A structurally invalid block or LZW code.
    #[error("corrupt data: {0}")]
    CorruptData(&'static str),
    /// The stream ended in the middle of a record.
    #[error("unexpected end of data")]
    UnexpectedEndOfData,
    /// An API call was made out of the required order.
    #[error("invalid call sequence: {0}")]
    InvalidSequence(&'static str),
    /// A pixel index, table size or dimension does not fit.
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    /// More pixels were produced or supplied than the image holds.
    #[error("raster overflow: more pixels than width x height")]
    RasterOverflow,
    /// An image has neither a local nor a global color table.
    #[error("no color table applies to the image")]
    NoColorTable,
    /// Failure of the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(io::Error),
    /// A raster buffer could not be allocated.
    #[error("out of memory")]
    OutOfMemory,
}

impl From<io::Error> for GifError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => GifError::UnexpectedEndOfData,
            _ => GifError::Io(err),
        }
    }
}

impl From<TryReserveError> for GifError {
    fn from(_: TryReserveError) -> Self {
        GifError::OutOfMemory
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, GifError>;
