//! # GIF en- and decoding library
//!
//! Reads and writes GIF87a and GIF89a files at three levels:
//!
//! * [`Decoder`] is a push-based state machine that turns bytes into
//!   decoding events.
//! * [`Reader`] and [`Encoder`] work record by record on `Read` and
//!   `Write` streams.
//! * [`GifFile`] holds a complete file in memory.
//!
//! ```
//! use gifkit::{Color, ColorTable, GifFile, Image, ImageDescriptor, ScreenDescriptor};
//!
//! let mut screen = ScreenDescriptor::new(2, 2);
//! screen.global_color_table = Some(ColorTable::new(vec![Color::new(0, 0, 0), Color::new(255, 255, 255)])?);
//! let mut file = GifFile::new(screen);
//! file.push_image(Image::new(ImageDescriptor::new(0, 0, 2, 2), vec![0, 1, 1, 0])?);
//!
//! let data = file.spew(Vec::new())?;
//! assert_eq!(GifFile::slurp(&*data)?, file);
//! # Ok::<(), gifkit::GifError>(())
//! ```

#[macro_use]
extern crate enum_primitive;

mod error;
mod interlace;
pub mod lzw;
mod model;
mod reader;
mod traits;
mod types;
mod writer;

pub use crate::error::{GifError, Result};
pub use crate::interlace::{deinterlace, interlace, InterlaceIterator};
pub use crate::model::{GifFile, Image};
pub use crate::traits::{HasParameters, Parameter};
pub use crate::types::{
    Block, Color, ColorTable, DisposalMethod, Extension, ExtensionBlock, GraphicsControl,
    ImageDescriptor, RowOrder, ScreenDescriptor, Version,
};

pub use crate::reader::{Decoded, Decoder, Reader};
/// Decoder configuration parameters
pub use crate::reader::EndCode;
pub use crate::writer::{Encoder, ImageWriter};

#[cfg(test)]
#[test]
fn round_trip() {
    use std::fs;

    let mut count = 0;
    for path in glob::glob("tests/samples/*.gif").unwrap() {
        let path = path.unwrap();
        let data = fs::read(&path).unwrap();
        let file = GifFile::slurp(&*data).unwrap();
        let data2 = file.spew(Vec::new()).unwrap();
        assert_eq!(data, data2, "{} did not round-trip", path.display());
        count += 1;
    }
    assert!(count > 0);
}
