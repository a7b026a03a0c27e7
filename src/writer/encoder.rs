use std::io;
use std::io::prelude::*;

use crate::error::{GifError, Result};
use crate::interlace::interlace;
use crate::lzw;
use crate::traits::{HasParameters, Parameter, WriteBytesExt};
use crate::types::{Block, ColorTable, ExtensionBlock, ImageDescriptor, RowOrder, ScreenDescriptor, Version};

impl<W: Write> Parameter<Encoder<W>> for Version {
    fn set_param(self, this: &mut Encoder<W>) {
        this.version = self;
    }
}

impl<W: Write> Parameter<Encoder<W>> for RowOrder {
    fn set_param(self, this: &mut Encoder<W>) {
        this.row_order = self;
    }
}

/// Progress of the encoder through the stream
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum State {
    Start,
    Records,
    Image,
    Closed,
}

/// Sequential GIF writer.
///
/// Records are written in call order: the screen descriptor first, then
/// any number of extensions and images, then the trailer. Calls made out
/// of that order fail with `InvalidSequence` without writing anything.
/// The trailer is only written by [`Encoder::write_trailer`].
pub struct Encoder<W: Write> {
    w: W,
    state: State,
    version: Version,
    row_order: RowOrder,
    /// Size of the global color table
    global_colors: Option<usize>,
}

impl<W: Write> HasParameters for Encoder<W> {}

impl<W: Write> Encoder<W> {
    pub fn new(w: W) -> Encoder<W> {
        Encoder {
            w,
            state: State::Start,
            version: Version::V89a,
            row_order: RowOrder::Stream,
            global_colors: None,
        }
    }

    /// Writes the signature and the logical screen descriptor.
    pub fn write_screen_desc(&mut self, screen: &ScreenDescriptor) -> Result<()> {
        if self.state != State::Start {
            return Err(GifError::InvalidSequence("screen descriptor already written"));
        }
        self.w.write_all(self.version.signature())?;
        self.w.write_le(screen.width)?;
        self.w.write_le(screen.height)?;
        self.w.write_le(screen.packed())?;
        self.w.write_le(screen.background)?;
        self.w.write_le(screen.aspect_ratio)?;
        if let Some(ref table) = screen.global_color_table {
            self.write_color_table(table)?;
        }
        self.global_colors = screen.global_color_table.as_ref().map(|t| t.len());
        self.state = State::Records;
        Ok(())
    }

    /// Writes an extension record.
    pub fn write_extension(&mut self, extension: &ExtensionBlock) -> Result<()> {
        self.expect_records()?;
        check_sub_blocks(&extension.blocks)?;
        self.w.write_le(Block::Extension as u8)?;
        self.w.write_le(extension.function)?;
        self.write_sub_blocks(&extension.blocks)
    }

    /// Writes a complete image.
    ///
    /// Rows are expected in stream order unless [`RowOrder::Sequential`]
    /// is set, in which case interlaced images are reordered here.
    pub fn write_image(&mut self, desc: &ImageDescriptor, raster: &[u8]) -> Result<()> {
        if raster.len() != desc.pixel_count() {
            return Err(GifError::OutOfRange("raster length does not match image size"));
        }
        self.expect_records()?;
        let colors = self.colors_for(desc)?;
        if raster.iter().any(|&p| p as usize >= colors) {
            return Err(GifError::OutOfRange("pixel index exceeds the color table"));
        }
        let reorder = desc.interlaced && self.row_order == RowOrder::Sequential;
        let mut image = self.start_image(desc)?;
        if reorder {
            image.write_pixels(&interlace(raster, desc.width as usize, desc.height as usize))
        } else {
            image.write_pixels(raster)
        }
    }

    /// Writes the image descriptor and starts the image data.
    ///
    /// Pixels are then passed to the returned [`ImageWriter`] in stream
    /// order. The data is terminated as soon as the last pixel arrives.
    pub fn start_image(&mut self, desc: &ImageDescriptor) -> Result<ImageWriter<'_, W>> {
        self.expect_records()?;
        let colors = self.colors_for(desc)?;
        self.write_image_desc(desc)?;
        let code_size = lzw::min_code_size(colors.trailing_zeros() as u8);
        self.w.write_le(code_size)?;
        self.state = State::Image;
        let encoder = lzw::Encoder::new(&mut self.w, code_size)?;
        let mut image = ImageWriter {
            encoder: Some(encoder),
            state: &mut self.state,
            remaining: desc.pixel_count(),
            colors,
        };
        if image.remaining == 0 {
            image.finish()?;
        }
        Ok(image)
    }

    /// Writes an image whose data is already compressed.
    ///
    /// `blocks` are the sub-block payloads as returned by
    /// `Reader::read_code_blocks`.
    pub fn write_raw_image(&mut self, desc: &ImageDescriptor, code_size: u8, blocks: &[Vec<u8>]) -> Result<()> {
        self.expect_records()?;
        self.colors_for(desc)?;
        if !(1..=8).contains(&code_size) {
            return Err(GifError::OutOfRange("LZW minimum code size must be between 1 and 8"));
        }
        check_sub_blocks(blocks)?;
        self.write_image_desc(desc)?;
        self.w.write_le(code_size)?;
        self.write_sub_blocks(blocks)
    }

    /// Writes the trailer and flushes the writer.
    pub fn write_trailer(&mut self) -> Result<()> {
        self.expect_records()?;
        self.w.write_le(Block::Trailer as u8)?;
        self.w.flush()?;
        self.state = State::Closed;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.w
    }

    fn expect_records(&self) -> Result<()> {
        match self.state {
            State::Records => Ok(()),
            State::Start => Err(GifError::InvalidSequence("screen descriptor not written yet")),
            State::Image => Err(GifError::InvalidSequence("previous image is incomplete")),
            State::Closed => Err(GifError::InvalidSequence("trailer already written")),
        }
    }

    /// Size of the color table that applies to `desc`
    fn colors_for(&self, desc: &ImageDescriptor) -> Result<usize> {
        match desc.color_table {
            Some(ref table) => Ok(table.len()),
            None => self.global_colors.ok_or(GifError::NoColorTable),
        }
    }

    fn write_image_desc(&mut self, desc: &ImageDescriptor) -> io::Result<()> {
        self.w.write_le(Block::Image as u8)?;
        self.w.write_le(desc.left)?;
        self.w.write_le(desc.top)?;
        self.w.write_le(desc.width)?;
        self.w.write_le(desc.height)?;
        self.w.write_le(desc.packed())?;
        if let Some(ref table) = desc.color_table {
            self.write_color_table(table)?;
        }
        Ok(())
    }

    fn write_color_table(&mut self, table: &ColorTable) -> io::Result<()> {
        self.w.write_all(&table.to_rgb())
    }

    fn write_sub_blocks(&mut self, blocks: &[Vec<u8>]) -> Result<()> {
        for block in blocks {
            self.w.write_le(block.len() as u8)?;
            self.w.write_all(block)?;
        }
        self.w.write_le(0u8)?;
        Ok(())
    }
}

fn check_sub_blocks(blocks: &[Vec<u8>]) -> Result<()> {
    if blocks.iter().any(|b| b.is_empty() || b.len() > 0xFF) {
        return Err(GifError::OutOfRange("sub-blocks must hold 1 to 255 bytes"));
    }
    Ok(())
}

/// Pixel sink for the image started by [`Encoder::start_image`].
pub struct ImageWriter<'a, W: Write> {
    encoder: Option<lzw::Encoder<&'a mut W>>,
    state: &'a mut State,
    remaining: usize,
    colors: usize,
}

impl<'a, W: Write> ImageWriter<'a, W> {
    /// Compresses the next pixels of the image.
    pub fn write_pixels(&mut self, pixels: &[u8]) -> Result<()> {
        if pixels.is_empty() {
            return Ok(());
        }
        if pixels.len() > self.remaining {
            return Err(GifError::RasterOverflow);
        }
        if pixels.iter().any(|&p| p as usize >= self.colors) {
            return Err(GifError::OutOfRange("pixel index exceeds the color table"));
        }
        let encoder = self
            .encoder
            .as_mut()
            .ok_or(GifError::InvalidSequence("image is already complete"))?;
        encoder.encode_bytes(pixels)?;
        self.remaining -= pixels.len();
        if self.remaining == 0 {
            self.finish()?;
        }
        Ok(())
    }

    /// Pixels still expected
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            encoder.finish()?;
            *self.state = State::Records;
        }
        Ok(())
    }
}
