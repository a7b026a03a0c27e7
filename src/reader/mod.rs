//! Record-level reading of GIF streams
use std::cmp;
use std::io;
use std::io::prelude::*;

use crate::error::{GifError, Result};
use crate::interlace::{deinterlace, InterlaceIterator};
use crate::traits::{HasParameters, Parameter};
use crate::types::{Block, ExtensionBlock, ImageDescriptor, RowOrder, ScreenDescriptor, Version};

mod decoder;
pub use self::decoder::{Decoded, Decoder, EndCode};
use self::decoder::DecodedKind;

impl<R: Read> Parameter<Reader<R>> for EndCode {
    fn set_param(self, this: &mut Reader<R>) {
        this.decoder.set(self);
    }
}

impl<R: Read> Parameter<Reader<R>> for RowOrder {
    fn set_param(self, this: &mut Reader<R>) {
        this.row_order = self;
    }
}

/// What the caller has to read next
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Position {
    Records,
    ImageDescriptor,
    Extension,
    ImageData,
    Done,
    Failed,
}

/// Sequential reader of a GIF stream.
///
/// Opening the reader consumes the header and the logical screen
/// descriptor. After that [`Reader::next_record`] tells which record comes
/// next and the matching `read_*` call consumes it.
pub struct Reader<R: Read> {
    r: io::BufReader<R>,
    decoder: Decoder,
    row_order: RowOrder,
    position: Position,
    /// Pixels decoded but not handed out yet
    pending: Vec<u8>,
    offset: usize,
    /// Pixels of the current image not handed out yet
    remaining: usize,
    rows: InterlaceIterator,
}

impl<R: Read> HasParameters for Reader<R> {}

impl<R: Read> Reader<R> {
    /// Reads the header and the logical screen descriptor.
    pub fn new(reader: R) -> Result<Reader<R>> {
        let mut this = Reader {
            r: io::BufReader::new(reader),
            decoder: Decoder::new(),
            row_order: RowOrder::Stream,
            position: Position::Records,
            pending: Vec::new(),
            offset: 0,
            remaining: 0,
            rows: InterlaceIterator::new(0, false),
        };
        loop {
            match this.decode_next()? {
                DecodedKind::Header(_) => (),
                DecodedKind::ScreenDescriptor => return Ok(this),
                _ => return Err(GifError::CorruptData("screen descriptor missing")),
            }
        }
    }

    pub fn version(&self) -> Version {
        self.decoder.version()
    }

    /// The logical screen descriptor
    pub fn screen(&self) -> &ScreenDescriptor {
        self.decoder.screen()
    }

    pub fn get_ref(&self) -> &R {
        self.r.get_ref()
    }

    /// Reads the introducer of the next record.
    ///
    /// Returns `Block::Trailer` at the end of the stream. The previous
    /// record has to be consumed completely.
    pub fn next_record(&mut self) -> Result<Block> {
        self.expect(Position::Records)?;
        match self.decode_next()? {
            DecodedKind::BlockStart(Block::Image) => {
                self.position = Position::ImageDescriptor;
                Ok(Block::Image)
            }
            DecodedKind::BlockStart(Block::Extension) => {
                self.position = Position::Extension;
                Ok(Block::Extension)
            }
            DecodedKind::Trailer => {
                self.position = Position::Done;
                Ok(Block::Trailer)
            }
            _ => Err(GifError::CorruptData("unexpected data between records")),
        }
    }

    /// Reads the image descriptor including its local color table.
    pub fn read_image_desc(&mut self) -> Result<&ImageDescriptor> {
        self.expect(Position::ImageDescriptor)?;
        match self.decode_next()? {
            DecodedKind::ImageDescriptor => (),
            _ => return Err(GifError::CorruptData("image descriptor missing")),
        }
        let desc = self.decoder.current_image();
        self.remaining = desc.pixel_count();
        self.rows = InterlaceIterator::new(desc.height as usize, desc.interlaced);
        self.pending.clear();
        self.offset = 0;
        self.position = Position::ImageData;
        Ok(self.decoder.current_image())
    }

    /// Reads the next row of the current image in stream order.
    ///
    /// `line` must be exactly as long as the image is wide. Returns the
    /// display row the pixels belong to, which differs from the read count
    /// for interlaced images.
    pub fn read_line(&mut self, line: &mut [u8]) -> Result<usize> {
        self.expect(Position::ImageData)?;
        if line.len() != self.decoder.current_image().width as usize {
            return Err(GifError::OutOfRange("line length does not match image width"));
        }
        let row = self.rows.next().ok_or(GifError::RasterOverflow)?;
        self.fill(line)?;
        // zero width images still have `height` lines
        if self.remaining == 0 && self.rows.clone().next().is_none() {
            self.finish_image()?;
        }
        Ok(row)
    }

    /// Reads all pixels of the current image.
    ///
    /// Rows come in stream order unless [`RowOrder::Sequential`] is set.
    pub fn read_raster(&mut self) -> Result<Vec<u8>> {
        self.expect(Position::ImageData)?;
        let desc = self.decoder.current_image();
        let (width, height, interlaced) = (desc.width as usize, desc.height as usize, desc.interlaced);
        let len = desc.pixel_count();
        if self.remaining != len {
            return Err(GifError::InvalidSequence("image data is partially read"));
        }
        let mut raster = Vec::new();
        raster.try_reserve_exact(len)?;
        raster.resize(len, 0);
        self.fill(&mut raster)?;
        self.finish_image()?;
        self.rows = InterlaceIterator::new(0, false);
        if interlaced && self.row_order == RowOrder::Sequential {
            raster = deinterlace(&raster, width, height);
        }
        Ok(raster)
    }

    /// Reads the compressed data of the current image without decoding it.
    ///
    /// Returns the LZW minimum code size and the sub-block payloads.
    pub fn read_code_blocks(&mut self) -> Result<(u8, Vec<Vec<u8>>)> {
        self.expect(Position::ImageData)?;
        if self.remaining != self.decoder.current_image().pixel_count() {
            return Err(GifError::InvalidSequence("image data is partially read"));
        }
        self.decoder.set_raw_data(true);
        let result = self.collect_code_blocks();
        self.decoder.set_raw_data(false);
        result
    }

    fn collect_code_blocks(&mut self) -> Result<(u8, Vec<Vec<u8>>)> {
        let mut code_size = 0;
        let mut blocks = Vec::new();
        loop {
            match self.decode_next()? {
                DecodedKind::DataStart(size) => code_size = size,
                DecodedKind::CodeBlock => blocks.push(self.decoder.last_code_block().to_vec()),
                DecodedKind::DataEnd => break,
                _ => return Err(GifError::CorruptData("unexpected data inside image")),
            }
        }
        self.remaining = 0;
        self.position = Position::Records;
        Ok((code_size, blocks))
    }

    /// Skips the rest of the current image.
    pub fn skip_image(&mut self) -> Result<()> {
        self.expect(Position::ImageData)?;
        self.rows = InterlaceIterator::new(0, false);
        if self.remaining == self.decoder.current_image().pixel_count() {
            return self.read_code_blocks().map(|_| ());
        }
        loop {
            match self.decode_next()? {
                DecodedKind::Data => (),
                DecodedKind::DataEnd => break,
                _ => return Err(GifError::CorruptData("unexpected data inside image")),
            }
        }
        self.remaining = 0;
        self.position = Position::Records;
        Ok(())
    }

    /// Reads an extension record with all its sub-blocks.
    pub fn read_extension(&mut self) -> Result<ExtensionBlock> {
        self.expect(Position::Extension)?;
        let mut blocks = Vec::new();
        loop {
            match self.decode_next()? {
                DecodedKind::SubBlockFinished => blocks.push(self.decoder.last_ext().1.to_vec()),
                DecodedKind::BlockFinished => break,
                _ => return Err(GifError::CorruptData("unexpected data inside extension")),
            }
        }
        self.position = Position::Records;
        Ok(ExtensionBlock { function: self.decoder.last_ext().0, blocks })
    }

    /// Fills `buf` with the next pixels of the current image.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.remaining {
            return Err(GifError::RasterOverflow);
        }
        let mut filled = 0;
        while filled < buf.len() {
            if self.offset < self.pending.len() {
                let n = cmp::min(buf.len() - filled, self.pending.len() - self.offset);
                buf[filled..filled + n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
                self.offset += n;
                filled += n;
                continue;
            }
            match self.decode_next()? {
                DecodedKind::DataStart(_) => (),
                DecodedKind::Data => {
                    self.pending.clear();
                    self.pending.extend_from_slice(self.decoder.last_pixels());
                    self.offset = 0;
                }
                _ => return Err(GifError::UnexpectedEndOfData),
            }
        }
        self.remaining -= buf.len();
        Ok(())
    }

    /// Consumes the end code and the block terminator.
    fn finish_image(&mut self) -> Result<()> {
        loop {
            match self.decode_next()? {
                DecodedKind::DataStart(_) => (),
                DecodedKind::DataEnd => break,
                // the decoder reports surplus pixels itself
                _ => return Err(GifError::CorruptData("unexpected data inside image")),
            }
        }
        self.position = Position::Records;
        Ok(())
    }

    fn expect(&self, position: Position) -> Result<()> {
        if self.position == position {
            return Ok(());
        }
        Err(GifError::InvalidSequence(match self.position {
            Position::Records => "a record introducer is expected",
            Position::ImageDescriptor => "an image descriptor is expected",
            Position::Extension => "an extension is expected",
            Position::ImageData => "image data is expected",
            Position::Done => "the trailer has been read",
            Position::Failed => "reading failed before",
        }))
    }

    fn decode_next(&mut self) -> Result<DecodedKind> {
        let result = self.pump();
        if result.is_err() {
            self.position = Position::Failed;
        }
        result
    }

    fn pump(&mut self) -> Result<DecodedKind> {
        loop {
            if self.decoder.is_done() {
                return Err(GifError::InvalidSequence("the trailer has been read"));
            }
            let (consumed, kind) = {
                let buf = self.r.fill_buf()?;
                if buf.is_empty() {
                    return Err(GifError::UnexpectedEndOfData);
                }
                self.decoder.update_kind(buf)?
            };
            self.r.consume(consumed);
            if kind != DecodedKind::Nothing {
                return Ok(kind);
            }
        }
    }
}
