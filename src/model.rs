//! Whole-file GIF model
//!
//! [`GifFile::slurp`] reads a complete stream into memory and
//! [`GifFile::spew`] writes it back. Rasters are kept in display order, so
//! interlaced images are reordered on the way in and out.
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::mem;
use std::path::Path;

use color_quant::NeuQuant;

use crate::error::{GifError, Result};
use crate::reader::Reader;
use crate::traits::HasParameters;
use crate::types::{
    Block, ColorTable, Extension, ExtensionBlock, GraphicsControl, ImageDescriptor, RowOrder,
    ScreenDescriptor, Version, MAX_SUB_BLOCK,
};
use crate::writer::Encoder;

/// One image together with the extensions preceding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub descriptor: ImageDescriptor,
    pub extensions: Vec<ExtensionBlock>,
    /// Color indices in display order, `width * height` of them
    pub raster: Vec<u8>,
}

impl Image {
    pub fn new(descriptor: ImageDescriptor, raster: Vec<u8>) -> Result<Image> {
        if raster.len() != descriptor.pixel_count() {
            return Err(GifError::OutOfRange("raster length does not match image size"));
        }
        Ok(Image { descriptor, extensions: Vec::new(), raster })
    }

    /// Quantizes RGB pixels to a local color table of 256 entries.
    pub fn from_rgb(width: u16, height: u16, rgb: &[u8]) -> Result<Image> {
        let count = width as usize * height as usize;
        if rgb.len() != count * 3 {
            return Err(GifError::OutOfRange("RGB buffer does not match image size"));
        }
        let rgba: Vec<u8> = rgb.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 0xFF]).collect();
        let nq = NeuQuant::new(10, 256, &rgba);
        let raster = rgba.chunks_exact(4).map(|pix| nq.index_of(pix) as u8).collect();
        let mut descriptor = ImageDescriptor::new(0, 0, width, height);
        descriptor.color_table = Some(ColorTable::from_rgb(&nq.color_map_rgb())?);
        Image::new(descriptor, raster)
    }

    /// The local color table, or `global` if there is none
    pub fn color_table<'a>(&'a self, global: Option<&'a ColorTable>) -> Option<&'a ColorTable> {
        self.descriptor.color_table.as_ref().or(global)
    }

    /// The first well formed graphics control extension
    pub fn graphics_control(&self) -> Option<GraphicsControl> {
        self.extensions
            .iter()
            .filter(|ext| ext.kind() == Some(Extension::Control))
            .find_map(|ext| GraphicsControl::from_extension(ext).ok())
    }

    /// Replaces any graphics control extension with `control`.
    pub fn set_graphics_control(&mut self, control: &GraphicsControl) {
        self.extensions.retain(|ext| ext.kind() != Some(Extension::Control));
        self.extensions.insert(0, control.to_extension());
    }

    /// Color at display position (`x`, `y`)
    pub fn pixel(&self, x: u16, y: u16) -> Option<u8> {
        if x >= self.descriptor.width || y >= self.descriptor.height {
            return None;
        }
        self.raster
            .get(y as usize * self.descriptor.width as usize + x as usize)
            .copied()
    }
}

/// A complete GIF file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifFile {
    pub screen: ScreenDescriptor,
    pub images: Vec<Image>,
    /// Extensions between the last image and the trailer
    pub trailing_extensions: Vec<ExtensionBlock>,
}

impl GifFile {
    pub fn new(screen: ScreenDescriptor) -> GifFile {
        GifFile { screen, images: Vec::new(), trailing_extensions: Vec::new() }
    }

    /// Reads a complete GIF stream.
    ///
    /// Either the whole file is returned or an error; nothing partial
    /// survives a failure.
    pub fn slurp<R: Read>(r: R) -> Result<GifFile> {
        let mut reader = Reader::new(r)?;
        reader.set(RowOrder::Sequential);
        let mut file = GifFile::new(reader.screen().clone());
        let mut extensions = Vec::new();
        loop {
            match reader.next_record()? {
                Block::Extension => extensions.push(reader.read_extension()?),
                Block::Image => {
                    let descriptor = reader.read_image_desc()?.clone();
                    let raster = reader.read_raster()?;
                    file.images.push(Image {
                        descriptor,
                        extensions: mem::take(&mut extensions),
                        raster,
                    });
                }
                Block::Trailer => break,
            }
        }
        file.trailing_extensions = extensions;
        Ok(file)
    }

    /// Reads the GIF file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GifFile> {
        GifFile::slurp(BufReader::new(File::open(path)?))
    }

    /// Writes the complete file to `w`.
    ///
    /// The model is validated before the first byte is written. GIF89a is
    /// used when there are extensions, GIF87a otherwise.
    pub fn spew<W: Write>(&self, w: W) -> Result<W> {
        self.validate()?;
        let mut encoder = Encoder::new(w);
        encoder.set(self.version()).set(RowOrder::Sequential);
        encoder.write_screen_desc(&self.screen)?;
        for image in &self.images {
            for ext in &image.extensions {
                encoder.write_extension(ext)?;
            }
            encoder.write_image(&image.descriptor, &image.raster)?;
        }
        for ext in &self.trailing_extensions {
            encoder.write_extension(ext)?;
        }
        encoder.write_trailer()?;
        Ok(encoder.into_inner())
    }

    /// Writes the file to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = self.spew(BufWriter::new(File::create(path)?))?;
        w.flush()?;
        Ok(())
    }

    pub fn push_image(&mut self, image: Image) {
        self.images.push(image);
    }

    /// Version needed to represent the file
    pub fn version(&self) -> Version {
        let extensions = !self.trailing_extensions.is_empty()
            || self.images.iter().any(|image| !image.extensions.is_empty());
        if extensions {
            Version::V89a
        } else {
            Version::V87a
        }
    }

    /// Checks that every image can be encoded.
    pub fn validate(&self) -> Result<()> {
        let global = self.screen.global_color_table.as_ref();
        for image in &self.images {
            let table = image.color_table(global).ok_or(GifError::NoColorTable)?;
            if image.raster.len() != image.descriptor.pixel_count() {
                return Err(GifError::OutOfRange("raster length does not match image size"));
            }
            if image.raster.iter().any(|&p| p as usize >= table.len()) {
                return Err(GifError::OutOfRange("pixel index exceeds the color table"));
            }
        }
        let extensions = self
            .images
            .iter()
            .flat_map(|image| &image.extensions)
            .chain(&self.trailing_extensions);
        for ext in extensions {
            if ext.blocks.iter().any(|b| b.is_empty() || b.len() > MAX_SUB_BLOCK) {
                return Err(GifError::OutOfRange("sub-blocks must hold 1 to 255 bytes"));
            }
        }
        Ok(())
    }
}
