use std::cmp;

use enum_primitive::FromPrimitive;

use crate::error::{GifError, Result};
use crate::lzw;
use crate::traits::{HasParameters, Parameter};
use crate::types::{table_bytes, Block, ColorTable, ImageDescriptor, ScreenDescriptor, Version};

/// Whether image data has to end with the LZW end code
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EndCode {
    /// A missing end code is `UnexpectedEndOfData`.
    #[default]
    Required,
    /// A missing end code is accepted once the raster is complete.
    Optional,
}

impl Parameter<Decoder> for EndCode {
    fn set_param(self, this: &mut Decoder) {
        this.end_code = self
    }
}

/// Indicates what has been decoded by the last call to [`Decoder::update`]
#[derive(Debug)]
pub enum Decoded<'a> {
    Nothing,
    /// Signature and version
    Header(Version),
    /// Logical screen descriptor, including the global color table
    ScreenDescriptor(&'a ScreenDescriptor),
    /// Introducer of the next record
    BlockStart(Block),
    /// One extension sub-block with the function code of its extension
    SubBlockFinished(u8, &'a [u8]),
    /// Terminator of the extension with the given function code
    BlockFinished(u8),
    /// Image descriptor, including the local color table
    ImageDescriptor(&'a ImageDescriptor),
    /// LZW minimum code size of the image data that follows
    DataStart(u8),
    /// Decoded pixel indices
    Data(&'a [u8]),
    /// Compressed sub-block, when raw data was requested
    CodeBlock(&'a [u8]),
    DataEnd,
    Trailer,
}

/// [`Decoded`] without the borrowed payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum DecodedKind {
    Nothing,
    Header(Version),
    ScreenDescriptor,
    BlockStart(Block),
    SubBlockFinished,
    BlockFinished,
    ImageDescriptor,
    DataStart(u8),
    Data,
    CodeBlock,
    DataEnd,
    Trailer,
}

/// Internal state of the GIF decoder
#[derive(Debug)]
enum State {
    Magic(usize, [u8; 6]),
    U16Byte1(U16Value, u8),
    U16(U16Value),
    Byte(ByteValue),
    GlobalPalette(usize),
    Introducer,
    ExtensionLabel,
    ExtSubBlockStart,
    ExtSubBlock(usize),
    LocalPalette(usize),
    DataSubBlockStart,
    DecodeSubBlock(usize),
}
use self::State::*;

/// U16 values that may occur in a GIF image
#[derive(Debug)]
enum U16Value {
    /// Logical screen descriptor width
    ScreenWidth,
    /// Logical screen descriptor height
    ScreenHeight,
    /// Left frame offset
    ImageLeft,
    /// Top frame offset
    ImageTop,
    /// Frame width
    ImageWidth,
    /// Frame height
    ImageHeight,
}

/// Single byte descriptor values
#[derive(Debug)]
enum ByteValue {
    GlobalFlags,
    Background,
    AspectRatio,
    ImageFlags,
    CodeSize,
}

/// GIF decoder which supports streaming.
///
/// Bytes are pushed in with [`Decoder::update`] in chunks of any size; the
/// decoder stops after every event so the caller can act on it.
#[derive(Debug)]
pub struct Decoder {
    state: Option<State>,
    end_code: EndCode,
    raw_data: bool,
    version: Version,
    screen: ScreenDescriptor,
    global_flags: u8,
    image_flags: u8,
    /// Color table being read
    palette: Vec<u8>,
    current: ImageDescriptor,
    /// ext buffer
    ext: (u8, Vec<u8>),
    /// Last compressed sub-block in raw mode
    block: Vec<u8>,
    lzw: Option<lzw::Decoder>,
    pixels_left: usize,
}

impl HasParameters for Decoder {}

impl Default for Decoder {
    fn default() -> Decoder {
        Decoder::new()
    }
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder {
            state: Some(Magic(0, [0; 6])),
            end_code: EndCode::Required,
            raw_data: false,
            version: Version::V89a,
            screen: ScreenDescriptor::new(0, 0),
            global_flags: 0,
            image_flags: 0,
            palette: Vec::with_capacity(3 * 256),
            current: ImageDescriptor::default(),
            ext: (0, Vec::with_capacity(256)), // 0xFF + 1 byte length
            block: Vec::with_capacity(256),
            lzw: None,
            pixels_left: 0,
        }
    }

    /// Updates the internal state of the decoder.
    ///
    /// Returns the number of bytes consumed from the input buffer
    /// and the last decoding result.
    pub fn update(&mut self, buf: &[u8]) -> Result<(usize, Decoded<'_>)> {
        let (len, kind) = self.update_kind(buf)?;
        Ok((len, self.decoded(kind)))
    }

    pub(crate) fn update_kind(&mut self, mut buf: &[u8]) -> Result<(usize, DecodedKind)> {
        let len = buf.len();
        while !buf.is_empty() && self.state.is_some() {
            let (bytes, kind) = self.next_state(buf)?;
            buf = &buf[bytes..];
            if kind != DecodedKind::Nothing {
                return Ok((len - buf.len(), kind));
            }
        }
        Ok((len - buf.len(), DecodedKind::Nothing))
    }

    fn decoded(&self, kind: DecodedKind) -> Decoded<'_> {
        match kind {
            DecodedKind::Nothing => Decoded::Nothing,
            DecodedKind::Header(version) => Decoded::Header(version),
            DecodedKind::ScreenDescriptor => Decoded::ScreenDescriptor(&self.screen),
            DecodedKind::BlockStart(block) => Decoded::BlockStart(block),
            DecodedKind::SubBlockFinished => Decoded::SubBlockFinished(self.ext.0, &self.ext.1),
            DecodedKind::BlockFinished => Decoded::BlockFinished(self.ext.0),
            DecodedKind::ImageDescriptor => Decoded::ImageDescriptor(&self.current),
            DecodedKind::DataStart(code_size) => Decoded::DataStart(code_size),
            DecodedKind::Data => Decoded::Data(self.last_pixels()),
            DecodedKind::CodeBlock => Decoded::CodeBlock(&self.block),
            DecodedKind::DataEnd => Decoded::DataEnd,
            DecodedKind::Trailer => Decoded::Trailer,
        }
    }

    /// True once the trailer has been decoded or decoding failed
    pub fn is_done(&self) -> bool {
        self.state.is_none()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn screen(&self) -> &ScreenDescriptor {
        &self.screen
    }

    /// Descriptor of the image currently being decoded
    pub fn current_image(&self) -> &ImageDescriptor {
        &self.current
    }

    /// Function code and data of the last extension sub-block
    pub fn last_ext(&self) -> (u8, &[u8]) {
        (self.ext.0, &self.ext.1)
    }

    /// Pixels of the last `Data` event
    pub fn last_pixels(&self) -> &[u8] {
        self.lzw.as_ref().map_or(&[], |lzw| lzw.last_output())
    }

    /// Last compressed sub-block in raw mode
    pub fn last_code_block(&self) -> &[u8] {
        &self.block
    }

    /// Hands out the compressed sub-blocks of the next image instead of
    /// decoding them. Takes effect when the LZW code size is read.
    pub fn set_raw_data(&mut self, raw: bool) {
        self.raw_data = raw;
    }

    fn next_state(&mut self, buf: &[u8]) -> Result<(usize, DecodedKind)> {
        macro_rules! goto (
            ($n:expr, $state:expr) => ({
                self.state = Some($state);
                Ok(($n, DecodedKind::Nothing))
            });
            ($state:expr) => ({
                self.state = Some($state);
                Ok((1, DecodedKind::Nothing))
            });
            ($n:expr, $state:expr, emit $res:expr) => ({
                self.state = Some($state);
                Ok(($n, $res))
            });
            ($state:expr, emit $res:expr) => ({
                self.state = Some($state);
                Ok((1, $res))
            })
        );

        let b = buf[0];

        let state = match self.state.take() {
            Some(state) => state,
            None => return Ok((0, DecodedKind::Nothing)),
        };

        match state {
            Magic(i, mut signature) => {
                signature[i] = b;
                let seen = &signature[..=i];
                if !Version::V87a.signature().starts_with(seen)
                    && !Version::V89a.signature().starts_with(seen)
                {
                    return Err(GifError::NotAGifFile);
                }
                if i + 1 < signature.len() {
                    goto!(Magic(i + 1, signature))
                } else {
                    let version = Version::from_signature(&signature).ok_or(GifError::NotAGifFile)?;
                    self.version = version;
                    goto!(U16(U16Value::ScreenWidth), emit DecodedKind::Header(version))
                }
            }
            U16(next) => goto!(U16Byte1(next, b)),
            U16Byte1(next, low) => {
                use self::U16Value::*;
                let value = u16::from_le_bytes([low, b]);
                match next {
                    ScreenWidth => {
                        self.screen.width = value;
                        goto!(U16(ScreenHeight))
                    }
                    ScreenHeight => {
                        self.screen.height = value;
                        goto!(Byte(ByteValue::GlobalFlags))
                    }
                    ImageLeft => {
                        self.current.left = value;
                        goto!(U16(ImageTop))
                    }
                    ImageTop => {
                        self.current.top = value;
                        goto!(U16(ImageWidth))
                    }
                    ImageWidth => {
                        self.current.width = value;
                        goto!(U16(ImageHeight))
                    }
                    ImageHeight => {
                        self.current.height = value;
                        goto!(Byte(ByteValue::ImageFlags))
                    }
                }
            }
            Byte(value) => {
                use self::ByteValue::*;
                match value {
                    GlobalFlags => {
                        self.global_flags = b;
                        self.screen.color_resolution = ((b >> 4) & 0b111) + 1;
                        goto!(Byte(Background))
                    }
                    Background => {
                        self.screen.background = b;
                        goto!(Byte(AspectRatio))
                    }
                    AspectRatio => {
                        self.screen.aspect_ratio = b;
                        if self.global_flags & 0b1000_0000 != 0 {
                            self.palette.clear();
                            goto!(GlobalPalette(table_bytes(self.global_flags)))
                        } else {
                            self.screen.global_color_table = None;
                            goto!(Introducer, emit DecodedKind::ScreenDescriptor)
                        }
                    }
                    ImageFlags => {
                        self.image_flags = b;
                        self.current.interlaced = b & 0b0100_0000 != 0;
                        if b & 0b1000_0000 != 0 {
                            self.palette.clear();
                            goto!(LocalPalette(table_bytes(b)))
                        } else {
                            goto!(Byte(CodeSize), emit DecodedKind::ImageDescriptor)
                        }
                    }
                    CodeSize => {
                        if !(1..=8).contains(&b) {
                            return Err(GifError::CorruptData("invalid minimal code size"));
                        }
                        self.lzw = if self.raw_data { None } else { Some(lzw::Decoder::new(b)?) };
                        self.pixels_left = self.current.pixel_count();
                        goto!(DataSubBlockStart, emit DecodedKind::DataStart(b))
                    }
                }
            }
            GlobalPalette(left) => {
                let n = cmp::min(left, buf.len());
                self.palette.extend_from_slice(&buf[..n]);
                if n < left {
                    goto!(n, GlobalPalette(left - n))
                } else {
                    let sorted = self.global_flags & 0b1000 != 0;
                    self.screen.global_color_table = Some(ColorTable::from_raw(&self.palette, sorted));
                    goto!(n, Introducer, emit DecodedKind::ScreenDescriptor)
                }
            }
            Introducer => match Block::from_u8(b) {
                Some(Block::Image) => {
                    self.current = ImageDescriptor::default();
                    goto!(U16(U16Value::ImageLeft), emit DecodedKind::BlockStart(Block::Image))
                }
                Some(Block::Extension) => {
                    goto!(ExtensionLabel, emit DecodedKind::BlockStart(Block::Extension))
                }
                Some(Block::Trailer) => Ok((1, DecodedKind::Trailer)),
                None => Err(GifError::CorruptData("unknown block type encountered")),
            },
            ExtensionLabel => {
                self.ext.0 = b;
                self.ext.1.clear();
                goto!(ExtSubBlockStart)
            }
            ExtSubBlockStart => {
                self.ext.1.clear();
                if b == 0 {
                    goto!(Introducer, emit DecodedKind::BlockFinished)
                } else {
                    goto!(ExtSubBlock(b as usize))
                }
            }
            ExtSubBlock(left) => {
                let n = cmp::min(left, buf.len());
                self.ext.1.extend_from_slice(&buf[..n]);
                if n < left {
                    goto!(n, ExtSubBlock(left - n))
                } else {
                    goto!(n, ExtSubBlockStart, emit DecodedKind::SubBlockFinished)
                }
            }
            LocalPalette(left) => {
                let n = cmp::min(left, buf.len());
                self.palette.extend_from_slice(&buf[..n]);
                if n < left {
                    goto!(n, LocalPalette(left - n))
                } else {
                    let sorted = self.image_flags & 0b0010_0000 != 0;
                    self.current.color_table = Some(ColorTable::from_raw(&self.palette, sorted));
                    goto!(n, Byte(ByteValue::CodeSize), emit DecodedKind::ImageDescriptor)
                }
            }
            DataSubBlockStart => {
                if b != 0 {
                    self.block.clear();
                    return goto!(DecodeSubBlock(b as usize));
                }
                // end of image data reached
                if let Some(lzw) = self.lzw.take() {
                    if self.pixels_left > 0 {
                        return Err(GifError::UnexpectedEndOfData);
                    }
                    if !lzw.has_ended() && self.end_code == EndCode::Required {
                        return Err(GifError::UnexpectedEndOfData);
                    }
                }
                goto!(Introducer, emit DecodedKind::DataEnd)
            }
            DecodeSubBlock(left) => {
                let n = cmp::min(left, buf.len());
                // without a required end code the data may stop at the last pixel
                let complete = self.pixels_left == 0 && self.end_code == EndCode::Optional;
                let lzw = match self.lzw.as_mut() {
                    Some(lzw) if !lzw.has_ended() && !complete => lzw,
                    _ => {
                        // raw mode, or bytes following the last code
                        if self.raw_data {
                            self.block.extend_from_slice(&buf[..n]);
                        }
                        return if n < left {
                            goto!(n, DecodeSubBlock(left - n))
                        } else if self.raw_data {
                            goto!(n, DataSubBlockStart, emit DecodedKind::CodeBlock)
                        } else {
                            goto!(n, DataSubBlockStart)
                        };
                    }
                };
                // `left` may be zero: codes can still sit in the bit buffer
                let (consumed, pixels) = lzw.decode_bytes(&buf[..n])?;
                let produced = pixels.len();
                let left = left - consumed;
                if produced > 0 {
                    if produced > self.pixels_left {
                        return Err(GifError::RasterOverflow);
                    }
                    self.pixels_left -= produced;
                    goto!(consumed, DecodeSubBlock(left), emit DecodedKind::Data)
                } else if left == 0 {
                    goto!(consumed, DataSubBlockStart)
                } else {
                    goto!(consumed, DecodeSubBlock(left))
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs::File;
    use std::io::prelude::*;

    use super::{Decoded, Decoder, EndCode};
    use crate::error::GifError;
    use crate::traits::HasParameters;
    use crate::types::Version;

    fn sample() -> Vec<u8> {
        let mut data = Vec::new();
        File::open("tests/samples/sample_1.gif").unwrap().read_to_end(&mut data).unwrap();
        data
    }

    /// Feeds `data` in chunks of `step` bytes and lists the events.
    fn events(decoder: &mut Decoder, data: &[u8], step: usize) -> Result<Vec<String>, GifError> {
        let mut out = Vec::new();
        let mut pixels = 0;
        for mut chunk in data.chunks(step) {
            while !chunk.is_empty() {
                let (consumed, decoded) = decoder.update(chunk)?;
                chunk = &chunk[consumed..];
                match decoded {
                    Decoded::Nothing => (),
                    Decoded::Data(data) => pixels += data.len(),
                    Decoded::DataEnd => {
                        out.push(format!("pixels {}", pixels));
                        pixels = 0;
                    }
                    Decoded::SubBlockFinished(f, data) => out.push(format!("sub {:x} {}", f, data.len())),
                    Decoded::BlockFinished(f) => out.push(format!("ext {:x}", f)),
                    Decoded::ImageDescriptor(d) => out.push(format!("image {}x{}", d.width, d.height)),
                    Decoded::Header(v) => out.push(format!("{:?}", v)),
                    Decoded::ScreenDescriptor(s) => out.push(format!("screen {}x{}", s.width, s.height)),
                    Decoded::BlockStart(b) => out.push(format!("{:?}", b)),
                    Decoded::DataStart(size) => out.push(format!("code size {}", size)),
                    Decoded::CodeBlock(data) => out.push(format!("code block {}", data.len())),
                    Decoded::Trailer => out.push("trailer".into()),
                }
                if decoder.is_done() {
                    return Ok(out);
                }
            }
        }
        Ok(out)
    }

    #[test]
    fn test_simple() {
        let data = sample();
        let expected = [
            "V89a", "screen 10x10", "Extension", "sub f9 4", "ext f9", "Image", "image 10x10",
            "code size 2", "pixels 100", "trailer",
        ];
        for step in [1, 2, 7, data.len()] {
            let mut decoder = Decoder::new();
            assert_eq!(events(&mut decoder, &data, step).unwrap(), expected);
            assert_eq!(decoder.version(), Version::V89a);
            assert_eq!(decoder.screen().global_color_table.as_ref().unwrap().len(), 4);
        }
    }

    #[test]
    fn raw_code_blocks() {
        let data = sample();
        let mut decoder = Decoder::new();
        decoder.set_raw_data(true);
        let events = events(&mut decoder, &data, 3).unwrap();
        assert!(events.contains(&"code block 22".to_string()));
        assert!(events.contains(&"pixels 0".to_string()));
    }

    #[test]
    fn bad_signature() {
        let mut decoder = Decoder::new();
        assert!(matches!(decoder.update(b"GIF90a"), Err(GifError::NotAGifFile)));
        let mut decoder = Decoder::new();
        assert!(matches!(decoder.update(b"PNG"), Err(GifError::NotAGifFile)));
    }

    #[test]
    fn unknown_block() {
        let mut data = sample();
        // replace the extension introducer
        data[25] = 0x42;
        let mut decoder = Decoder::new();
        assert!(matches!(events(&mut decoder, &data, 5), Err(GifError::CorruptData(_))));
    }

    #[test]
    fn missing_end_code() {
        // 1x1 image: clear, 0, no end code
        let mut data = b"GIF87a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff".to_vec();
        data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0, 2, 1, 0x04, 0, 0x3B]);

        let mut decoder = Decoder::new();
        assert!(matches!(events(&mut decoder, &data, 1), Err(GifError::UnexpectedEndOfData)));

        let mut decoder = Decoder::new();
        decoder.set(EndCode::Optional);
        let events = events(&mut decoder, &data, 1).unwrap();
        assert_eq!(events.last().unwrap(), "trailer");
    }

    #[test]
    fn too_many_pixels() {
        // 1x1 image whose data holds two pixels
        let mut data = b"GIF87a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff".to_vec();
        // clear(4) 0 0 end(5), 3 bits each
        data.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0, 2, 2, 0x04, 0x0A, 0, 0x3B]);
        let mut decoder = Decoder::new();
        assert!(matches!(events(&mut decoder, &data, 4), Err(GifError::RasterOverflow)));
    }

    #[test]
    fn stops_at_trailer() {
        let mut data = sample();
        data.extend_from_slice(b"garbage");
        let mut decoder = Decoder::new();
        let mut buf = &data[..];
        while !decoder.is_done() {
            let (consumed, _) = decoder.update(buf).unwrap();
            buf = &buf[consumed..];
        }
        assert_eq!(buf, b"garbage");
    }
}
