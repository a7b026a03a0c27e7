//! Common types used both by decoder and encoder
use enum_primitive::FromPrimitive;

use crate::error::{GifError, Result};

/// GIF palettes are RGB
pub const PLTE_CHANNELS: usize = 3;

/// Maximum payload of a single sub-block
pub const MAX_SUB_BLOCK: usize = 0xFF;

/// Known block types
enum_from_primitive!{
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Block {
    Image = 0x2C,
    Extension = 0x21,
    Trailer = 0x3B
}
}

/// Known GIF extensions
enum_from_primitive!{
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extension {
    Text = 0x01,
    Control = 0xF9,
    Comment = 0xFE,
    Application = 0xFF
}
}

/// GIF format version
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

impl Version {
    /// The six byte signature starting the file
    pub fn signature(self) -> &'static [u8; 6] {
        match self {
            Version::V87a => b"GIF87a",
            Version::V89a => b"GIF89a",
        }
    }

    pub fn from_signature(sig: &[u8]) -> Option<Version> {
        match sig {
            b"GIF87a" => Some(Version::V87a),
            b"GIF89a" => Some(Version::V89a),
            _ => None,
        }
    }
}

/// Order in which whole rasters are handed over for interlaced images
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Rows in the order they are stored in the stream (pass order).
    #[default]
    Stream,
    /// Rows in display order, top to bottom.
    Sequential,
}

/// An RGB palette entry
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Color {
        Color { red, green, blue }
    }
}

/// A global or local color table.
///
/// The number of entries is always a power of two between 2 and 256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<Color>,
    /// Sort flag of the descriptor owning this table
    pub sorted: bool,
}

impl ColorTable {
    /// Creates a table from exactly 2, 4, ..., 256 colors.
    pub fn new(colors: Vec<Color>) -> Result<ColorTable> {
        let n = colors.len();
        if !(2..=256).contains(&n) || !n.is_power_of_two() {
            return Err(GifError::OutOfRange(
                "color table length must be a power of two between 2 and 256",
            ));
        }
        Ok(ColorTable { colors, sorted: false })
    }

    /// Creates a table from packed RGB triples, padding it with black
    /// up to the next valid size.
    pub fn from_rgb(rgb: &[u8]) -> Result<ColorTable> {
        if rgb.len() % PLTE_CHANNELS != 0 {
            return Err(GifError::OutOfRange("palette is not made of RGB triples"));
        }
        let n = rgb.len() / PLTE_CHANNELS;
        if n > 256 {
            return Err(GifError::OutOfRange("palette has more than 256 colors"));
        }
        let mut colors: Vec<Color> = rgb
            .chunks(PLTE_CHANNELS)
            .map(|c| Color::new(c[0], c[1], c[2]))
            .collect();
        // Waste some space, tables come in powers of two
        colors.resize(n.max(2).next_power_of_two(), Color::default());
        ColorTable::new(colors)
    }

    /// Table with `2^(size_exponent+1)` entries read from the stream
    pub(crate) fn from_raw(rgb: &[u8], sorted: bool) -> ColorTable {
        let colors = rgb
            .chunks_exact(PLTE_CHANNELS)
            .map(|c| Color::new(c[0], c[1], c[2]))
            .collect();
        ColorTable { colors, sorted }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn get(&self, index: u8) -> Option<Color> {
        self.colors.get(index as usize).copied()
    }

    /// ceil(log2(len))
    pub fn bits_per_pixel(&self) -> u8 {
        self.colors.len().trailing_zeros() as u8
    }

    /// Size field of the packed descriptor byte
    pub(crate) fn size_exponent(&self) -> u8 {
        self.bits_per_pixel() - 1
    }

    pub fn to_rgb(&self) -> Vec<u8> {
        self.colors
            .iter()
            .flat_map(|c| [c.red, c.green, c.blue])
            .collect()
    }
}

/// Number of palette bytes announced by a size exponent
pub(crate) fn table_bytes(size_exponent: u8) -> usize {
    PLTE_CHANNELS * (1 << ((size_exponent & 0b111) + 1))
}

/// Logical screen descriptor and global color table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    /// Bits per primary color of the source image, 1 to 8
    pub color_resolution: u8,
    pub background: u8,
    pub aspect_ratio: u8,
    pub global_color_table: Option<ColorTable>,
}

impl ScreenDescriptor {
    pub fn new(width: u16, height: u16) -> ScreenDescriptor {
        ScreenDescriptor {
            width,
            height,
            color_resolution: 8,
            background: 0,
            aspect_ratio: 0,
            global_color_table: None,
        }
    }

    pub(crate) fn packed(&self) -> u8 {
        let mut flags = (self.color_resolution.clamp(1, 8) - 1) << 4;
        if let Some(ref table) = self.global_color_table {
            flags |= 0b1000_0000;
            flags |= (table.sorted as u8) << 3;
            flags |= table.size_exponent();
        }
        flags
    }
}

/// Position, size and flags of one image
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub color_table: Option<ColorTable>,
}

impl ImageDescriptor {
    pub fn new(left: u16, top: u16, width: u16, height: u16) -> ImageDescriptor {
        ImageDescriptor { left, top, width, height, ..Default::default() }
    }

    /// width × height
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub(crate) fn packed(&self) -> u8 {
        let mut flags = (self.interlaced as u8) << 6;
        if let Some(ref table) = self.color_table {
            flags |= 0b1000_0000;
            flags |= (table.sorted as u8) << 5;
            flags |= table.size_exponent();
        }
        flags
    }
}

/// An extension record: function code plus its raw sub-blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionBlock {
    pub function: u8,
    /// Each entry is at most 255 bytes long and never empty.
    pub blocks: Vec<Vec<u8>>,
}

impl ExtensionBlock {
    /// Splits `data` into sub-blocks of at most 255 bytes.
    pub fn from_data(function: u8, data: &[u8]) -> ExtensionBlock {
        ExtensionBlock {
            function,
            blocks: data.chunks(MAX_SUB_BLOCK).map(|c| c.to_vec()).collect(),
        }
    }

    pub fn comment(text: &str) -> ExtensionBlock {
        ExtensionBlock::from_data(Extension::Comment as u8, text.as_bytes())
    }

    /// The known extension this block is, if any
    pub fn kind(&self) -> Option<Extension> {
        Extension::from_u8(self.function)
    }

    /// All sub-blocks joined together
    pub fn data(&self) -> Vec<u8> {
        self.blocks.concat()
    }
}

/// Disposal method
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    /// Decoder is not required to take any action.
    #[default]
    Any,
    /// Do not dispose.
    Keep,
    /// Restore to background color.
    Background,
    /// Restore to previous.
    Previous,
    /// Values 4-7, undefined by GIF89a
    Reserved(u8),
}

impl DisposalMethod {
    pub fn from_u8(n: u8) -> DisposalMethod {
        match n & 0b111 {
            0 => DisposalMethod::Any,
            1 => DisposalMethod::Keep,
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Previous,
            n => DisposalMethod::Reserved(n),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            DisposalMethod::Any => 0,
            DisposalMethod::Keep => 1,
            DisposalMethod::Background => 2,
            DisposalMethod::Previous => 3,
            DisposalMethod::Reserved(n) => n & 0b111,
        }
    }
}

/// Contents of a graphics control extension
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct GraphicsControl {
    pub disposal: DisposalMethod,
    pub user_input: bool,
    pub transparent: Option<u8>,
    /// Delay in hundredths of a second
    pub delay: u16,
}

impl GraphicsControl {
    pub fn from_extension(ext: &ExtensionBlock) -> Result<GraphicsControl> {
        if ext.kind() != Some(Extension::Control) {
            return Err(GifError::CorruptData("not a graphics control extension"));
        }
        match ext.blocks.first() {
            Some(block) if block.len() == 4 => {
                let flags = block[0];
                Ok(GraphicsControl {
                    disposal: DisposalMethod::from_u8((flags & 0b11100) >> 2),
                    user_input: flags & 0b10 != 0,
                    transparent: if flags & 1 != 0 { Some(block[3]) } else { None },
                    delay: u16::from_le_bytes([block[1], block[2]]),
                })
            }
            _ => Err(GifError::CorruptData("control extension has wrong length")),
        }
    }

    pub fn to_extension(&self) -> ExtensionBlock {
        let mut flags = self.disposal.to_u8() << 2;
        flags |= (self.user_input as u8) << 1;
        flags |= self.transparent.is_some() as u8;
        let delay = self.delay.to_le_bytes();
        ExtensionBlock {
            function: Extension::Control as u8,
            blocks: vec![vec![flags, delay[0], delay[1], self.transparent.unwrap_or(0)]],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_table_sizes() {
        assert!(ColorTable::new(vec![Color::default(); 3]).is_err());
        assert!(ColorTable::new(vec![Color::default(); 1]).is_err());
        assert!(ColorTable::new(vec![Color::default(); 512]).is_err());
        let table = ColorTable::new(vec![Color::default(); 16]).unwrap();
        assert_eq!(table.bits_per_pixel(), 4);
        assert_eq!(table.size_exponent(), 3);
    }

    #[test]
    fn from_rgb_pads() {
        let table = ColorTable::from_rgb(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(2), Some(Color::new(7, 8, 9)));
        assert_eq!(table.get(3), Some(Color::default()));
        assert_eq!(ColorTable::from_rgb(&[0xFF; 3]).unwrap().len(), 2);
        assert!(ColorTable::from_rgb(&[0; 4]).is_err());
    }

    #[test]
    fn packed_fields() {
        let mut screen = ScreenDescriptor::new(10, 10);
        screen.color_resolution = 2;
        screen.global_color_table = Some(ColorTable::new(vec![Color::default(); 4]).unwrap());
        assert_eq!(screen.packed(), 0x91);

        let mut desc = ImageDescriptor::new(0, 0, 1, 1);
        desc.interlaced = true;
        assert_eq!(desc.packed(), 0x40);
        let mut table = ColorTable::new(vec![Color::default(); 8]).unwrap();
        table.sorted = true;
        desc.color_table = Some(table);
        assert_eq!(desc.packed(), 0b1110_0010);
    }

    #[test]
    fn graphics_control() {
        let ext = ExtensionBlock { function: 0xF9, blocks: vec![vec![0b0000_1001, 10, 0, 3]] };
        let control = GraphicsControl::from_extension(&ext).unwrap();
        assert_eq!(control.disposal, DisposalMethod::Background);
        assert_eq!(control.transparent, Some(3));
        assert_eq!(control.delay, 10);
        assert!(!control.user_input);
        assert_eq!(control.to_extension(), ext);

        let short = ExtensionBlock { function: 0xF9, blocks: vec![vec![0, 0]] };
        assert!(GraphicsControl::from_extension(&short).is_err());
    }

    #[test]
    fn comment_chunks() {
        let text = "x".repeat(600);
        let ext = ExtensionBlock::comment(&text);
        assert_eq!(ext.kind(), Some(Extension::Comment));
        let lens: Vec<usize> = ext.blocks.iter().map(|b| b.len()).collect();
        assert_eq!(lens, [255, 255, 90]);
        assert_eq!(ext.data(), text.as_bytes());
    }
}
