//! The LZW variant used for GIF image data.
//!
//! Codes start one bit wider than the minimum code size and grow up to
//! 12 bits. `2^min_code_size` is the clear code and the value after it
//! ends the data. Codes are packed least significant bit first and framed
//! into sub-blocks by [`CodeWriter`].
mod bits;
mod compress;
mod decompress;

pub use self::bits::{CodeReader, CodeWriter};
pub use self::compress::Encoder;
pub use self::decompress::Decoder;

/// An LZW code
pub type Code = u16;

/// Widest code GIF allows
pub const MAX_CODE_SIZE: u8 = 12;
/// Number of codes available at [`MAX_CODE_SIZE`]
pub const MAX_CODES: usize = 1 << MAX_CODE_SIZE;

/// Minimum code size written for a palette of the given depth
pub fn min_code_size(bits_per_pixel: u8) -> u8 {
    bits_per_pixel.max(2)
}
