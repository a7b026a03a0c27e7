//! Record-level writing of GIF streams
mod encoder;

pub use self::encoder::{Encoder, ImageWriter};
