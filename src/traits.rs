//! Traits used in this library
use std::io;

/// Configuration parameter trait
pub trait Parameter<Object> {
    fn set_param(self, this: &mut Object);
}

/// Object has parameters
pub trait HasParameters: Sized {
    fn set<T: Parameter<Self>>(&mut self, value: T) -> &mut Self {
        value.set_param(self);
        self
    }
}

/// Writer extension to write little endian data
pub trait WriteBytesExt<T> {
    fn write_le(&mut self, n: T) -> io::Result<()>;
}

impl<W: io::Write + ?Sized> WriteBytesExt<u8> for W {
    #[inline]
    fn write_le(&mut self, n: u8) -> io::Result<()> {
        self.write_all(&[n])
    }
}

impl<W: io::Write + ?Sized> WriteBytesExt<u16> for W {
    #[inline]
    fn write_le(&mut self, n: u16) -> io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::WriteBytesExt;

    #[test]
    fn little_endian() {
        let mut out = Vec::new();
        out.write_le(0x0201u16).unwrap();
        out.write_le(0xFFu8).unwrap();
        assert_eq!(out, [0x01, 0x02, 0xFF]);
    }
}
