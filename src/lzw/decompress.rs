//! LZW decompression into pixel indices
use crate::error::{GifError, Result};

use super::bits::CodeReader;
use super::{Code, MAX_CODES, MAX_CODE_SIZE};

/// Decompression session for the data of one image.
///
/// The table stores every string as (prefix code, last pixel) together
/// with its first pixel and length, so a string is rebuilt back to front
/// without allocating.
#[derive(Debug)]
pub struct Decoder {
    r: CodeReader,
    prefix: Box<[Code]>,
    suffix: Box<[u8]>,
    first: Box<[u8]>,
    length: Box<[u16]>,
    min_code_size: u8,
    code_size: u8,
    next_code: Code,
    prev: Option<Code>,
    ended: bool,
    buf: Vec<u8>,
}

impl Decoder {
    pub fn new(min_code_size: u8) -> Result<Decoder> {
        if !(1..=8).contains(&min_code_size) {
            return Err(GifError::CorruptData("invalid minimal code size"));
        }
        let mut dec = Decoder {
            r: CodeReader::new(),
            prefix: vec![0; MAX_CODES].into_boxed_slice(),
            suffix: vec![0; MAX_CODES].into_boxed_slice(),
            first: vec![0; MAX_CODES].into_boxed_slice(),
            length: vec![0; MAX_CODES].into_boxed_slice(),
            min_code_size,
            code_size: 0,
            next_code: 0,
            prev: None,
            ended: false,
            buf: Vec::with_capacity(MAX_CODES),
        };
        for i in 0..1usize << min_code_size {
            dec.suffix[i] = i as u8;
            dec.first[i] = i as u8;
            dec.length[i] = 1;
        }
        dec.reset();
        Ok(dec)
    }

    fn clear_code(&self) -> Code {
        1 << self.min_code_size
    }

    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    fn reset(&mut self) {
        self.code_size = self.min_code_size + 1;
        self.next_code = self.clear_code() + 2;
        self.prev = None;
    }

    /// True once the end code has been read
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Pixels returned by the last call to [`Decoder::decode_bytes`]
    pub fn last_output(&self) -> &[u8] {
        &self.buf
    }

    /// Decodes codes from `bytes` until one of them yields pixels or the
    /// input is exhausted.
    ///
    /// Returns the number of bytes consumed and the pixels produced.
    /// Nothing is consumed after the end code.
    pub fn decode_bytes(&mut self, mut bytes: &[u8]) -> Result<(usize, &[u8])> {
        let mut consumed = 0;
        self.buf.clear();
        while !self.ended {
            let (n, code) = self.r.read_code(bytes, self.code_size);
            consumed += n;
            bytes = &bytes[n..];
            match code {
                Some(code) => {
                    self.decode_code(code)?;
                    if !self.buf.is_empty() {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok((consumed, &self.buf))
    }

    fn decode_code(&mut self, code: Code) -> Result<()> {
        let clear_code = self.clear_code();
        if code == clear_code {
            self.reset();
            return Ok(());
        }
        if code == self.end_code() {
            self.ended = true;
            return Ok(());
        }
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                if code > clear_code {
                    return Err(GifError::CorruptData("first code after a clear is not a literal"));
                }
                self.buf.push(code as u8);
                self.prev = Some(code);
                return Ok(());
            }
        };
        if code < self.next_code {
            self.expand(code);
            self.add(prev, self.first[code as usize]);
        } else if code == self.next_code {
            // the string being defined by this very code
            let first = self.first[prev as usize];
            self.expand(prev);
            self.buf.push(first);
            self.add(prev, first);
        } else {
            return Err(GifError::CorruptData("code beyond the dictionary"));
        }
        self.prev = Some(code);
        Ok(())
    }

    /// Appends the string of `code` to the output.
    fn expand(&mut self, code: Code) {
        let len = self.length[code as usize] as usize;
        let start = self.buf.len();
        self.buf.resize(start + len, 0);
        let mut c = code as usize;
        for out in self.buf[start..].iter_mut().rev() {
            *out = self.suffix[c];
            c = self.prefix[c] as usize;
        }
    }

    fn add(&mut self, prefix: Code, suffix: u8) {
        // a full table stays frozen until the next clear code
        if self.next_code as usize >= MAX_CODES {
            return;
        }
        let code = self.next_code as usize;
        self.prefix[code] = prefix;
        self.suffix[code] = suffix;
        self.first[code] = self.first[prefix as usize];
        self.length[code] = self.length[prefix as usize] + 1;
        self.next_code += 1;
        if self.next_code as usize >= 1 << self.code_size && self.code_size < MAX_CODE_SIZE {
            self.code_size += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::Decoder;
    use crate::error::GifError;
    use crate::lzw::CodeWriter;

    fn payload(codes: &[(u16, u8)]) -> Vec<u8> {
        let mut w = CodeWriter::new(Vec::new());
        for &(code, width) in codes {
            w.write_code(code, width).unwrap();
        }
        let framed = w.finish().unwrap();
        framed[1..1 + framed[0] as usize].to_vec()
    }

    fn decode_all(dec: &mut Decoder, mut buf: &[u8]) -> Result<Vec<u8>, GifError> {
        let mut out = Vec::new();
        loop {
            let (consumed, pixels) = dec.decode_bytes(buf)?;
            if consumed == 0 && pixels.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(pixels);
            buf = &buf[consumed..];
        }
    }

    #[test]
    fn special_case_code() {
        // 0 followed by the code that is about to be defined
        let data = payload(&[(4, 3), (1, 3), (6, 3), (5, 3)]);
        let mut dec = Decoder::new(2).unwrap();
        assert_eq!(decode_all(&mut dec, &data).unwrap(), [1, 1, 1]);
        assert!(dec.has_ended());
    }

    #[test]
    fn width_grows_with_table() {
        let mut dec = Decoder::new(2).unwrap();
        let data = payload(&[(4, 3), (0, 3), (6, 3), (5, 3)]);
        assert_eq!(decode_all(&mut dec, &data).unwrap(), [0, 0, 0]);
        assert!(dec.has_ended());
        assert_eq!(dec.next_code, 7);
        assert_eq!(dec.code_size, 3);
        dec.add(0, 0);
        assert_eq!(dec.next_code, 8);
        assert_eq!(dec.code_size, 4);
    }

    #[test]
    fn code_beyond_dictionary() {
        let data = payload(&[(4, 3), (1, 3), (7, 3)]);
        let mut dec = Decoder::new(2).unwrap();
        assert!(matches!(decode_all(&mut dec, &data), Err(GifError::CorruptData(_))));
    }

    #[test]
    fn first_code_must_be_literal() {
        let data = payload(&[(4, 3), (6, 3)]);
        let mut dec = Decoder::new(2).unwrap();
        assert!(matches!(decode_all(&mut dec, &data), Err(GifError::CorruptData(_))));
    }

    #[test]
    fn clear_resets_width() {
        let mut codes = vec![(4, 3), (0, 3)];
        // grow the table until codes are 4 bits wide
        codes.extend([(6, 3), (7, 3), (8, 4)]);
        codes.extend([(4, 4), (2, 3), (5, 3)]);
        let data = payload(&codes);
        let mut dec = Decoder::new(2).unwrap();
        let out = decode_all(&mut dec, &data).unwrap();
        assert_eq!(out, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        assert!(dec.has_ended());
    }

    #[test]
    fn stops_at_end_code() {
        let data = payload(&[(4, 3), (3, 3), (5, 3), (2, 3), (2, 3)]);
        let mut dec = Decoder::new(2).unwrap();
        let (consumed, pixels) = dec.decode_bytes(&data).unwrap();
        assert_eq!(pixels, [3]);
        let (_, pixels) = dec.decode_bytes(&data[consumed..]).unwrap();
        assert!(pixels.is_empty());
        assert!(dec.has_ended());
    }

    #[test]
    fn invalid_code_sizes() {
        assert!(Decoder::new(0).is_err());
        assert!(Decoder::new(9).is_err());
        assert!(Decoder::new(8).is_ok());
        assert!(Decoder::new(1).is_ok());
    }
}
