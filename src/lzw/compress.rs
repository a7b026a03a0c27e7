//! LZW compression of pixel indices
use std::io::Write;

use crate::error::{GifError, Result};

use super::bits::CodeWriter;
use super::{Code, MAX_CODES, MAX_CODE_SIZE};

/// Slots of the hash table, at least twice the number of codes
const TABLE_SIZE: usize = 2 * MAX_CODES;
const EMPTY: u32 = u32::MAX;

/// Open addressing map from (prefix code, suffix pixel) to code
struct Dictionary {
    keys: Box<[u32]>,
    codes: Box<[Code]>,
}

impl Dictionary {
    fn new() -> Dictionary {
        Dictionary {
            keys: vec![EMPTY; TABLE_SIZE].into_boxed_slice(),
            codes: vec![0; TABLE_SIZE].into_boxed_slice(),
        }
    }

    fn clear(&mut self) {
        self.keys.fill(EMPTY);
    }

    #[inline]
    fn key(prefix: Code, suffix: u8) -> u32 {
        ((prefix as u32) << 8) | suffix as u32
    }

    #[inline]
    fn slot(key: u32) -> usize {
        ((key >> 12) ^ key.wrapping_mul(0x9E37)) as usize & (TABLE_SIZE - 1)
    }

    #[inline]
    fn get(&self, prefix: Code, suffix: u8) -> Option<Code> {
        let key = Dictionary::key(prefix, suffix);
        let mut i = Dictionary::slot(key);
        loop {
            match self.keys[i] {
                EMPTY => return None,
                k if k == key => return Some(self.codes[i]),
                _ => i = (i + 1) & (TABLE_SIZE - 1),
            }
        }
    }

    fn insert(&mut self, prefix: Code, suffix: u8, code: Code) {
        let key = Dictionary::key(prefix, suffix);
        let mut i = Dictionary::slot(key);
        while self.keys[i] != EMPTY {
            i = (i + 1) & (TABLE_SIZE - 1);
        }
        self.keys[i] = key;
        self.codes[i] = code;
    }
}

/// Compression session for the data of one image.
///
/// Pixels may be fed in any number of calls to [`Encoder::encode_bytes`];
/// [`Encoder::finish`] writes the pending code, the end code and the block
/// terminator.
pub struct Encoder<W: Write> {
    w: CodeWriter<W>,
    dict: Dictionary,
    min_code_size: u8,
    code_size: u8,
    next_code: Code,
    /// Code of the string matched so far
    current: Option<Code>,
}

impl<W: Write> Encoder<W> {
    /// Starts a session and writes the initial clear code.
    pub fn new(w: W, min_code_size: u8) -> Result<Encoder<W>> {
        if !(2..=8).contains(&min_code_size) {
            return Err(GifError::OutOfRange("LZW minimum code size must be between 2 and 8"));
        }
        let mut enc = Encoder {
            w: CodeWriter::new(w),
            dict: Dictionary::new(),
            min_code_size,
            code_size: min_code_size + 1,
            next_code: 0,
            current: None,
        };
        enc.reset();
        enc.w.write_code(enc.clear_code(), enc.code_size)?;
        Ok(enc)
    }

    fn clear_code(&self) -> Code {
        1 << self.min_code_size
    }

    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    fn reset(&mut self) {
        self.dict.clear();
        self.code_size = self.min_code_size + 1;
        self.next_code = self.clear_code() + 2;
    }

    pub fn encode_bytes(&mut self, data: &[u8]) -> Result<()> {
        let clear_code = self.clear_code();
        for &pixel in data {
            if pixel as Code >= clear_code {
                return Err(GifError::OutOfRange("pixel does not fit the minimum code size"));
            }
            let prefix = match self.current {
                Some(prefix) => prefix,
                None => {
                    self.current = Some(pixel as Code);
                    continue;
                }
            };
            if let Some(code) = self.dict.get(prefix, pixel) {
                self.current = Some(code);
                continue;
            }
            self.w.write_code(prefix, self.code_size)?;
            self.current = Some(pixel as Code);

            self.dict.insert(prefix, pixel, self.next_code);
            self.next_code += 1;
            if self.next_code as usize > 1 << self.code_size {
                self.code_size += 1;
            }
            if self.next_code as usize == MAX_CODES {
                self.w.write_code(clear_code, self.code_size)?;
                self.reset();
            }
        }
        Ok(())
    }

    /// Ends the data and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if let Some(code) = self.current.take() {
            self.w.write_code(code, self.code_size)?;
            // the decoder adds one more entry for this code
            if self.next_code as usize >= 1 << self.code_size && self.code_size < MAX_CODE_SIZE {
                self.code_size += 1;
            }
        }
        self.w.write_code(self.end_code(), self.code_size)?;
        Ok(self.w.finish()?)
    }
}
