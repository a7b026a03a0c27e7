//! Row order of interlaced images

/// First row of each of the four interlace passes
pub const INTERLACED_OFFSET: [usize; 4] = [0, 4, 2, 1];
/// Row distance within each interlace pass
pub const INTERLACED_JUMPS: [usize; 4] = [8, 8, 4, 2];

/// Yields the display row of every row in stream order.
#[derive(Debug, Clone)]
pub struct InterlaceIterator {
    height: usize,
    interlaced: bool,
    pass: usize,
    row: usize,
}

impl InterlaceIterator {
    pub fn new(height: usize, interlaced: bool) -> InterlaceIterator {
        InterlaceIterator { height, interlaced, pass: 0, row: 0 }
    }
}

impl Iterator for InterlaceIterator {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if !self.interlaced {
            if self.row < self.height {
                self.row += 1;
                return Some(self.row - 1);
            }
            return None;
        }
        while self.pass < INTERLACED_OFFSET.len() {
            if self.row < self.height {
                let row = self.row;
                self.row += INTERLACED_JUMPS[self.pass];
                return Some(row);
            }
            self.pass += 1;
            if self.pass < INTERLACED_OFFSET.len() {
                self.row = INTERLACED_OFFSET[self.pass];
            }
        }
        None
    }
}

/// Reorders display-order rows into stream order.
pub fn interlace(raster: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(raster.len());
    if width == 0 {
        return out;
    }
    let lines: Vec<&[u8]> = raster.chunks_exact(width).collect();
    for row in InterlaceIterator::new(height, true) {
        if let Some(line) = lines.get(row) {
            out.extend_from_slice(line);
        }
    }
    out
}

/// Reorders stream-order rows into display order.
pub fn deinterlace(raster: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0; raster.len()];
    if width == 0 {
        return out;
    }
    let lines = raster.chunks_exact(width);
    for (row, line) in InterlaceIterator::new(height, true).zip(lines) {
        if let Some(dst) = out.get_mut(row * width..(row + 1) * width) {
            dst.copy_from_slice(line);
        }
    }
    out
}
