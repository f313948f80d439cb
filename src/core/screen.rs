//! Screen memory
//!
//! Linear glyph and colour planes standing in for the legacy character and colour RAM.
//! Address `row * cols + col` selects the same cell in both planes.

use std::collections::HashSet;
use thiserror::Error;

/// Blank glyph (space)
pub const BLANK_GLYPH: u8 = 0x20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenError {
    #[error("Address range {addr}..{addr}+{len} exceeds screen size {size}")]
    OutOfRange { addr: usize, len: usize, size: usize },

    #[error("Glyph and colour blocks differ in length ({glyphs} vs {colours})")]
    LengthMismatch { glyphs: usize, colours: usize },
}

pub type Result<T> = std::result::Result<T, ScreenError>;

/// One addressable screen position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenCell {
    pub glyph: u8,
    pub colour: u8,
}

impl ScreenCell {
    pub const fn new(glyph: u8, colour: u8) -> Self {
        Self { glyph, colour }
    }

    pub const fn blank(colour: u8) -> Self {
        Self::new(BLANK_GLYPH, colour)
    }
}

/// Which of the two parallel planes to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Glyph,
    Colour,
}

/// A copy of a block of cells from both planes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub glyphs: Vec<u8>,
    pub colours: Vec<u8>,
}

impl Block {
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Iterate the block as cells
    pub fn cells(&self) -> impl Iterator<Item = ScreenCell> + '_ {
        self.glyphs
            .iter()
            .zip(self.colours.iter())
            .map(|(&glyph, &colour)| ScreenCell::new(glyph, colour))
    }
}

/// Glyph and colour memory for one session
pub struct ScreenBuffer {
    pub cols: u16,
    pub rows: u16,
    glyphs: Vec<u8>,
    colours: Vec<u8>,
    /// Rows touched since the last `take_dirty_rows`
    dirty_lines: HashSet<usize>,
    /// Set when the whole screen must be redrawn
    pub full_redraw: bool,
    writes: u64,
}

impl ScreenBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_colour(cols, rows, 0)
    }

    /// Create a blank screen filled with `colour`
    pub fn with_colour(cols: u16, rows: u16, colour: u8) -> Self {
        let size = cols as usize * rows as usize;
        Self {
            cols,
            rows,
            glyphs: vec![BLANK_GLYPH; size],
            colours: vec![colour; size],
            dirty_lines: HashSet::new(),
            full_redraw: true,
            writes: 0,
        }
    }

    /// Number of addressable cells
    pub fn size(&self) -> usize {
        self.glyphs.len()
    }

    /// Total number of cell writes performed so far
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Address of the first cell of `row`
    pub fn row_addr(&self, row: u16) -> usize {
        row as usize * self.cols as usize
    }

    /// Validate that `addr..addr+len` lies inside the buffer
    pub fn check_range(&self, addr: usize, len: usize) -> Result<()> {
        match addr.checked_add(len) {
            Some(end) if end <= self.size() => Ok(()),
            _ => Err(ScreenError::OutOfRange {
                addr,
                len,
                size: self.size(),
            }),
        }
    }

    pub fn get_cell(&self, addr: usize) -> Result<ScreenCell> {
        self.check_range(addr, 1)?;
        Ok(ScreenCell::new(self.glyphs[addr], self.colours[addr]))
    }

    pub fn set_cell(&mut self, addr: usize, glyph: u8, colour: u8) -> Result<()> {
        self.check_range(addr, 1)?;
        self.glyphs[addr] = glyph;
        self.colours[addr] = colour;
        self.writes += 1;
        self.mark_dirty_range(addr, 1);
        Ok(())
    }

    pub fn get_block(&self, addr: usize, len: usize) -> Result<Block> {
        self.check_range(addr, len)?;
        Ok(Block {
            glyphs: self.glyphs[addr..addr + len].to_vec(),
            colours: self.colours[addr..addr + len].to_vec(),
        })
    }

    /// Read `len` bytes of a single plane
    pub fn peek_plane(&self, plane: Plane, addr: usize, len: usize) -> Result<&[u8]> {
        self.check_range(addr, len)?;
        let bytes = match plane {
            Plane::Glyph => &self.glyphs[addr..addr + len],
            Plane::Colour => &self.colours[addr..addr + len],
        };
        Ok(bytes)
    }

    pub fn set_block(&mut self, addr: usize, glyphs: &[u8], colours: &[u8]) -> Result<()> {
        if glyphs.len() != colours.len() {
            return Err(ScreenError::LengthMismatch {
                glyphs: glyphs.len(),
                colours: colours.len(),
            });
        }
        let len = glyphs.len();
        self.check_range(addr, len)?;
        self.glyphs[addr..addr + len].copy_from_slice(glyphs);
        self.colours[addr..addr + len].copy_from_slice(colours);
        self.writes += len as u64;
        self.mark_dirty_range(addr, len);
        Ok(())
    }

    /// Copy `len` cells from `src` to `dst` in both planes.
    ///
    /// The source is read out in full before the destination is touched, so
    /// overlapping ranges behave like `memmove`.
    pub fn copy_block(&mut self, src: usize, dst: usize, len: usize) -> Result<()> {
        self.check_range(src, len)?;
        self.check_range(dst, len)?;
        let block = self.get_block(src, len)?;
        self.set_block(dst, &block.glyphs, &block.colours)
    }

    /// Blank every cell with `colour`
    pub fn clear(&mut self, colour: u8) {
        self.glyphs.fill(BLANK_GLYPH);
        self.colours.fill(colour);
        self.writes += self.size() as u64;
        self.mark_all_dirty();
    }

    /// Iterate the cells of one row
    pub fn row_cells(&self, row: u16) -> impl Iterator<Item = ScreenCell> + '_ {
        let start = self.row_addr(row).min(self.size());
        let end = (start + self.cols as usize).min(self.size());
        self.glyphs[start..end]
            .iter()
            .zip(self.colours[start..end].iter())
            .map(|(&glyph, &colour)| ScreenCell::new(glyph, colour))
    }

    pub fn mark_dirty(&mut self, row: usize) {
        if row < self.rows as usize {
            self.dirty_lines.insert(row);
        }
    }

    fn mark_dirty_range(&mut self, addr: usize, len: usize) {
        if len == 0 || self.cols == 0 {
            return;
        }
        let cols = self.cols as usize;
        let first = addr / cols;
        let last = (addr + len - 1) / cols;
        for row in first..=last {
            self.mark_dirty(row);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        self.full_redraw = true;
    }

    /// Rows waiting to be redrawn, in ascending order
    pub fn dirty_rows(&self) -> Vec<usize> {
        let mut rows: Vec<_> = self.dirty_lines.iter().copied().collect();
        rows.sort_unstable();
        rows
    }

    /// Drain the dirty set; returns every row when a full redraw is pending
    pub fn take_dirty_rows(&mut self) -> Vec<usize> {
        if self.full_redraw {
            self.full_redraw = false;
            self.dirty_lines.clear();
            return (0..self.rows as usize).collect();
        }
        let rows = self.dirty_rows();
        self.dirty_lines.clear();
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_cell() {
        let mut screen = ScreenBuffer::new(40, 25);
        screen.set_cell(41, b'X', 7).unwrap();

        assert_eq!(screen.get_cell(41).unwrap(), ScreenCell::new(b'X', 7));
        assert_eq!(screen.get_cell(40).unwrap(), ScreenCell::blank(0));
        assert_eq!(screen.writes(), 1);
    }

    #[test]
    fn test_out_of_range() {
        let mut screen = ScreenBuffer::new(40, 25);

        assert!(matches!(
            screen.get_cell(1000),
            Err(ScreenError::OutOfRange { addr: 1000, len: 1, size: 1000 })
        ));
        assert!(screen.get_block(990, 11).is_err());
        assert!(screen.get_block(990, 10).is_ok());
        assert!(screen.check_range(usize::MAX, 2).is_err());

        // A failed block write leaves the buffer untouched
        assert!(screen.set_block(995, &[1; 6], &[1; 6]).is_err());
        assert_eq!(screen.writes(), 0);
        assert_eq!(screen.get_cell(995).unwrap(), ScreenCell::blank(0));
    }

    #[test]
    fn test_set_block_length_mismatch() {
        let mut screen = ScreenBuffer::new(40, 25);
        assert_eq!(
            screen.set_block(0, &[1, 2, 3], &[1, 2]),
            Err(ScreenError::LengthMismatch { glyphs: 3, colours: 2 })
        );
    }

    #[test]
    fn test_copy_block_overlap_forward() {
        let mut screen = ScreenBuffer::new(10, 1);
        screen.set_block(0, b"abcdefghij", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();

        screen.copy_block(0, 2, 6).unwrap();

        let block = screen.get_block(0, 10).unwrap();
        assert_eq!(block.glyphs, b"ababcdefij".to_vec());
        assert_eq!(block.colours, vec![0, 1, 0, 1, 2, 3, 4, 5, 8, 9]);
    }

    #[test]
    fn test_copy_block_overlap_backward() {
        let mut screen = ScreenBuffer::new(10, 1);
        screen.set_block(0, b"abcdefghij", &[0; 10]).unwrap();

        screen.copy_block(3, 1, 6).unwrap();

        assert_eq!(screen.peek_plane(Plane::Glyph, 0, 10).unwrap(), b"adefghihij");
    }

    #[test]
    fn test_dirty_rows() {
        let mut screen = ScreenBuffer::new(40, 25);
        assert_eq!(screen.take_dirty_rows().len(), 25);
        assert!(screen.take_dirty_rows().is_empty());

        screen.set_block(79, &[1, 1], &[1, 1]).unwrap();
        screen.set_cell(960, 1, 1).unwrap();

        assert_eq!(screen.take_dirty_rows(), vec![1, 2, 24]);
        assert!(screen.dirty_rows().is_empty());
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn copy_block_matches_memmove(
                data in prop::collection::vec(any::<u8>(), 64),
                src in 0usize..32,
                dst in 0usize..32,
                len in 0usize..32,
            ) {
                let mut screen = ScreenBuffer::new(64, 1);
                screen.set_block(0, &data, &data).unwrap();

                let mut expected = data.clone();
                expected.copy_within(src..src + len, dst);

                screen.copy_block(src, dst, len).unwrap();

                prop_assert_eq!(screen.peek_plane(Plane::Glyph, 0, 64).unwrap(), &expected[..]);
                prop_assert_eq!(screen.peek_plane(Plane::Colour, 0, 64).unwrap(), &expected[..]);
            }
        }
    }
}
