//! Masked pane staging
//!
//! The bottom overlay row is never written directly. Producers stage the next
//! frame, and `commit` rotates it into the live row in one step:
//!
//! ```text
//! stage() ──> Next ──commit──> Current ──> overlay row
//!              ^
//!              └── reset to blank + fill colour
//! ```
//!
//! Every commit consumes the staged payload exactly once. A producer that does
//! not re-stage before the next commit gets a blank row.

use thiserror::Error;
use tracing::debug;

use super::screen::{ScreenBuffer, ScreenError, BLANK_GLYPH};

/// Width of the masked pane in cells
pub const PANE_WIDTH: usize = 40;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StagingError {
    #[error("Staged row must be 40 bytes (glyphs: {glyphs}, colours: {colours})")]
    InvalidPayloadLength { glyphs: usize, colours: usize },

    #[error(transparent)]
    Screen(#[from] ScreenError),
}

pub type Result<T> = std::result::Result<T, StagingError>;

/// One pane-wide row of glyphs and colours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneRow {
    pub glyphs: [u8; PANE_WIDTH],
    pub colours: [u8; PANE_WIDTH],
}

impl PaneRow {
    pub const fn blank(colour: u8) -> Self {
        Self::filled(BLANK_GLYPH, colour)
    }

    pub const fn filled(glyph: u8, colour: u8) -> Self {
        Self {
            glyphs: [glyph; PANE_WIDTH],
            colours: [colour; PANE_WIDTH],
        }
    }

    /// Build a row from slices that must both be exactly `PANE_WIDTH` long
    pub fn from_slices(glyphs: &[u8], colours: &[u8]) -> Result<Self> {
        let invalid = || StagingError::InvalidPayloadLength {
            glyphs: glyphs.len(),
            colours: colours.len(),
        };
        Ok(Self {
            glyphs: glyphs.try_into().map_err(|_| invalid())?,
            colours: colours.try_into().map_err(|_| invalid())?,
        })
    }

    /// Lay out the tail of `text` left-aligned in one colour, blank padded.
    /// Anything outside printable ASCII becomes `?`.
    pub fn from_text(text: &str, colour: u8) -> Self {
        let mut row = Self::blank(colour);
        let chars: Vec<char> = text.chars().collect();
        let tail = &chars[chars.len().saturating_sub(PANE_WIDTH)..];
        for (slot, ch) in row.glyphs.iter_mut().zip(tail) {
            *slot = match *ch {
                ' '..='~' => *ch as u8,
                _ => b'?',
            };
        }
        row
    }
}

/// Staging buffers for the masked pane
pub struct StagingEngine {
    /// Address of the first cell of the live overlay row
    overlay_addr: usize,
    current: PaneRow,
    next: PaneRow,
    fill_colour: u8,
    /// Whether `next` holds a producer payload rather than the reset blank row
    staged: bool,
}

impl StagingEngine {
    pub fn new(overlay_addr: usize, fill_colour: u8) -> Self {
        Self {
            overlay_addr,
            current: PaneRow::blank(fill_colour),
            next: PaneRow::blank(fill_colour),
            fill_colour,
            staged: false,
        }
    }

    pub fn overlay_addr(&self) -> usize {
        self.overlay_addr
    }

    pub fn fill_colour(&self) -> u8 {
        self.fill_colour
    }

    /// Snapshot most recently committed to the overlay row
    pub fn current(&self) -> &PaneRow {
        &self.current
    }

    /// Row the next commit will apply
    pub fn pending(&self) -> &PaneRow {
        &self.next
    }

    pub fn is_staged(&self) -> bool {
        self.staged
    }

    /// Replace the pending row wholesale.
    ///
    /// Both slices must be exactly `PANE_WIDTH` bytes; otherwise nothing changes.
    pub fn stage(&mut self, glyphs: &[u8], colours: &[u8]) -> Result<()> {
        self.next = PaneRow::from_slices(glyphs, colours)?;
        self.staged = true;
        Ok(())
    }

    /// Stage a row of one glyph in one colour
    pub fn stage_fill(&mut self, glyph: u8, colour: u8) {
        self.next = PaneRow::filled(glyph, colour);
        self.staged = true;
    }

    /// Colour used for the blank row left behind by each commit
    pub fn set_fill_colour(&mut self, colour: u8) {
        self.fill_colour = colour;
        if !self.staged {
            self.next = PaneRow::blank(colour);
        }
    }

    /// Rotate the pending row into the overlay.
    ///
    /// The overlay range is validated before anything moves, so on error both
    /// the screen and the staging buffers are exactly as they were.
    pub fn commit(&mut self, screen: &mut ScreenBuffer) -> Result<()> {
        screen.check_range(self.overlay_addr, PANE_WIDTH)?;

        let snapshot = self.next;
        let cleared = PaneRow::blank(self.fill_colour);

        screen.set_block(self.overlay_addr, &snapshot.glyphs, &snapshot.colours)?;
        self.current = snapshot;
        self.next = cleared;
        self.staged = false;

        debug!("Masked pane committed at {}", self.overlay_addr);
        Ok(())
    }

    /// Repaint the last committed snapshot without rotating
    pub fn restore(&self, screen: &mut ScreenBuffer) -> Result<()> {
        screen.set_block(self.overlay_addr, &self.current.glyphs, &self.current.colours)?;
        Ok(())
    }

    /// Drop all staged content and return to the initial blank state
    pub fn reset(&mut self, fill_colour: u8) {
        *self = Self::new(self.overlay_addr, fill_colour);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::screen::Plane;

    const OVERLAY: usize = 960;

    fn setup() -> (ScreenBuffer, StagingEngine) {
        (ScreenBuffer::new(40, 25), StagingEngine::new(OVERLAY, 1))
    }

    fn overlay(screen: &ScreenBuffer) -> (Vec<u8>, Vec<u8>) {
        let block = screen.get_block(OVERLAY, PANE_WIDTH).unwrap();
        (block.glyphs, block.colours)
    }

    #[test]
    fn test_stage_is_invisible_until_commit() {
        let (mut screen, mut engine) = setup();
        engine.stage(&[b'A'; 40], &[2; 40]).unwrap();

        assert_eq!(overlay(&screen).0, vec![BLANK_GLYPH; 40]);

        engine.commit(&mut screen).unwrap();
        assert_eq!(overlay(&screen), (vec![b'A'; 40], vec![2; 40]));
        assert_eq!(engine.current(), &PaneRow::filled(b'A', 2));
        assert_eq!(engine.pending(), &PaneRow::blank(1));
    }

    #[test]
    fn test_row_from_text() {
        let row = PaneRow::from_text("HI é", 5);
        assert_eq!(&row.glyphs[..5], b"HI ? ");
        assert_eq!(row.colours, [5; PANE_WIDTH]);

        let long: String = (0..50).map(|i| char::from(b'A' + (i % 26) as u8)).collect();
        let row = PaneRow::from_text(&long, 1);
        assert_eq!(row.glyphs[0], b'K');
        assert_eq!(row.glyphs[39], b'X');
    }

    #[test]
    fn test_second_stage_replaces_first() {
        let (mut screen, mut engine) = setup();
        let mut first = [b'x'; 40];
        first[0] = b'F';
        engine.stage(&first, &[5; 40]).unwrap();
        engine.stage(&[b'S'; 40], &[6; 40]).unwrap();
        engine.commit(&mut screen).unwrap();

        assert_eq!(overlay(&screen), (vec![b'S'; 40], vec![6; 40]));
    }

    #[test]
    fn test_commit_without_restage_blanks_row() {
        let (mut screen, mut engine) = setup();
        engine.stage(&[b'A'; 40], &[2; 40]).unwrap();
        engine.commit(&mut screen).unwrap();
        engine.set_fill_colour(9);
        engine.commit(&mut screen).unwrap();

        assert_eq!(overlay(&screen), (vec![BLANK_GLYPH; 40], vec![9; 40]));
    }

    #[test]
    fn test_fill_colour_does_not_touch_staged_payload() {
        let (mut screen, mut engine) = setup();
        engine.stage(&[b'A'; 40], &[2; 40]).unwrap();
        engine.set_fill_colour(9);
        engine.commit(&mut screen).unwrap();

        assert_eq!(screen.peek_plane(Plane::Colour, OVERLAY, 40).unwrap(), &[2u8; 40][..]);
        assert_eq!(engine.pending(), &PaneRow::blank(9));
    }

    #[test]
    fn test_invalid_payload_length() {
        let (_, mut engine) = setup();
        engine.stage(&[b'A'; 40], &[2; 40]).unwrap();

        let err = engine.stage(&[b'B'; 39], &[3; 40]).unwrap_err();
        assert_eq!(err, StagingError::InvalidPayloadLength { glyphs: 39, colours: 40 });
        assert!(engine.stage(&[b'B'; 40], &[3; 41]).is_err());

        assert_eq!(engine.pending(), &PaneRow::filled(b'A', 2));
    }

    #[test]
    fn test_failed_commit_changes_nothing() {
        let mut screen = ScreenBuffer::new(40, 25);
        let mut engine = StagingEngine::new(980, 1);
        engine.stage(&[b'A'; 40], &[2; 40]).unwrap();

        assert!(matches!(
            engine.commit(&mut screen),
            Err(StagingError::Screen(ScreenError::OutOfRange { .. }))
        ));
        assert_eq!(screen.writes(), 0);
        assert_eq!(engine.pending(), &PaneRow::filled(b'A', 2));
        assert_eq!(engine.current(), &PaneRow::blank(1));
        assert!(engine.is_staged());
    }

    #[test]
    fn test_restore_repaints_snapshot() {
        let (mut screen, mut engine) = setup();
        engine.stage_fill(b'Q', 4);
        engine.commit(&mut screen).unwrap();

        screen.set_cell(OVERLAY + 3, b'z', 0).unwrap();
        engine.restore(&mut screen).unwrap();

        assert_eq!(overlay(&screen), (vec![b'Q'; 40], vec![4; 40]));
        // restore does not consume anything
        assert_eq!(engine.pending(), &PaneRow::blank(1));
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn payload_is_consumed_exactly_once(
                glyphs in prop::collection::vec(any::<u8>(), PANE_WIDTH),
                colours in prop::collection::vec(any::<u8>(), PANE_WIDTH),
                fill in any::<u8>(),
            ) {
                let mut screen = ScreenBuffer::new(40, 25);
                let mut engine = StagingEngine::new(OVERLAY, fill);

                engine.stage(&glyphs, &colours).unwrap();
                engine.commit(&mut screen).unwrap();
                let block = screen.get_block(OVERLAY, PANE_WIDTH).unwrap();
                prop_assert_eq!(&block.glyphs, &glyphs);
                prop_assert_eq!(&block.colours, &colours);

                engine.commit(&mut screen).unwrap();
                let block = screen.get_block(OVERLAY, PANE_WIDTH).unwrap();
                prop_assert_eq!(block.glyphs, vec![BLANK_GLYPH; PANE_WIDTH]);
                prop_assert_eq!(block.colours, vec![fill; PANE_WIDTH]);
            }
        }
    }
}
