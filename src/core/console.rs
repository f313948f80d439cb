//! Per-session device set
//!
//! Everything the legacy machine kept at fixed addresses lives here as owned
//! fields. Opcode handlers receive a `&mut Console`; nothing is shared between
//! sessions.

use super::blink::BlinkCadenceScheduler;
use super::indicator::{IndicatorController, IndicatorLayout};
use super::screen::{self, Block, Plane, ScreenBuffer, ScreenCell};
use super::staging::{self, StagingEngine};

pub struct Console {
    pub screen: ScreenBuffer,
    pub blink: BlinkCadenceScheduler,
    pub staging: StagingEngine,
    pub indicators: IndicatorController,
}

impl Console {
    /// Build a console whose masked pane sits at the start of `overlay_row`
    pub fn new(
        cols: u16,
        rows: u16,
        background: u8,
        overlay_row: u16,
        fill_colour: u8,
        layout: IndicatorLayout,
    ) -> screen::Result<Self> {
        let screen = ScreenBuffer::with_colour(cols, rows, background);
        let overlay_addr = screen.row_addr(overlay_row);
        let mut console = Self {
            screen,
            blink: BlinkCadenceScheduler::new(),
            staging: StagingEngine::new(overlay_addr, fill_colour),
            indicators: IndicatorController::new(layout),
        };
        console.indicators.draw_static(&mut console.screen)?;
        Ok(console)
    }

    // Masked pane

    pub fn stage(&mut self, glyphs: &[u8], colours: &[u8]) -> staging::Result<()> {
        self.staging.stage(glyphs, colours)
    }

    pub fn commit(&mut self) -> staging::Result<()> {
        self.staging.commit(&mut self.screen)
    }

    pub fn restore(&mut self) -> staging::Result<()> {
        self.staging.restore(&mut self.screen)
    }

    pub fn set_fill_colour(&mut self, colour: u8) {
        self.staging.set_fill_colour(colour);
    }

    // Indicators

    pub fn set_pause(&mut self, active: bool) -> screen::Result<()> {
        self.indicators.set_pause(&mut self.screen, &self.blink, active)
    }

    pub fn set_abort(&mut self, active: bool) -> screen::Result<()> {
        self.indicators.set_abort(&mut self.screen, &self.blink, active)
    }

    pub fn advance_spinner(&mut self) -> screen::Result<()> {
        self.indicators.advance_spinner(&mut self.screen)
    }

    pub fn set_carrier(&mut self, connected: bool) -> screen::Result<()> {
        self.indicators.set_carrier(&mut self.screen, connected)
    }

    pub fn update_idle_digits(&mut self, elapsed_seconds: u32) -> screen::Result<()> {
        self.indicators.update_idle_digits(&mut self.screen, elapsed_seconds)
    }

    /// Re-render flashing indicators for the current blink phase
    pub fn refresh_flash(&mut self) -> screen::Result<bool> {
        self.indicators.refresh_flash(&mut self.screen, &self.blink)
    }

    // Read surface

    pub fn peek_cell(&self, addr: usize) -> screen::Result<ScreenCell> {
        self.screen.get_cell(addr)
    }

    pub fn peek_block(&self, addr: usize, len: usize) -> screen::Result<Block> {
        self.screen.get_block(addr, len)
    }

    pub fn peek_plane(&self, plane: Plane, addr: usize, len: usize) -> screen::Result<&[u8]> {
        self.screen.peek_plane(plane, addr, len)
    }

    pub fn overlay_addr(&self) -> usize {
        self.staging.overlay_addr()
    }

    /// Return blink, staging and indicators to their start-of-session state
    pub fn reset(&mut self, background: u8, fill_colour: u8) -> screen::Result<()> {
        self.screen.clear(background);
        self.blink.reset();
        self.staging.reset(fill_colour);
        self.indicators.reset();
        self.indicators.draw_static(&mut self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::screen::BLANK_GLYPH;
    use crate::core::staging::PANE_WIDTH;

    fn console() -> Console {
        Console::new(40, 25, 6, 24, 1, IndicatorLayout::default()).unwrap()
    }

    #[test]
    fn test_end_to_end_overlay() {
        let mut console = console();
        let overlay = console.overlay_addr();
        assert_eq!(overlay, 960);

        console.stage(&[b'A'; PANE_WIDTH], &[2; PANE_WIDTH]).unwrap();
        console.commit().unwrap();
        let block = console.peek_block(overlay, PANE_WIDTH).unwrap();
        assert!(block.cells().all(|c| c == ScreenCell::new(b'A', 2)));

        console.commit().unwrap();
        let block = console.peek_block(overlay, PANE_WIDTH).unwrap();
        assert!(block.cells().all(|c| c == ScreenCell::blank(1)));
    }

    #[test]
    fn test_new_draws_separator() {
        let console = console();
        assert_eq!(console.peek_cell(34).unwrap().glyph, b':');
        assert_eq!(console.peek_cell(35).unwrap(), ScreenCell::blank(6));
    }

    #[test]
    fn test_reset() {
        let mut console = console();
        console.set_pause(true).unwrap();
        console.blink.tick();
        console.stage(&[b'A'; PANE_WIDTH], &[2; PANE_WIDTH]).unwrap();

        console.reset(0, 3).unwrap();

        assert_eq!(console.blink.state(), 3);
        assert!(!console.staging.is_staged());
        assert!(!console.indicators.paused());
        assert_eq!(console.peek_cell(2).unwrap(), ScreenCell::new(BLANK_GLYPH, 0));
        assert_eq!(console.peek_cell(34).unwrap().glyph, b':');
    }
}
