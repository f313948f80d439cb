//! Status indicators
//!
//! Pause, abort, spinner, carrier and idle-timer cells on the status line.
//! Each cell remembers the byte it last wrote and skips the write when the
//! value would not change.

use tracing::debug;

use super::blink::BlinkCadenceScheduler;
use super::screen::{Result, ScreenBuffer, BLANK_GLYPH};

/// Glyph bit selecting reverse video
pub const REVERSE_BIT: u8 = 0x80;

/// Where and how each indicator is drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorLayout {
    pub pause_addr: usize,
    pub abort_addr: usize,
    pub spinner_addr: usize,
    /// Two cells that always show the same carrier glyph
    pub carrier_addrs: [usize; 2],
    pub minutes_addr: usize,
    /// Drawn once by `draw_static`, never by digit updates
    pub separator_addr: usize,
    pub tens_addr: usize,
    pub ones_addr: usize,

    pub pause_glyph: u8,
    pub abort_glyph: u8,
    pub carrier_glyph: u8,
    pub separator_glyph: u8,
    pub base_digit_glyph: u8,
    pub spinner_frames: Vec<u8>,
    pub colour: u8,
    /// Flash pause/abort in reverse video while the blink phase is reversed
    pub flash_with_blink: bool,
}

impl Default for IndicatorLayout {
    fn default() -> Self {
        // Status line on row 0 of a 40-column screen
        Self {
            pause_addr: 2,
            abort_addr: 3,
            spinner_addr: 5,
            carrier_addrs: [0, 39],
            minutes_addr: 33,
            separator_addr: 34,
            tens_addr: 35,
            ones_addr: 36,
            pause_glyph: b'P',
            abort_glyph: b'A',
            carrier_glyph: b'*',
            separator_glyph: b':',
            base_digit_glyph: b'0',
            spinner_frames: b"|/-\\".to_vec(),
            colour: 1,
            flash_with_blink: true,
        }
    }
}

impl IndicatorLayout {
    /// Every address the controller may write, including the separator
    pub fn addresses(&self) -> Vec<usize> {
        vec![
            self.pause_addr,
            self.abort_addr,
            self.spinner_addr,
            self.carrier_addrs[0],
            self.carrier_addrs[1],
            self.minutes_addr,
            self.separator_addr,
            self.tens_addr,
            self.ones_addr,
        ]
    }
}

/// A screen cell plus the last value written to it
#[derive(Debug, Clone, Copy)]
struct IndicatorCell {
    addr: usize,
    last: Option<u8>,
}

impl IndicatorCell {
    fn new(addr: usize) -> Self {
        Self { addr, last: None }
    }

    /// Write `glyph` unless it is already showing; returns whether a write happened
    fn apply(&mut self, screen: &mut ScreenBuffer, glyph: u8, colour: u8) -> Result<bool> {
        if self.last == Some(glyph) {
            return Ok(false);
        }
        screen.set_cell(self.addr, glyph, colour)?;
        self.last = Some(glyph);
        Ok(true)
    }

    /// Like `apply`, but a flag that was never set stays untouched
    fn refresh(&mut self, screen: &mut ScreenBuffer, active: bool, glyph: u8, colour: u8) -> Result<bool> {
        if !active && self.last.is_none() {
            return Ok(false);
        }
        self.apply(screen, glyph, colour)
    }
}

pub struct IndicatorController {
    layout: IndicatorLayout,
    pause: IndicatorCell,
    abort: IndicatorCell,
    spinner: IndicatorCell,
    carrier: [IndicatorCell; 2],
    digits: [IndicatorCell; 3],

    paused: bool,
    aborted: bool,
    connected: Option<bool>,
    spinner_enabled: bool,
    spinner_index: Option<usize>,
}

impl IndicatorController {
    pub fn new(layout: IndicatorLayout) -> Self {
        Self {
            pause: IndicatorCell::new(layout.pause_addr),
            abort: IndicatorCell::new(layout.abort_addr),
            spinner: IndicatorCell::new(layout.spinner_addr),
            carrier: [
                IndicatorCell::new(layout.carrier_addrs[0]),
                IndicatorCell::new(layout.carrier_addrs[1]),
            ],
            digits: [
                IndicatorCell::new(layout.minutes_addr),
                IndicatorCell::new(layout.tens_addr),
                IndicatorCell::new(layout.ones_addr),
            ],
            layout,
            paused: false,
            aborted: false,
            connected: None,
            spinner_enabled: true,
            spinner_index: None,
        }
    }

    pub fn layout(&self) -> &IndicatorLayout {
        &self.layout
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Last carrier state observed, if any
    pub fn carrier(&self) -> Option<bool> {
        self.connected
    }

    pub fn spinner_enabled(&self) -> bool {
        self.spinner_enabled
    }

    /// Forget every cached value and return to the start-of-session state
    pub fn reset(&mut self) {
        *self = Self::new(self.layout.clone());
    }

    /// Paint cells that never change during a session
    pub fn draw_static(&self, screen: &mut ScreenBuffer) -> Result<()> {
        screen.set_cell(
            self.layout.separator_addr,
            self.layout.separator_glyph,
            self.layout.colour,
        )
    }

    fn flag_glyph(&self, active: bool, glyph: u8, blink: &BlinkCadenceScheduler) -> u8 {
        match active {
            false => BLANK_GLYPH,
            true if self.layout.flash_with_blink && blink.reverse_active() => glyph | REVERSE_BIT,
            true => glyph,
        }
    }

    pub fn set_pause(
        &mut self,
        screen: &mut ScreenBuffer,
        blink: &BlinkCadenceScheduler,
        active: bool,
    ) -> Result<()> {
        let glyph = self.flag_glyph(active, self.layout.pause_glyph, blink);
        self.pause.apply(screen, glyph, self.layout.colour)?;
        self.paused = active;
        Ok(())
    }

    pub fn set_abort(
        &mut self,
        screen: &mut ScreenBuffer,
        blink: &BlinkCadenceScheduler,
        active: bool,
    ) -> Result<()> {
        let glyph = self.flag_glyph(active, self.layout.abort_glyph, blink);
        self.abort.apply(screen, glyph, self.layout.colour)?;
        self.aborted = active;
        Ok(())
    }

    /// Re-evaluate pause/abort against the current blink phase.
    ///
    /// Returns whether either cell was rewritten.
    pub fn refresh_flash(
        &mut self,
        screen: &mut ScreenBuffer,
        blink: &BlinkCadenceScheduler,
    ) -> Result<bool> {
        let pause = self.flag_glyph(self.paused, self.layout.pause_glyph, blink);
        let abort = self.flag_glyph(self.aborted, self.layout.abort_glyph, blink);
        let colour = self.layout.colour;
        let wrote_pause = self.pause.refresh(screen, self.paused, pause, colour)?;
        let wrote_abort = self.abort.refresh(screen, self.aborted, abort, colour)?;
        Ok(wrote_pause || wrote_abort)
    }

    /// Show the next spinner frame, or keep the cell blank while carrier is down
    pub fn advance_spinner(&mut self, screen: &mut ScreenBuffer) -> Result<()> {
        let colour = self.layout.colour;
        if !self.spinner_enabled {
            self.spinner.apply(screen, BLANK_GLYPH, colour)?;
            return Ok(());
        }
        let frames = &self.layout.spinner_frames;
        if frames.is_empty() {
            return Ok(());
        }
        let index = self.spinner_index.map_or(0, |i| (i + 1) % frames.len());
        let glyph = frames[index];
        self.spinner.apply(screen, glyph, colour)?;
        self.spinner_index = Some(index);
        Ok(())
    }

    /// Update both carrier cells together.
    ///
    /// Both addresses are checked before either is written, so the pair never
    /// disagrees. Carrier loss also blanks and stops the spinner.
    pub fn set_carrier(&mut self, screen: &mut ScreenBuffer, connected: bool) -> Result<()> {
        for cell in &self.carrier {
            screen.check_range(cell.addr, 1)?;
        }
        if !connected {
            screen.check_range(self.spinner.addr, 1)?;
        }

        let glyph = if connected {
            self.layout.carrier_glyph
        } else {
            BLANK_GLYPH
        };
        let colour = self.layout.colour;
        for cell in &mut self.carrier {
            cell.apply(screen, glyph, colour)?;
        }

        if !connected {
            self.spinner.apply(screen, BLANK_GLYPH, colour)?;
        }
        if self.connected != Some(connected) {
            debug!("Carrier {}", if connected { "up" } else { "down" });
        }
        self.spinner_enabled = connected;
        self.connected = Some(connected);
        Ok(())
    }

    /// Render elapsed idle time as `m:ss` (minutes wrap at 10)
    pub fn update_idle_digits(&mut self, screen: &mut ScreenBuffer, elapsed_seconds: u32) -> Result<()> {
        let minutes = (elapsed_seconds / 60) % 10;
        let tens = (elapsed_seconds % 60) / 10;
        let ones = (elapsed_seconds % 60) % 10;

        for cell in &self.digits {
            screen.check_range(cell.addr, 1)?;
        }

        let base = self.layout.base_digit_glyph;
        let colour = self.layout.colour;
        for (cell, digit) in self.digits.iter_mut().zip([minutes, tens, ones]) {
            cell.apply(screen, base.wrapping_add(digit as u8), colour)?;
        }
        Ok(())
    }
}
