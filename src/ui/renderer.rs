//! Screen renderer using crossterm
//!
//! Draws the colour-indexed screen buffer through a palette. Only rows the
//! buffer reports dirty are redrawn; a full redraw is requested after resize.

use std::collections::HashMap;
use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use crate::config::Palette;
use crate::core::indicator::REVERSE_BIT;
use crate::core::ScreenBuffer;

/// Display character for a glyph byte, plus whether it draws reversed.
///
/// Low screen codes 0x00-0x1F show as `@A..Z[\]^_`.
pub fn glyph_char(glyph: u8) -> (char, bool) {
    let reversed = glyph & REVERSE_BIT != 0;
    let ch = match glyph & !REVERSE_BIT {
        code @ 0x00..=0x1F => char::from(code + 0x40),
        code @ 0x20..=0x7E => char::from(code),
        _ => '.',
    };
    (ch, reversed)
}

/// Plain-text dump of the glyph plane, one line per row
pub fn dump_text(screen: &ScreenBuffer) -> String {
    let mut out = String::with_capacity(screen.size() + screen.rows as usize);
    for row in 0..screen.rows {
        let line: String = screen
            .row_cells(row)
            .map(|cell| glyph_char(cell.glyph).0)
            .collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Terminal renderer
pub struct Renderer {
    palette: Palette,
    /// Colour index shown behind every glyph
    background: u8,
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Status text last drawn per terminal row
    last_status: HashMap<u16, String>,
}

impl Renderer {
    pub fn new(palette: Palette, background: u8) -> Self {
        Self {
            palette,
            background,
            initialized: false,
            last_status: HashMap::new(),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Raw mode must go even if the rest failed
        terminal::disable_raw_mode()?;
        Ok(())
    }

    /// Redraw whatever the buffer marked dirty since the last call
    pub fn render(&mut self, screen: &mut ScreenBuffer) -> io::Result<()> {
        let rows = screen.take_dirty_rows();
        if rows.is_empty() {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(16384, stdout.lock());

        // Begin synchronized update (reduces flicker)
        write!(stdout, "\x1b[?2026h")?;
        for row in rows {
            self.render_row(&mut stdout, screen, row as u16)?;
        }
        execute!(stdout, ResetColor)?;
        write!(stdout, "\x1b[?2026l")?;
        stdout.flush()
    }

    /// Draw one row, changing colours only between runs
    fn render_row<W: Write>(&self, out: &mut W, screen: &ScreenBuffer, row: u16) -> io::Result<()> {
        execute!(out, MoveTo(0, row))?;

        let mut run = String::new();
        let mut run_colours = None;
        for cell in screen.row_cells(row) {
            let (ch, reversed) = glyph_char(cell.glyph);
            let colours = if reversed {
                (self.background, cell.colour)
            } else {
                (cell.colour, self.background)
            };
            if run_colours != Some(colours) {
                self.flush_run(out, &mut run, run_colours)?;
                run_colours = Some(colours);
            }
            run.push(ch);
        }
        self.flush_run(out, &mut run, run_colours)
    }

    fn flush_run<W: Write>(&self, out: &mut W, run: &mut String, colours: Option<(u8, u8)>) -> io::Result<()> {
        if let Some((fg, bg)) = colours {
            if !run.is_empty() {
                execute!(
                    out,
                    SetForegroundColor(self.palette.colour(fg).to_crossterm()),
                    SetBackgroundColor(self.palette.colour(bg).to_crossterm()),
                    Print(run.as_str())
                )?;
            }
        }
        run.clear();
        Ok(())
    }

    /// Status line drawn below the screen in default terminal colours
    pub fn render_status(&mut self, row: u16, text: &str) -> io::Result<()> {
        if self.last_status.get(&row).map(String::as_str) == Some(text) {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            ResetColor,
            MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            Print(text)
        )?;
        stdout.flush()?;
        self.last_status.insert(row, text.to_string());
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
