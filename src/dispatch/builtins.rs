//! Standard handler set
//!
//! These opcodes expose the staging and indicator surfaces to the calling
//! program. Application routines (menus, transfers) register their own opcodes
//! on top of this set.

use std::sync::Arc;

use super::{HandlerError, OpcodeTable, OpcodeTableBuilder};
use crate::core::{Console, PANE_WIDTH};

/// Standard opcode numbers
pub mod op {
    pub const FILL_COLOUR: u8 = 0x01;
    pub const STAGE_FILL: u8 = 0x02;
    pub const COMMIT: u8 = 0x03;
    pub const RESTORE: u8 = 0x04;
    pub const PAUSE: u8 = 0x05;
    pub const ABORT: u8 = 0x06;
    pub const CARRIER: u8 = 0x07;
    pub const SPINNER: u8 = 0x08;
    pub const IDLE_DIGITS: u8 = 0x09;
    pub const BLINK: u8 = 0x0A;
    pub const POKE: u8 = 0x0B;
}

/// Add the standard handlers to `builder`
pub fn register(builder: OpcodeTableBuilder) -> OpcodeTableBuilder {
    builder
        .register(op::FILL_COLOUR, "fill-colour", |console: &mut Console, colour, _| {
            console.set_fill_colour(colour);
            Ok(())
        })
        .register(op::STAGE_FILL, "stage-fill", |console: &mut Console, glyph, colour| {
            console.staging.stage_fill(glyph, colour);
            Ok(())
        })
        .register(op::COMMIT, "commit", |console: &mut Console, _, _| {
            console.commit()?;
            Ok(())
        })
        .register(op::RESTORE, "restore", |console: &mut Console, _, _| {
            console.restore()?;
            Ok(())
        })
        .register(op::PAUSE, "pause", |console: &mut Console, on, _| {
            console.set_pause(on != 0)?;
            Ok(())
        })
        .register(op::ABORT, "abort", |console: &mut Console, on, _| {
            console.set_abort(on != 0)?;
            Ok(())
        })
        .register(op::CARRIER, "carrier", |console: &mut Console, up, _| {
            console.set_carrier(up != 0)?;
            Ok(())
        })
        .register(op::SPINNER, "spinner", |console: &mut Console, _, _| {
            console.advance_spinner()?;
            Ok(())
        })
        .register(op::IDLE_DIGITS, "idle-digits", |console: &mut Console, lo, hi| {
            console.update_idle_digits(u32::from(lo) | u32::from(hi) << 8)?;
            Ok(())
        })
        .register(op::BLINK, "blink", |console: &mut Console, _, _| {
            console.blink.tick();
            Ok(())
        })
        .register(op::POKE, "poke", poke)
}

/// Write one glyph into the live overlay row at column `col`
fn poke(console: &mut Console, col: u8, glyph: u8) -> Result<(), HandlerError> {
    if col as usize >= PANE_WIDTH {
        return Err(HandlerError::Rejected(format!(
            "column {} outside the {}-column pane",
            col, PANE_WIDTH
        )));
    }
    let addr = console.overlay_addr() + col as usize;
    let colour = console.staging.fill_colour();
    console.screen.set_cell(addr, glyph, colour)?;
    Ok(())
}

/// The base table every session starts from
pub fn standard_table() -> Arc<OpcodeTable> {
    register(OpcodeTable::builder()).build()
}
