//! Monitor input line
//!
//! Edits are staged into the masked pane once per tick. A submitted line is
//! handed to the scanner and never staged, so whatever its opcodes drew in the
//! pane stays visible.

use crate::core::PaneRow;

use super::MonitorAction;

#[derive(Debug, Default)]
pub struct InputLine {
    text: String,
    edited: bool,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply an editing action; returns false for anything that is not an edit
    pub fn edit(&mut self, action: MonitorAction) -> bool {
        match action {
            MonitorAction::Insert(ch) => {
                self.text.push(ch);
                self.edited = true;
            }
            MonitorAction::Backspace => {
                self.edited |= self.text.pop().is_some();
            }
            MonitorAction::ClearLine => {
                self.edited |= !self.text.is_empty();
                self.text.clear();
            }
            _ => return false,
        }
        true
    }

    /// Take the line for the scanner and drop any unstaged edit
    pub fn submit(&mut self) -> String {
        self.edited = false;
        std::mem::take(&mut self.text)
    }

    /// The row to stage, if the line changed since the last call
    pub fn take_payload(&mut self, colour: u8) -> Option<PaneRow> {
        if !std::mem::take(&mut self.edited) {
            return None;
        }
        Some(PaneRow::from_text(&self.text, colour))
    }
}
