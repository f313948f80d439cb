//! User interface rendering and input handling.
//!
//! - **renderer**: Palette-mapped screen renderer and a plain-text dump
//! - **keymapper**: Keyboard input to monitor action mapping
//! - **input**: the monitor's input line and when it is staged

pub mod input;
pub mod keymapper;
pub mod renderer;

pub use input::InputLine;
pub use keymapper::*;
pub use renderer::*;
