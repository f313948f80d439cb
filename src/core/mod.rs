//! Core display components.
//!
//! This module contains the per-session display state:
//!
//! - **screen**: glyph and colour planes with block primitives
//! - **blink**: five-phase reverse-video cadence
//! - **staging**: masked pane staging buffers and commit rotation
//! - **indicator**: pause/abort/spinner/carrier/idle-timer status cells
//! - **console**: the device set handed to opcode handlers
//!
//! # Architecture
//!
//! ```text
//! Console
//! ├── ScreenBuffer (glyph plane + colour plane)
//! ├── BlinkCadenceScheduler
//! ├── StagingEngine ──commit──> overlay row
//! └── IndicatorController ──> status line cells
//! ```

pub mod screen;
pub mod blink;
pub mod staging;
pub mod indicator;
pub mod console;

pub use blink::BlinkCadenceScheduler;
pub use console::Console;
pub use indicator::{IndicatorController, IndicatorLayout};
pub use screen::{Block, Plane, ScreenBuffer, ScreenCell, ScreenError, BLANK_GLYPH};
pub use staging::{PaneRow, StagingEngine, StagingError, PANE_WIDTH};
