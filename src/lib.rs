//! ampcore - masked-pane console and ampersand dispatch for BBS front ends
//!
//! - **core**: screen buffer, blink cadence, masked-pane staging, line indicators
//! - **dispatch**: opcode tables, the standard handler set, `&` call scanning
//! - **session**: per-caller tick loop and the session manager
//! - **config**: TOML configuration and colour palettes
//! - **ui**: crossterm monitor rendering and key mapping

pub mod config;
pub mod core;
pub mod dispatch;
pub mod session;
pub mod ui;

pub use config::Config;
pub use session::{Session, SessionManager, SessionOptions};
