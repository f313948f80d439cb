//! Ampersand opcode dispatch.
//!
//! The calling program issues numbered native-routine calls carrying up to
//! two byte arguments. This module resolves those calls to handlers.
//!
//! - **table**: the shared base opcode table and the per-session override layer
//! - **builtins**: the standard handler set registered at startup
//! - **scanner**: finds `&` calls inside statement text and evaluates their arguments
//!
//! # Call flow
//!
//! ```text
//! "&3,65,2"  --scanner-->  AmpCall { opcode: 3, arg1: 65, arg2: 2 }
//!            --Dispatcher::call-->  SessionTable (override, then base)
//!            --handler(&mut Console, 65, 2)-->  Ok / DispatchError
//! ```

pub mod table;
pub mod builtins;
pub mod scanner;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::core::{Console, ScreenError, StagingError};

pub use table::{Handler, OpcodeTable, OpcodeTableBuilder, SessionTable};

/// Failure reported by a handler
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Screen(#[from] ScreenError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("{0}")]
    Rejected(String),

    /// The handler asks for the session to end
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Opcode {opcode:#04x} ({name}) failed: {cause}")]
    Handler {
        opcode: u8,
        name: String,
        #[source]
        cause: HandlerError,
    },
}

impl DispatchError {
    pub fn is_fatal(&self) -> bool {
        match self {
            DispatchError::UnknownOpcode(_) => false,
            DispatchError::Handler { cause, .. } => cause.is_fatal(),
        }
    }
}

/// One decoded ampersand call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmpCall {
    pub opcode: u8,
    pub arg1: u8,
    pub arg2: u8,
}

impl AmpCall {
    pub const fn new(opcode: u8, arg1: u8, arg2: u8) -> Self {
        Self { opcode, arg1, arg2 }
    }
}

impl fmt::Display for AmpCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{},{},{}", self.opcode, self.arg1, self.arg2)
    }
}

/// Resolves opcodes for one session and runs their handlers
pub struct Dispatcher {
    table: SessionTable,
}

impl Dispatcher {
    pub fn new(base: Arc<OpcodeTable>) -> Self {
        Self {
            table: SessionTable::new(base),
        }
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SessionTable {
        &mut self.table
    }

    /// Run the handler for `opcode` with the two register arguments.
    ///
    /// An unregistered opcode touches nothing and yields `UnknownOpcode`.
    pub fn call(
        &self,
        console: &mut Console,
        opcode: u8,
        arg1: u8,
        arg2: u8,
    ) -> Result<(), DispatchError> {
        let handler = self
            .table
            .resolve(opcode)
            .ok_or(DispatchError::UnknownOpcode(opcode))?;

        debug!("Dispatch &{},{},{} -> {}", opcode, arg1, arg2, handler.name());
        handler
            .invoke(console, arg1, arg2)
            .map_err(|cause| DispatchError::Handler {
                opcode,
                name: handler.name().to_string(),
                cause,
            })
    }

    pub fn dispatch(&self, console: &mut Console, call: AmpCall) -> Result<(), DispatchError> {
        self.call(console, call.opcode, call.arg1, call.arg2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IndicatorLayout;

    fn console() -> Console {
        Console::new(40, 25, 6, 24, 1, IndicatorLayout::default()).unwrap()
    }

    #[test]
    fn test_unknown_opcode_leaves_buffers_alone() {
        let mut console = console();
        let dispatcher = Dispatcher::new(builtins::standard_table());
        let before = console.peek_block(0, 1000).unwrap();
        let writes = console.screen.writes();

        let err = dispatcher.call(&mut console, 0xFF, 0, 0).unwrap_err();

        assert!(matches!(err, DispatchError::UnknownOpcode(0xFF)));
        assert!(!err.is_fatal());
        assert_eq!(console.peek_block(0, 1000).unwrap(), before);
        assert_eq!(console.screen.writes(), writes);
        assert!(!console.staging.is_staged());
    }

    #[test]
    fn test_handler_receives_arguments() {
        let mut console = console();
        let base = OpcodeTable::builder()
            .register(0x40, "poke-row0", |console: &mut Console, arg1, arg2| {
                console.screen.set_cell(arg1 as usize, arg2, 7)?;
                Ok(())
            })
            .build();
        let dispatcher = Dispatcher::new(base);

        dispatcher.dispatch(&mut console, AmpCall::new(0x40, 10, b'Z')).unwrap();

        assert_eq!(console.peek_cell(10).unwrap().glyph, b'Z');
    }

    #[test]
    fn test_handler_error_carries_cause() {
        let mut console = console();
        let base = OpcodeTable::builder()
            .register(0x41, "far-poke", |console: &mut Console, _, _| {
                console.screen.set_cell(5000, 0, 0)?;
                Ok(())
            })
            .register(0x42, "halt", |_: &mut Console, _, _| {
                Err(HandlerError::Fatal("carrier lost".to_string()))
            })
            .build();
        let dispatcher = Dispatcher::new(base);

        let err = dispatcher.call(&mut console, 0x41, 0, 0).unwrap_err();
        match &err {
            DispatchError::Handler { opcode, name, cause } => {
                assert_eq!(*opcode, 0x41);
                assert_eq!(name, "far-poke");
                assert!(matches!(cause, HandlerError::Screen(ScreenError::OutOfRange { .. })));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_fatal());

        let err = dispatcher.call(&mut console, 0x42, 0, 0).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Opcode 0x42 (halt) failed: Fatal: carrier lost");
    }

    #[test]
    fn test_amp_call_display() {
        assert_eq!(AmpCall::new(3, 65, 2).to_string(), "&3,65,2");
    }
}
