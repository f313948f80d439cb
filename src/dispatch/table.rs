//! Opcode tables
//!
//! The base table is built once at startup and shared read-only between all
//! sessions. Each session resolves through its own override layer first, so a
//! session can replace or add handlers without touching the base.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::HandlerError;
use crate::core::Console;

type HandlerFn = dyn Fn(&mut Console, u8, u8) -> Result<(), HandlerError> + Send + Sync;

/// A named native routine
#[derive(Clone)]
pub struct Handler {
    name: String,
    func: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Console, u8, u8) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, console: &mut Console, arg1: u8, arg2: u8) -> Result<(), HandlerError> {
        (self.func)(console, arg1, arg2)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// Process-wide opcode table; immutable once built
#[derive(Debug, Default)]
pub struct OpcodeTable {
    handlers: HashMap<u8, Handler>,
}

impl OpcodeTable {
    pub fn builder() -> OpcodeTableBuilder {
        OpcodeTableBuilder::default()
    }

    pub fn get(&self, opcode: u8) -> Option<&Handler> {
        self.handlers.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered opcodes in ascending order
    pub fn opcodes(&self) -> Vec<u8> {
        let mut ops: Vec<_> = self.handlers.keys().copied().collect();
        ops.sort_unstable();
        ops
    }
}

#[derive(Default)]
pub struct OpcodeTableBuilder {
    handlers: HashMap<u8, Handler>,
}

impl OpcodeTableBuilder {
    /// Register a handler; a later registration for the same opcode wins
    pub fn register<F>(mut self, opcode: u8, name: &str, func: F) -> Self
    where
        F: Fn(&mut Console, u8, u8) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        if let Some(old) = self.handlers.insert(opcode, Handler::new(name, func)) {
            warn!("Opcode {:#04x}: {} replaced by {}", opcode, old.name(), name);
        }
        self
    }

    pub fn build(self) -> Arc<OpcodeTable> {
        Arc::new(OpcodeTable {
            handlers: self.handlers,
        })
    }
}

/// Per-session view: overrides layered over the shared base
#[derive(Debug, Clone)]
pub struct SessionTable {
    base: Arc<OpcodeTable>,
    overrides: HashMap<u8, Handler>,
}

impl SessionTable {
    pub fn new(base: Arc<OpcodeTable>) -> Self {
        Self {
            base,
            overrides: HashMap::new(),
        }
    }

    pub fn base(&self) -> &Arc<OpcodeTable> {
        &self.base
    }

    pub fn set_override<F>(&mut self, opcode: u8, name: &str, func: F)
    where
        F: Fn(&mut Console, u8, u8) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.overrides.insert(opcode, Handler::new(name, func));
    }

    /// Remove a session override; returns whether one existed
    pub fn clear_override(&mut self, opcode: u8) -> bool {
        self.overrides.remove(&opcode).is_some()
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    pub fn resolve(&self, opcode: u8) -> Option<&Handler> {
        self.overrides
            .get(&opcode)
            .or_else(|| self.base.get(opcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Console, _: u8, _: u8) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn test_builder_later_registration_wins() {
        let table = OpcodeTable::builder()
            .register(1, "first", noop)
            .register(2, "other", noop)
            .register(1, "second", noop)
            .build();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).map(Handler::name), Some("second"));
        assert_eq!(table.opcodes(), vec![1, 2]);
        assert!(table.get(3).is_none());
    }

    #[test]
    fn test_override_does_not_touch_base() {
        let base = OpcodeTable::builder().register(1, "base", noop).build();
        let mut session_a = SessionTable::new(Arc::clone(&base));
        let session_b = SessionTable::new(Arc::clone(&base));

        session_a.set_override(1, "custom", noop);
        session_a.set_override(9, "extra", noop);

        assert_eq!(session_a.resolve(1).map(Handler::name), Some("custom"));
        assert_eq!(session_a.resolve(9).map(Handler::name), Some("extra"));
        assert_eq!(session_b.resolve(1).map(Handler::name), Some("base"));
        assert!(session_b.resolve(9).is_none());
        assert_eq!(base.get(1).map(Handler::name), Some("base"));

        assert!(session_a.clear_override(1));
        assert!(!session_a.clear_override(1));
        assert_eq!(session_a.resolve(1).map(Handler::name), Some("base"));
    }
}
