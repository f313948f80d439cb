//! Blink cadence
//!
//! Five-phase countdown driving reverse-video flashing. Phases run
//! 3, 2, 1, 0, 4 and repeat; the reverse flag is set during phases 3 and 2,
//! giving two ticks reversed for every three ticks normal. The caller owns the
//! real-time cadence (200 ms per tick on the reference hardware).

/// Phase the countdown starts from
pub const INITIAL_STATE: u8 = 3;

/// Highest phase value; `tick` wraps from 0 back to this
pub const MAX_STATE: u8 = 4;

/// Ticks in one full cycle
pub const CYCLE_LEN: u64 = MAX_STATE as u64 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkCadenceScheduler {
    state: u8,
}

impl Default for BlinkCadenceScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BlinkCadenceScheduler {
    pub fn new() -> Self {
        Self {
            state: INITIAL_STATE,
        }
    }

    /// Start from an arbitrary phase; `None` if `state` is not 0..=4
    pub fn with_state(state: u8) -> Option<Self> {
        (state <= MAX_STATE).then_some(Self { state })
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    /// Advance one phase
    pub fn tick(&mut self) {
        self.state = match self.state {
            0 => MAX_STATE,
            s => s - 1,
        };
    }

    /// Advance `ticks` phases; whole cycles are skipped
    pub fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks % CYCLE_LEN {
            self.tick();
        }
    }

    pub fn reverse_active(&self) -> bool {
        matches!(self.state, 3 | 2)
    }

    pub fn reset(&mut self) {
        self.state = INITIAL_STATE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_from_initial() {
        let mut blink = BlinkCadenceScheduler::new();
        let mut seen = vec![blink.state()];
        for _ in 0..5 {
            blink.tick();
            seen.push(blink.state());
        }
        assert_eq!(seen, vec![3, 2, 1, 0, 4, 3]);
    }

    #[test]
    fn test_duty_cycle() {
        let mut blink = BlinkCadenceScheduler::new();
        let mut pattern = Vec::new();
        for _ in 0..5 {
            pattern.push(blink.reverse_active());
            blink.tick();
        }
        assert_eq!(pattern, vec![true, true, false, false, false]);
    }

    #[test]
    fn test_with_state() {
        assert_eq!(BlinkCadenceScheduler::with_state(0).map(|b| b.state()), Some(0));
        assert!(BlinkCadenceScheduler::with_state(5).is_none());
    }

    #[test]
    fn test_advance_skips_whole_cycles() {
        let mut blink = BlinkCadenceScheduler::new();
        blink.advance(7);
        assert_eq!(blink.state(), 1);
        blink.advance(u64::MAX);
        // u64::MAX % 5 == 0
        assert_eq!(blink.state(), 1);
    }

    #[test]
    fn test_reset() {
        let mut blink = BlinkCadenceScheduler::with_state(0).unwrap();
        blink.tick();
        assert_eq!(blink.state(), 4);
        blink.reset();
        assert_eq!(blink, BlinkCadenceScheduler::new());
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn five_ticks_return_to_start(start in 0u8..=4) {
                let mut blink = BlinkCadenceScheduler::with_state(start).unwrap();
                let mut reversed = 0;
                for _ in 0..5 {
                    if blink.reverse_active() {
                        reversed += 1;
                    }
                    blink.tick();
                }
                prop_assert_eq!(blink.state(), start);
                prop_assert_eq!(reversed, 2);
            }
        }
    }
}
