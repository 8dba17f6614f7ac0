use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

const PRESCALER_PERIODS: [u64; 4] = [1, 64, 256, 1024];

/// One of the four 16-bit timers.
///
/// The counter is not ticked cycle by cycle: the bus schedules an overflow
/// event when the timer is enabled and re-arms it on every overflow, so the
/// counter field only holds the value latched at the last enable/overflow.
#[derive(Default, Serialize, Deserialize)]
pub struct Timer {
    /// Value the counter restarts from (TMxCNT_L writes land here).
    pub reload: u16,
    /// Latched counter value (TMxCNT_L reads come from here).
    pub counter: u16,
    /// TMxCNT_H.
    pub control: u16,
    /// Due cycle of the scheduled overflow event; used to discard events
    /// that became stale after a disable or re-enable.
    pub overflow_at: Option<u64>,
}

impl Timer {
    #[must_use]
    pub fn prescaler_period(&self) -> u64 {
        PRESCALER_PERIODS[(self.control & 0b11) as usize]
    }

    /// Count predecessor overflows instead of prescaled cycles.
    #[must_use]
    pub fn cascade(&self) -> bool {
        self.control.get_bit(2)
    }

    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.control.get_bit(6)
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.control.get_bit(7)
    }

    /// Cycles from a fresh counter value to the next overflow.
    #[must_use]
    pub fn cycles_until_overflow(&self) -> u64 {
        (0x1_0000 - u64::from(self.counter)) * self.prescaler_period()
    }

    /// One cascade step. Returns true when the counter wrapped.
    pub fn increment(&mut self) -> bool {
        let (next, overflowed) = self.counter.overflowing_add(1);
        self.counter = if overflowed { self.reload } else { next };

        overflowed
    }
}

#[derive(Default, Serialize, Deserialize)]
pub struct Timers {
    pub timers: [Timer; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_selection() {
        let mut timer = Timer::default();
        assert_eq!(timer.prescaler_period(), 1);

        timer.control = 0b01;
        assert_eq!(timer.prescaler_period(), 64);

        timer.control = 0b11;
        assert_eq!(timer.prescaler_period(), 1024);
    }

    #[test]
    fn overflow_distance_scales_with_prescaler() {
        let mut timer = Timer {
            counter: 0xFF00,
            ..Default::default()
        };
        assert_eq!(timer.cycles_until_overflow(), 0x100);

        timer.control = 0b10;
        assert_eq!(timer.cycles_until_overflow(), 0x100 * 256);
    }

    #[test]
    fn cascade_increment_reloads_on_wrap() {
        let mut timer = Timer {
            reload: 0xFFF0,
            counter: 0xFFFF,
            ..Default::default()
        };

        assert!(timer.increment());
        assert_eq!(timer.counter, 0xFFF0);
        assert!(!timer.increment());
        assert_eq!(timer.counter, 0xFFF1);
    }
}
