//! Blink-code pattern for the single status LED.
//!
//! A fault code `n` is shown as `n` pulses followed by a long pause, and the
//! frame repeats until reset:
//!
//! ```text
//!  code 3:  ▇▁▇▁▇▁▁▁▁▁▁▁▁▁  ▇▁▇▁▇▁▁▁▁▁▁▁▁▁ ...
//!           └ 500 ms each ┘└─ 4500 ms ─┘
//! ```
//!
//! The pattern is pure data: [`BlinkCode::steps`] yields the pulses and
//! [`BlinkCode::frame`] the full repeating schedule, so the timing can be
//! tested without a pin or a clock.

/// Length of each on and each off half of a pulse.
pub const PULSE_MS: u32 = 500;
/// Dark gap after the last pulse of a frame.
pub const PAUSE_MS: u32 = 4500;

/// One segment of the schedule: LED level and how long to hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub on: bool,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkCode {
    code: u8,
}

impl BlinkCode {
    pub const fn new(code: u8) -> Self {
        Self { code }
    }

    /// The pulses of one flash, without the trailing pause.
    pub fn steps(self) -> impl Iterator<Item = Step> {
        (0..self.code).flat_map(|_| {
            [
                Step {
                    on: true,
                    duration_ms: PULSE_MS,
                },
                Step {
                    on: false,
                    duration_ms: PULSE_MS,
                },
            ]
        })
    }

    /// The pulses followed by the pause: one full repeating frame.
    pub fn frame(self) -> impl Iterator<Item = Step> {
        self.steps().chain(core::iter::once(Step {
            on: false,
            duration_ms: PAUSE_MS,
        }))
    }
}
