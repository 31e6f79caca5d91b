//! Single status LED and the fatal blink-code reporter built on it.
//!
//! ## Dual-target design
//!
//! The LED is any `embedded_hal::digital::OutputPin`: a GPIO `PinDriver`
//! on ESP-IDF, a recording mock on the host. The reporter takes its timing
//! from a `DelayNs`, so the whole schedule can be replayed in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{error, warn};

use super::led_patterns::BlinkCode;
use crate::app::ports::FatalReporter;
use crate::error::Fault;

pub struct IndicatorLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> IndicatorLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, lit: false }
    }

    pub fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        // Nothing else can signal a broken indicator; keep going.
        if result.is_err() {
            warn!("status LED: pin write failed");
        }
        self.lit = on;
    }

    pub fn on(&mut self) {
        self.set(true);
    }

    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }
}

/// Shows blink codes on an [`IndicatorLed`].
pub struct BlinkReporter<P, D> {
    led: IndicatorLed<P>,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> BlinkReporter<P, D> {
    pub fn new(led: IndicatorLed<P>, delay: D) -> Self {
        Self { led, delay }
    }

    /// Play one flash of `code` (pulses only, no trailing pause).
    pub fn flash(&mut self, code: u8) {
        for step in BlinkCode::new(code).steps() {
            self.led.set(step.on);
            self.delay.delay_ms(step.duration_ms);
        }
    }

    /// Play one full frame of `code`: the pulses, then the pause.
    pub fn play_frame(&mut self, code: u8) {
        for step in BlinkCode::new(code).frame() {
            self.led.set(step.on);
            self.delay.delay_ms(step.duration_ms);
        }
    }

    pub fn led_mut(&mut self) -> &mut IndicatorLed<P> {
        &mut self.led
    }
}

impl<P: OutputPin, D: DelayNs> FatalReporter for BlinkReporter<P, D> {
    fn report(&mut self, fault: Fault) -> ! {
        let code = fault.code();
        error!("fatal: {} (code {})", fault, code);
        loop {
            self.play_frame(code);
        }
    }
}
