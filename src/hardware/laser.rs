use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use super::Laser;

/// Laser enable line, active high.
pub struct LaserDrive<P> {
    pin: P,
    enabled: bool,
}

impl<P: OutputPin<Error = Infallible>> LaserDrive<P> {
    /// Takes the pin and drives it low.
    pub fn new(mut pin: P) -> Self {
        let Ok(()) = pin.set_low();
        Self {
            pin,
            enabled: false,
        }
    }
}

impl<P: OutputPin<Error = Infallible>> Laser for LaserDrive<P> {
    fn enable(&mut self) {
        let Ok(()) = self.pin.set_high();
        self.enabled = true;
    }

    fn disable(&mut self) {
        let Ok(()) = self.pin.set_low();
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
