mod laser;
mod stepper;

#[cfg(test)]
pub(crate) mod mock;

pub use laser::LaserDrive;
pub use stepper::StepperDrive;

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
pub enum CalibrationError {
    #[error("Home switch not reached within {0} steps")]
    HomeNotFound(u32),
    #[error("Home switch could not be read")]
    Pin,
}

/// One stepper axis, counting the pulses it has been commanded.
pub trait PositionalMotor {
    /// Emits exactly one pulse in `direction`.
    fn step(&mut self, direction: Direction);
    fn get_position(&self) -> i32;
    /// Drives the axis to its home switch and zeroes the position there.
    fn calibrate(&mut self) -> Result<(), CalibrationError>;
}

/// On/off control of the cutting beam.
pub trait Laser {
    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }
}
