//! Pin-free axis and laser for exercising motion logic on the host.

use super::{CalibrationError, Direction, Laser, PositionalMotor};

#[derive(Debug, Default)]
pub struct MockAxis {
    pub position: i32,
    pub pulses: u32,
}

impl PositionalMotor for MockAxis {
    fn step(&mut self, direction: Direction) {
        self.position += direction.sign();
        self.pulses += 1;
    }

    fn get_position(&self) -> i32 {
        self.position
    }

    fn calibrate(&mut self) -> Result<(), CalibrationError> {
        self.position = 0;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockLaser {
    pub enabled: bool,
}

impl Laser for MockLaser {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
