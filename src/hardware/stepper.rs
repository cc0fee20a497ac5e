use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::{CalibrationError, Direction, PositionalMotor};
use crate::config::MachineConfig;

/// Step/direction driver with a home switch that reads high when triggered.
pub struct StepperDrive<S, D, H, T> {
    step_pin: S,
    dir_pin: D,
    home_pin: H,
    delay: T,

    direction: Direction,
    invert_direction: bool,
    step_count: i32,

    pulse_width_ns: u32,
    dir_setup_ns: u32,
    homing_max_steps: u32,
    homing_step_delay_us: u32,
}

impl<S, D, H, T> StepperDrive<S, D, H, T>
where
    S: OutputPin<Error = Infallible>,
    D: OutputPin<Error = Infallible>,
    H: InputPin,
    T: DelayNs,
{
    pub fn new(
        mut step_pin: S,
        dir_pin: D,
        home_pin: H,
        delay: T,
        invert_direction: bool,
        config: &MachineConfig,
    ) -> Self {
        let Ok(()) = step_pin.set_low();

        let mut drive = StepperDrive {
            step_pin,
            dir_pin,
            home_pin,
            delay,
            direction: Direction::Forward,
            invert_direction,
            step_count: 0,
            pulse_width_ns: config.pulse_width_ns,
            dir_setup_ns: config.dir_setup_ns,
            homing_max_steps: config.homing_max_steps,
            homing_step_delay_us: config.homing_step_delay_us,
        };
        drive.write_direction(Direction::Forward);
        drive
    }

    fn write_direction(&mut self, direction: Direction) {
        let high = (direction == Direction::Forward) != self.invert_direction;
        let Ok(()) = self.dir_pin.set_state(high.into());
        self.direction = direction;
    }

    fn at_home(&mut self) -> Result<bool, CalibrationError> {
        self.home_pin.is_high().map_err(|_| CalibrationError::Pin)
    }
}

impl<S, D, H, T> PositionalMotor for StepperDrive<S, D, H, T>
where
    S: OutputPin<Error = Infallible>,
    D: OutputPin<Error = Infallible>,
    H: InputPin,
    T: DelayNs,
{
    fn step(&mut self, direction: Direction) {
        if direction != self.direction {
            self.write_direction(direction);
            self.delay.delay_ns(self.dir_setup_ns);
        }

        let Ok(()) = self.step_pin.set_high();
        self.delay.delay_ns(self.pulse_width_ns);
        let Ok(()) = self.step_pin.set_low();

        self.step_count += direction.sign();
    }

    fn get_position(&self) -> i32 {
        self.step_count
    }

    fn calibrate(&mut self) -> Result<(), CalibrationError> {
        let mut steps = 0;

        while !self.at_home()? {
            if steps == self.homing_max_steps {
                return Err(CalibrationError::HomeNotFound(steps));
            }

            self.step(Direction::Backward);
            self.delay.delay_us(self.homing_step_delay_us);
            steps += 1;
        }

        log::info!("Homed after {} steps", steps);
        self.step_count = 0;

        Ok(())
    }
}
