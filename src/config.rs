#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MachineConfig {
    pub steps_per_mm: [f32; 2], // steps/mm for X and Y
    pub tick_period_us: u32,    // rasterizer tick period
    pub rapid_speed: f32,       // mm/s, laser always off
    pub arc_resync_ticks: u32,
    pub arc_radius_tolerance: f32, // mm
    pub pulse_width_ns: u32,
    pub dir_setup_ns: u32, // direction pin to step edge
    pub homing_max_steps: u32,
    pub homing_step_delay_us: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: [80.0, 80.0],
            tick_period_us: 100,
            rapid_speed: 100.0,
            arc_resync_ticks: 32,
            arc_radius_tolerance: 0.5,
            pulse_width_ns: 2_000,
            dir_setup_ns: 500,
            homing_max_steps: 40_000,
            homing_step_delay_us: 500,
        }
    }
}

impl MachineConfig {
    pub fn tick_period_s(&self) -> f32 {
        self.tick_period_us as f32 * 1e-6
    }

    /// Fastest feed the rasterizer can follow while pulsing each axis at
    /// most once per tick.
    pub fn max_speed(&self) -> f32 {
        let steps_per_mm = self.steps_per_mm[0].max(self.steps_per_mm[1]);
        1.0 / (self.tick_period_s() * steps_per_mm)
    }

    pub fn to_steps(&self, axis: usize, mm: f32) -> i32 {
        libm::roundf(mm * self.steps_per_mm[axis]) as i32
    }

    pub fn to_mm(&self, axis: usize, steps: i32) -> f32 {
        steps as f32 / self.steps_per_mm[axis]
    }
}
