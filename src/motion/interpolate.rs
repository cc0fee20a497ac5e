use libm::{cosf, roundf, sinf};

use super::{ArcPlan, LinePlan, StepRate};
use crate::hardware::Direction;

/// Pulses decided for one tick.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub(super) struct TickSteps {
    pub axes: [Option<Direction>; 2],
    pub finished: bool,
}

/// Bresenham state of one axis along a line.
#[derive(Debug, Copy, Clone)]
struct AxisProgress {
    delta: i64,
    error: i64,
    direction: Direction,
}

impl AxisProgress {
    fn new(delta: i32) -> Self {
        Self {
            delta: delta.unsigned_abs() as i64,
            error: 0,
            direction: if delta < 0 {
                Direction::Backward
            } else {
                Direction::Forward
            },
        }
    }

    fn advance(&mut self, major: i64) -> Option<Direction> {
        self.error += self.delta;
        if 2 * self.error >= major {
            self.error -= major;
            Some(self.direction)
        } else {
            None
        }
    }
}

/// Line rasterizer: a phase accumulator paces the major axis, Bresenham
/// error terms place the minor axis pulses.
#[derive(Debug, Copy, Clone)]
pub(super) struct LineInterpolator {
    axes: [AxisProgress; 2],
    major: u32,
    taken: u32,
    phase: StepRate,
    rate: StepRate,
}

impl LineInterpolator {
    pub fn new(plan: &LinePlan) -> Self {
        let dx = plan.target[0] - plan.start[0];
        let dy = plan.target[1] - plan.start[1];

        Self {
            axes: [AxisProgress::new(dx), AxisProgress::new(dy)],
            major: dx.unsigned_abs().max(dy.unsigned_abs()),
            taken: 0,
            phase: StepRate::ZERO,
            rate: plan.rate,
        }
    }

    pub fn advance(&mut self) -> TickSteps {
        if self.taken == self.major {
            return TickSteps {
                finished: true,
                ..Default::default()
            };
        }

        self.phase += self.rate;
        if self.phase < StepRate::ONE {
            return TickSteps::default();
        }
        self.phase -= StepRate::ONE;
        self.taken += 1;

        let major = self.major as i64;
        TickSteps {
            axes: [self.axes[0].advance(major), self.axes[1].advance(major)],
            finished: self.taken == self.major,
        }
    }
}

/// Arc rasterizer. The center-relative vector is rotated by a fixed
/// small-angle matrix every tick and re-seeded from the exact angle every
/// `resync_ticks` ticks. Each axis then steps toward the nearest step of the
/// ideal point, at most once per tick.
#[derive(Debug, Copy, Clone)]
pub(super) struct ArcInterpolator {
    center: [f32; 2],
    vector: [f32; 2],
    rotation: [f32; 2],

    start_angle: f32,
    step_angle: f32,
    start_radius: f32,
    radius_step: f32,

    ticks: u32,
    elapsed: u32,
    resync_ticks: u32,

    steps_per_mm: [f32; 2],
    target: [i32; 2],
}

impl ArcInterpolator {
    pub fn new(plan: &ArcPlan, steps_per_mm: [f32; 2], resync_ticks: u32) -> Self {
        Self {
            center: plan.center,
            vector: plan.start_vector,
            rotation: plan.rotation,
            start_angle: plan.start_angle,
            step_angle: plan.step_angle,
            start_radius: plan.start_radius,
            radius_step: plan.radius_step,
            ticks: plan.ticks,
            elapsed: 0,
            resync_ticks: resync_ticks.max(1),
            steps_per_mm,
            target: plan.target,
        }
    }

    pub fn advance(&mut self, position: [i32; 2]) -> TickSteps {
        if self.elapsed < self.ticks {
            self.elapsed += 1;
            if self.elapsed % self.resync_ticks == 0 {
                self.resync();
            } else {
                self.rotate();
            }
        }

        let desired = if self.elapsed == self.ticks {
            self.target
        } else {
            [self.ideal_step(0), self.ideal_step(1)]
        };

        let mut steps = TickSteps::default();
        let mut reached = true;
        for axis in 0..2 {
            let remaining = desired[axis] - position[axis];
            steps.axes[axis] = match remaining {
                0 => None,
                r if r > 0 => Some(Direction::Forward),
                _ => Some(Direction::Backward),
            };

            let after = position[axis] + steps.axes[axis].map_or(0, Direction::sign);
            reached &= after == self.target[axis];
        }

        steps.finished = self.elapsed == self.ticks && reached;
        steps
    }

    fn rotate(&mut self) {
        let [cos, sin] = self.rotation;
        let [x, y] = self.vector;
        self.vector = [x * cos - y * sin, x * sin + y * cos];
    }

    fn resync(&mut self) {
        let k = self.elapsed as f32;
        let angle = self.start_angle + self.step_angle * k;
        let radius = self.start_radius + self.radius_step * k;
        self.vector = [radius * cosf(angle), radius * sinf(angle)];
    }

    fn ideal_step(&self, axis: usize) -> i32 {
        roundf((self.center[axis] + self.vector[axis]) * self.steps_per_mm[axis]) as i32
    }
}
