use super::interpolate::{ArcInterpolator, LineInterpolator, TickSteps};
use super::{PlannedPath, PlannedSegment};
use crate::config::MachineConfig;
use crate::hardware::{Laser, PositionalMotor};
use crate::ring_queue::Consumer;

#[derive(Debug, Copy, Clone)]
enum Interpolator {
    Line(LineInterpolator),
    Arc(ArcInterpolator),
}

/// Consumer half of the motion pipeline, driven from the timer context.
///
/// Owns the axes and the laser: nothing else pulses a motor or touches the
/// beam once the rasterizer is built.
pub struct Rasterizer<'a, X, Y, L, const N: usize> {
    consumer: Consumer<'a, PlannedSegment, N>,
    config: MachineConfig,

    x: X,
    y: Y,
    laser: L,

    active: Option<Interpolator>,
}

impl<'a, X, Y, L, const N: usize> Rasterizer<'a, X, Y, L, N>
where
    X: PositionalMotor,
    Y: PositionalMotor,
    L: Laser,
{
    pub fn new(
        consumer: Consumer<'a, PlannedSegment, N>,
        config: MachineConfig,
        x: X,
        y: Y,
        mut laser: L,
    ) -> Self {
        laser.disable();

        Self {
            consumer,
            config,
            x,
            y,
            laser,
            active: None,
        }
    }

    /// Advances the active segment by one tick period.
    ///
    /// When no segment is active the next queued one is started and the laser
    /// switched to its state; with nothing queued the laser is turned off and
    /// no pulse is emitted.
    pub fn tick(&mut self) {
        if self.active.is_none() {
            match self.consumer.try_pop() {
                Some(segment) => self.activate(segment),
                None => {
                    if self.laser.is_enabled() {
                        self.laser.disable();
                    }
                    return;
                }
            }
        }

        let position = self.position();
        let steps = match self.active.as_mut() {
            Some(Interpolator::Line(line)) => line.advance(),
            Some(Interpolator::Arc(arc)) => arc.advance(position),
            None => return,
        };

        self.apply(steps);
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.consumer.is_empty()
    }

    /// Commanded step position of both axes.
    pub fn position(&self) -> [i32; 2] {
        [self.x.get_position(), self.y.get_position()]
    }

    pub fn laser(&self) -> &L {
        &self.laser
    }

    pub fn axes(&self) -> (&X, &Y) {
        (&self.x, &self.y)
    }

    fn activate(&mut self, segment: PlannedSegment) {
        self.laser.set_enabled(segment.laser);

        self.active = Some(match segment.path {
            PlannedPath::Line(plan) => Interpolator::Line(LineInterpolator::new(&plan)),
            PlannedPath::Arc(plan) => Interpolator::Arc(ArcInterpolator::new(
                &plan,
                self.config.steps_per_mm,
                self.config.arc_resync_ticks,
            )),
        });
    }

    fn apply(&mut self, steps: TickSteps) {
        if let Some(direction) = steps.axes[0] {
            self.x.step(direction);
        }
        if let Some(direction) = steps.axes[1] {
            self.y.step(direction);
        }
        if steps.finished {
            self.active = None;
        }
    }
}
