use core::f32::consts::TAU;

use libm::{atan2f, ceilf, cosf, fabsf, hypotf, sinf};

use super::{
    ArcPlan, LinePlan, MotionSegment, PlannedPath, PlannedSegment, SegmentError, StepRate,
};
use crate::config::MachineConfig;
use crate::ring_queue::Producer;
use crate::{CircularDirection, Fixed32, Offsets, Position};

/// Smallest arc sweep, in radians, that is not treated as a straight move
/// along the radius.
const MIN_SWEEP: f32 = 1e-5;

/// Producer half of the motion pipeline.
///
/// Tracks where the last queued segment ends so every new segment starts
/// there. Nothing is mutated when a segment is rejected, so a
/// [`SegmentError::QueueFull`] call can simply be retried.
pub struct Planner<'a, const N: usize> {
    producer: Producer<'a, PlannedSegment, N>,
    config: MachineConfig,

    position: Position,
    steps: [i32; 2],
    laser: bool,
}

impl<'a, const N: usize> Planner<'a, N> {
    pub fn new(
        producer: Producer<'a, PlannedSegment, N>,
        config: MachineConfig,
        steps: [i32; 2],
    ) -> Self {
        let position = Position::new(
            Fixed32::saturating_from_num(config.to_mm(0, steps[0])),
            Fixed32::saturating_from_num(config.to_mm(1, steps[1])),
        );

        Self {
            producer,
            config,
            position,
            steps,
            laser: false,
        }
    }

    /// End of the last queued segment.
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn laser_enabled(&self) -> bool {
        self.laser
    }

    /// Turns the laser on for segments queued from now on.
    pub fn enable_laser(&mut self) {
        self.laser = true;
    }

    /// Turns the laser off for segments queued from now on.
    pub fn disable_laser(&mut self) {
        self.laser = false;
    }

    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    pub fn enqueue_line(&mut self, target: Position, speed: f32) -> Result<(), SegmentError> {
        self.enqueue(MotionSegment::Line { target, speed }, self.laser)
    }

    /// Queues a line at the rapid speed with the laser off.
    pub fn enqueue_rapid(&mut self, target: Position) -> Result<(), SegmentError> {
        let speed = self.config.rapid_speed;
        self.enqueue(MotionSegment::Line { target, speed }, false)
    }

    pub fn enqueue_arc(
        &mut self,
        target: Position,
        center: Offsets,
        direction: CircularDirection,
        speed: f32,
    ) -> Result<(), SegmentError> {
        self.enqueue(
            MotionSegment::Arc {
                target,
                center,
                direction,
                speed,
            },
            self.laser,
        )
    }

    fn enqueue(&mut self, segment: MotionSegment, laser: bool) -> Result<(), SegmentError> {
        let path = self.plan(&segment)?;

        self.producer
            .try_push(PlannedSegment { path, laser })
            .map_err(|_| SegmentError::QueueFull)?;

        log::debug!(
            "Queued {} to ({}, {}), laser {}",
            path_kind(&path),
            segment.target().x,
            segment.target().y,
            if laser { "on" } else { "off" }
        );

        self.position = segment.target();
        self.steps = path.target();

        Ok(())
    }

    /// Validates `segment` and converts it to step space, starting from the
    /// end of the last queued segment.
    pub fn plan(&self, segment: &MotionSegment) -> Result<PlannedPath, SegmentError> {
        let speed = segment.speed();
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SegmentError::InvalidSpeed(speed));
        }

        let speed = self.clamp_speed(speed);

        match *segment {
            MotionSegment::Line { target, .. } => self.plan_line(target, speed).map(PlannedPath::Line),
            MotionSegment::Arc {
                target,
                center,
                direction,
                ..
            } => self
                .plan_arc(target, center, direction, speed)
                .map(PlannedPath::Arc),
        }
    }

    fn clamp_speed(&self, speed: f32) -> f32 {
        let max_speed = self.config.max_speed();
        if speed > max_speed {
            log::debug!("Clamping {} mm/s to {} mm/s", speed, max_speed);
            max_speed
        } else {
            speed
        }
    }

    fn target_steps(&self, target: Position) -> [i32; 2] {
        [
            self.config.to_steps(0, target.x.to_num()),
            self.config.to_steps(1, target.y.to_num()),
        ]
    }

    fn plan_line(&self, target: Position, speed: f32) -> Result<LinePlan, SegmentError> {
        let start = self.steps;
        let target = self.target_steps(target);

        let dx = target[0] - start[0];
        let dy = target[1] - start[1];
        if dx == 0 && dy == 0 {
            return Err(SegmentError::ZeroLength);
        }

        let major = dx.unsigned_abs().max(dy.unsigned_abs());
        let length = hypotf(
            dx as f32 / self.config.steps_per_mm[0],
            dy as f32 / self.config.steps_per_mm[1],
        );
        let ticks = length / (speed * self.config.tick_period_s());

        let rate = (major as f32 / ticks).min(1.0);
        let rate = StepRate::saturating_from_num(rate).max(StepRate::DELTA);

        Ok(LinePlan {
            start,
            target,
            rate,
        })
    }

    fn plan_arc(
        &self,
        target: Position,
        center: Offsets,
        direction: CircularDirection,
        speed: f32,
    ) -> Result<ArcPlan, SegmentError> {
        let start = [self.position.x.to_num::<f32>(), self.position.y.to_num::<f32>()];
        let end = [target.x.to_num::<f32>(), target.y.to_num::<f32>()];
        let center = [
            start[0] + center.i.to_num::<f32>(),
            start[1] + center.j.to_num::<f32>(),
        ];

        let start_vector = [start[0] - center[0], start[1] - center[1]];
        let end_vector = [end[0] - center[0], end[1] - center[1]];

        let start_radius = hypotf(start_vector[0], start_vector[1]);
        let end_radius = hypotf(end_vector[0], end_vector[1]);

        let min_step = 1.0 / self.config.steps_per_mm[0].max(self.config.steps_per_mm[1]);
        if start_radius < min_step {
            return Err(SegmentError::DegenerateArc);
        }

        let mismatch = fabsf(end_radius - start_radius);
        if mismatch > self.config.arc_radius_tolerance {
            return Err(SegmentError::ArcRadiusMismatch(mismatch));
        }

        let target_steps = self.target_steps(target);
        let start_angle = atan2f(start_vector[1], start_vector[0]);

        let sweep = if target == self.position {
            TAU
        } else if target_steps == self.steps {
            return Err(SegmentError::ZeroLength);
        } else {
            // signed angle from start to end vector, in (-pi, pi]
            let cross = start_vector[0] * end_vector[1] - start_vector[1] * end_vector[0];
            let dot = start_vector[0] * end_vector[0] + start_vector[1] * end_vector[1];
            let turn = atan2f(cross, dot);

            if fabsf(turn) < MIN_SWEEP {
                return Err(SegmentError::DegenerateArc);
            }

            match direction {
                CircularDirection::CounterClockwise if turn > 0.0 => turn,
                CircularDirection::CounterClockwise => turn + TAU,
                CircularDirection::Clockwise if turn < 0.0 => -turn,
                CircularDirection::Clockwise => TAU - turn,
            }
        };

        let length = sweep * (start_radius + end_radius) / 2.0;
        let ticks = ceilf(length / (speed * self.config.tick_period_s()));
        if ticks >= u32::MAX as f32 {
            return Err(SegmentError::TooLong);
        }
        let ticks = (ticks as u32).max(1);

        let sweep = match direction {
            CircularDirection::CounterClockwise => sweep,
            CircularDirection::Clockwise => -sweep,
        };
        let step_angle = sweep / ticks as f32;

        Ok(ArcPlan {
            center,
            start_vector,
            start_angle,
            start_radius,
            step_angle,
            rotation: [cosf(step_angle), sinf(step_angle)],
            radius_step: (end_radius - start_radius) / ticks as f32,
            ticks,
            target: target_steps,
        })
    }
}

fn path_kind(path: &PlannedPath) -> &'static str {
    match path {
        PlannedPath::Line(_) => "line",
        PlannedPath::Arc(_) => "arc",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::motion::SegmentQueue;

    fn config() -> MachineConfig {
        MachineConfig {
            steps_per_mm: [10.0, 10.0],
            tick_period_us: 100,
            rapid_speed: 50.0,
            ..Default::default()
        }
    }

    fn pos(x: f32, y: f32) -> Position {
        Position::from_num(x, y)
    }

    #[test]
    fn rejects_non_positive_speed_without_side_effects() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        assert_eq!(
            planner.enqueue_line(pos(10.0, 0.0), 0.0),
            Err(SegmentError::InvalidSpeed(0.0))
        );
        assert_eq!(
            planner.enqueue_line(pos(10.0, 0.0), -5.0),
            Err(SegmentError::InvalidSpeed(-5.0))
        );
        assert!(matches!(
            planner.enqueue_arc(
                pos(0.0, 10.0),
                Offsets {
                    i: Fixed32::ZERO,
                    j: Fixed32::from_num(5)
                },
                CircularDirection::Clockwise,
                f32::NAN
            ),
            Err(SegmentError::InvalidSpeed(_))
        ));

        assert_eq!(planner.position(), pos(0.0, 0.0));
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn rejects_zero_length_line() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        assert_eq!(
            planner.enqueue_line(pos(0.01, 0.0), 10.0),
            Err(SegmentError::ZeroLength)
        );
    }

    #[test]
    fn line_rate_follows_speed() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        // 3-4-5 triangle: 5 mm at 5 mm/s is 10000 ticks for 40 major steps
        planner.enqueue_line(pos(3.0, 4.0), 5.0).unwrap();

        let segment = consumer.try_pop().unwrap();
        let PlannedPath::Line(line) = segment.path else {
            panic!("expected a line");
        };
        assert_eq!(line.start, [0, 0]);
        assert_eq!(line.target, [30, 40]);
        assert!((line.rate.to_num::<f64>() - 0.004).abs() < 1e-6);
        assert_eq!(planner.position(), pos(3.0, 4.0));
    }

    #[test]
    fn speed_is_clamped_to_step_ceiling() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        planner.enqueue_line(pos(100.0, 0.0), 10_000.0).unwrap();

        let PlannedPath::Line(line) = consumer.try_pop().unwrap().path else {
            panic!("expected a line");
        };
        assert!(line.rate.to_num::<f64>() > 0.9999);
    }

    #[test]
    fn rapid_forces_laser_off() {
        let mut queue: SegmentQueue<4> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        planner.enable_laser();
        planner.enqueue_rapid(pos(5.0, 5.0)).unwrap();
        planner.enqueue_line(pos(6.0, 5.0), 5.0).unwrap();

        assert!(!consumer.try_pop().unwrap().laser);
        assert!(consumer.try_pop().unwrap().laser);
    }

    #[test]
    fn queue_full_leaves_position_untouched() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        planner.enqueue_line(pos(1.0, 0.0), 5.0).unwrap();
        assert_eq!(
            planner.enqueue_line(pos(2.0, 0.0), 5.0),
            Err(SegmentError::QueueFull)
        );
        assert_eq!(planner.position(), pos(1.0, 0.0));
    }

    #[test]
    fn arc_sweep_and_direction() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::ZERO,
            j: Fixed32::from_num(5),
        };

        planner
            .enqueue_arc(pos(0.0, 10.0), offsets, CircularDirection::Clockwise, 5.0)
            .unwrap();

        let PlannedPath::Arc(arc) = consumer.try_pop().unwrap().path else {
            panic!("expected an arc");
        };
        assert_eq!(arc.center, [0.0, 5.0]);
        assert_eq!(arc.target, [0, 100]);
        assert!((arc.start_radius - 5.0).abs() < 1e-6);
        // half circle, 5*pi mm at 5 mm/s
        assert!((arc.ticks as f32 - 31416.0).abs() <= 1.0);
        assert!(arc.step_angle < 0.0);
        assert!((arc.step_angle * arc.ticks as f32 + core::f32::consts::PI).abs() < 1e-4);
    }

    #[test]
    fn arc_to_start_is_full_circle() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::from_num(2),
            j: Fixed32::ZERO,
        };

        planner
            .enqueue_arc(pos(0.0, 0.0), offsets, CircularDirection::CounterClockwise, 5.0)
            .unwrap();

        let PlannedPath::Arc(arc) = consumer.try_pop().unwrap().path else {
            panic!("expected an arc");
        };
        assert!((arc.step_angle * arc.ticks as f32 - TAU).abs() < 1e-4);
    }

    #[test]
    fn arc_within_one_step_is_not_a_full_circle() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::from_num(5),
            j: Fixed32::ZERO,
        };

        planner.enable_laser();
        assert_eq!(
            planner.enqueue_arc(pos(0.0, 0.005), offsets, CircularDirection::Clockwise, 10.0),
            Err(SegmentError::ZeroLength)
        );
        assert_eq!(consumer.try_pop(), None);
        assert_eq!(planner.position(), pos(0.0, 0.0));
    }

    #[test]
    fn short_arc_keeps_its_sweep() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::from_num(5),
            j: Fixed32::ZERO,
        };

        // 0.1 rad counter-clockwise from the left of the circle
        let target = pos(5.0 - 5.0 * 0.1f32.cos(), -5.0 * 0.1f32.sin());
        planner
            .enqueue_arc(target, offsets, CircularDirection::CounterClockwise, 10.0)
            .unwrap();

        let PlannedPath::Arc(arc) = consumer.try_pop().unwrap().path else {
            panic!("expected an arc");
        };
        let swept = arc.step_angle * arc.ticks as f32;
        assert!((swept - 0.1).abs() < 1e-3);
    }

    #[test]
    fn rejects_arc_along_its_radius() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::from_num(5),
            j: Fixed32::ZERO,
        };

        // same ray from the center, 0.3 mm further in
        assert_eq!(
            planner.enqueue_arc(pos(0.3, 0.0), offsets, CircularDirection::Clockwise, 10.0),
            Err(SegmentError::DegenerateArc)
        );
        assert_eq!(planner.position(), pos(0.0, 0.0));
    }

    #[test]
    fn rejects_arc_longer_than_tick_counter() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);
        let offsets = Offsets {
            i: Fixed32::from_num(2000),
            j: Fixed32::ZERO,
        };

        assert_eq!(
            planner.enqueue_arc(
                pos(0.0, 0.0),
                offsets,
                CircularDirection::CounterClockwise,
                0.001
            ),
            Err(SegmentError::TooLong)
        );
    }

    #[test]
    fn rejects_bad_arcs() {
        let mut queue: SegmentQueue<2> = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::new(producer, config(), [0, 0]);

        assert_eq!(
            planner.enqueue_arc(
                pos(1.0, 1.0),
                Offsets::default(),
                CircularDirection::Clockwise,
                5.0
            ),
            Err(SegmentError::DegenerateArc)
        );
        assert!(matches!(
            planner.enqueue_arc(
                pos(0.0, 20.0),
                Offsets {
                    i: Fixed32::ZERO,
                    j: Fixed32::from_num(5)
                },
                CircularDirection::Clockwise,
                5.0
            ),
            Err(SegmentError::ArcRadiusMismatch(_))
        ));
    }
}
