//! Segment planning and real-time step generation.
//!
//! The main loop owns a [`Planner`], which validates moves, converts them to
//! step space and pushes them into a [`SegmentQueue`]. The timer context owns
//! the matching [`Rasterizer`], which pops one segment at a time and emits at
//! most one pulse per axis on every [`Rasterizer::tick`].

mod interpolate;
mod planner;
mod rasterizer;

pub use planner::Planner;
pub use rasterizer::Rasterizer;

use thiserror::Error;

use crate::config::MachineConfig;
use crate::hardware::{Laser, PositionalMotor};
use crate::ring_queue::RingQueue;
use crate::{CircularDirection, Offsets, Position};

/// Fraction of a major-axis step advanced per tick.
pub type StepRate = fixed::types::U1F31;

pub type SegmentQueue<const N: usize> = RingQueue<PlannedSegment, N>;

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum MotionSegment {
    Line {
        target: Position,
        speed: f32, // mm/s
    },
    Arc {
        target: Position,
        center: Offsets,
        direction: CircularDirection,
        speed: f32, // mm/s
    },
}

impl MotionSegment {
    pub fn target(&self) -> Position {
        match self {
            MotionSegment::Line { target, .. } | MotionSegment::Arc { target, .. } => *target,
        }
    }

    pub fn speed(&self) -> f32 {
        match self {
            MotionSegment::Line { speed, .. } | MotionSegment::Arc { speed, .. } => *speed,
        }
    }
}

#[derive(Error, Debug, PartialEq, Copy, Clone)]
pub enum SegmentError {
    #[error("Speed must be positive ({0} mm/s)")]
    InvalidSpeed(f32),
    #[error("Segment does not move any axis")]
    ZeroLength,
    #[error("Arc radius is below one step")]
    DegenerateArc,
    #[error("Arc end radius differs from start radius by {0} mm")]
    ArcRadiusMismatch(f32),
    #[error("Segment takes longer than the tick counter can track")]
    TooLong,
    #[error("Segment queue is full")]
    QueueFull,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct LinePlan {
    pub start: [i32; 2],
    pub target: [i32; 2],
    pub rate: StepRate,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct ArcPlan {
    pub center: [f32; 2],       // mm
    pub start_vector: [f32; 2], // start point relative to center, mm
    pub start_angle: f32,
    pub start_radius: f32,
    pub step_angle: f32, // signed, per tick
    pub rotation: [f32; 2], // cos, sin of step_angle
    pub radius_step: f32,   // per tick, blends start radius into end radius
    pub ticks: u32,
    pub target: [i32; 2],
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum PlannedPath {
    Line(LinePlan),
    Arc(ArcPlan),
}

impl PlannedPath {
    pub fn target(&self) -> [i32; 2] {
        match self {
            PlannedPath::Line(line) => line.target,
            PlannedPath::Arc(arc) => arc.target,
        }
    }
}

/// A segment ready for the rasterizer, with the laser state it runs under.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct PlannedSegment {
    pub path: PlannedPath,
    pub laser: bool,
}

/// Splits `queue` into the planner and rasterizer halves. The planner starts
/// from the axes' current position.
pub fn split<'a, X, Y, L, const N: usize>(
    queue: &'a mut SegmentQueue<N>,
    config: MachineConfig,
    x: X,
    y: Y,
    laser: L,
) -> (Planner<'a, N>, Rasterizer<'a, X, Y, L, N>)
where
    X: PositionalMotor,
    Y: PositionalMotor,
    L: Laser,
{
    let (producer, consumer) = queue.split();
    let origin = [x.get_position(), y.get_position()];

    (
        Planner::new(producer, config, origin),
        Rasterizer::new(consumer, config, x, y, laser),
    )
}
