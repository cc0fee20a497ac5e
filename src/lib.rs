#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod gcode_parser;
pub mod hardware;
pub mod motion;
pub mod ring_queue;
pub mod systems;

pub type Fixed32 = fixed::types::I16F16;

/// Target coordinates as written on a command line. Missing axes keep the
/// previously planned value.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Coordinates {
    pub x: Option<Fixed32>,
    pub y: Option<Fixed32>,
}

/// A fully resolved machine position in millimeters.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Position {
    pub x: Fixed32,
    pub y: Fixed32,
}

impl Position {
    pub fn new(x: Fixed32, y: Fixed32) -> Self {
        Self { x, y }
    }

    pub fn from_num(x: f32, y: f32) -> Self {
        Self {
            x: Fixed32::from_num(x),
            y: Fixed32::from_num(y),
        }
    }

    /// Fills the axes missing from `coords` with this position.
    pub fn resolve(&self, coords: Coordinates) -> Position {
        Position {
            x: coords.x.unwrap_or(self.x),
            y: coords.y.unwrap_or(self.y),
        }
    }
}

/// Arc center, relative to the arc's starting point (G-code I/J).
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Offsets {
    pub i: Fixed32,
    pub j: Fixed32,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CircularDirection {
    Clockwise,
    CounterClockwise,
}

/// Slots of the RX byte queue; one stays free, so 255 bytes are buffered
/// between the serial receiver and the main loop.
pub const RX_QUEUE_CAPACITY: usize = 256;

/// Slots of the segment queue; 8 planned segments wait behind the one being
/// rasterized.
pub const SEGMENT_QUEUE_DEPTH: usize = 9;

pub const WELCOME_BANNER: &str = "Welcome to cnclaser
Commands:
M1 - Laser on
M2 - Laser off
G0 X (float) Y (float) - Fast move
G1 X (float) Y (float) F (int) - Linear move
G2 X (float) Y (float) I (float) J (float) F (int) - Clock wise arc
G3 X (float) Y (float) I (float) J (float) F (int) - Counter clock wise arc
";

pub const READY_MESSAGE: &str = "Ready";
