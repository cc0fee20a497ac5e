pub mod laser_system;

pub use laser_system::{LaserSystem, Service};
