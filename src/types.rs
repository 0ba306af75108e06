//! Core physics types and constants for the transfer simulator.

use bevy::math::DVec2;
use bevy::prelude::*;

/// System sets ordering the main loop within `Update`.
///
/// Simulation advance (clock, buffer, crafts, registry) must complete before
/// the planner observes the buffer, so that snapshot serials and plan indices
/// agree within a tick.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimSet {
    /// Fixed-step advance: buffer shifts, craft sync, plan expiry.
    Advance,
    /// Transfer planner bookkeeping, dispatch and result collection.
    Plan,
}

/// Physical constants (world units)

/// Gravitational constant for the simulation's world frame.
pub const G: f64 = 50.0;

/// Distance clamp applied inside gravity terms. No body pair ever
/// contributes a singular acceleration.
pub const MIN_DIST: f64 = 10.0;

/// Fixed integration timestep in seconds.
pub const DT_FIXED: f64 = 0.033;

/// Craft thrust acceleration, shared by the escape boost and correction burns.
pub const CRAFT_ACCEL: f64 = 2.5;

/// Altitude above a body's surface at which crafts park and are captured.
pub const CRAFT_ORBITAL_ALT: f64 = 5.0;

/// The escape boost cuts off once speed relative to the launch body reaches
/// this multiple of sqrt(2GM/r).
pub const ESCAPE_CUTOFF: f64 = 1.1;

/// Valid simulation speed multipliers.
pub const SPEED_STEPS: &[u32] = &[1, 2, 4, 8, 16];

/// Stable dense index of a body in the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

/// Stable dense index of a craft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CraftId(pub usize);

/// Kinematic state of a body.
/// Uses f64 (DVec2) so long prediction horizons stay deterministic.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    /// Position in world units.
    pub pos: DVec2,
    /// Velocity in world units per second.
    pub vel: DVec2,
}

impl BodyState {
    pub fn new(pos: DVec2, vel: DVec2) -> Self {
        Self { pos, vel }
    }
}

/// One sample of a craft's flight path, aligned 1:1 with a prediction frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CraftFrame {
    /// Position in world units.
    pub pos: DVec2,
    /// Velocity in world units per second.
    pub vel: DVec2,
    /// Whether the escape boost was still firing over this frame.
    pub accelerating: bool,
}

/// A timed thrust arc flown mid-transfer to tighten the approach.
///
/// `start_frame` counts from launch; the burn covers flight frames
/// `start_frame..start_frame + duration`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectionBurn {
    /// Thrust direction in world frame, radians.
    pub angle: f64,
    /// Burn length in frames. Zero means no burn at all.
    pub duration: usize,
    /// First flight frame of the burn, relative to launch.
    pub start_frame: usize,
}

impl CorrectionBurn {
    /// Whether the burn is firing at the given flight frame.
    pub fn covers(&self, flight_frame: usize) -> bool {
        flight_frame >= self.start_frame && flight_frame < self.start_frame + self.duration
    }
}

/// Everything the craft integrator needs besides the craft's own state.
#[derive(Clone, Copy, Debug)]
pub struct FlightParams {
    /// Dense index of the body the craft launched from.
    pub launch_body: usize,
    /// Orbit direction at launch, +1 or -1. Orients the boost prograde.
    pub direction: f64,
    /// Escape speed sqrt(2GM/r) frozen at launch.
    pub escape_speed: f64,
    /// Optional correction burn for transfer flights.
    pub correction: Option<CorrectionBurn>,
}

/// Circular orbit speed at distance `radius` around a body of mass `mass`.
pub fn circular_speed(mass: f64, radius: f64) -> f64 {
    (G * mass / radius).sqrt()
}

/// Escape speed at distance `radius` from a body of mass `mass`.
pub fn escape_speed(mass: f64, radius: f64) -> f64 {
    (2.0 * G * mass / radius).sqrt()
}

/// Wrap an angle into [0, 2π).
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::TAU;
    angle.rem_euclid(TAU)
}
