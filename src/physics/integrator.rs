//! Semi-implicit Euler integration for bodies and crafts.
//!
//! The scheme is symplectic: velocities are updated from accelerations at
//! the current positions, then positions are updated with the new
//! velocities. Second order energy behavior at first order cost, which is
//! what keeps circular preset orbits closed over the whole horizon.

use bevy::math::DVec2;

use crate::physics::gravity::acceleration_at;
use crate::types::{BodyState, CraftFrame, FlightParams, CRAFT_ACCEL, ESCAPE_CUTOFF, G, MIN_DIST};

/// Advance every body by one fixed timestep, in place.
///
/// Accelerations are evaluated pairwise from the pre-step positions, in
/// roster index order, so the result is bit-identical across replays.
pub fn nbody_step(states: &mut [BodyState], masses: &[f64], dt: f64) {
    let n = states.len();
    let mut acc = vec![DVec2::ZERO; n];

    for i in 0..n {
        let mut a = DVec2::ZERO;
        for j in 0..n {
            if i == j {
                continue;
            }
            let delta = states[j].pos - states[i].pos;
            let dist = delta.length().max(MIN_DIST);
            a += delta * (G * masses[j] / (dist * dist * dist));
        }
        acc[i] = a;
    }

    for (state, a) in states.iter_mut().zip(acc) {
        state.vel += a * dt;
        state.pos += state.vel * dt;
    }
}

/// Advance a craft by one fixed timestep against a frozen body frame.
///
/// Forces, in order:
/// - gravity from every body (clamped, as for bodies),
/// - the escape boost while `accelerating`: `CRAFT_ACCEL` along the prograde
///   direction relative to the launch body, oriented by `params.direction`,
/// - the correction burn while `flight_frame` is inside its window.
///
/// The boost flag clears once speed relative to the launch body reaches
/// `ESCAPE_CUTOFF * params.escape_speed`.
pub fn craft_step(
    frame: CraftFrame,
    states: &[BodyState],
    masses: &[f64],
    flight_frame: usize,
    params: &FlightParams,
    dt: f64,
) -> CraftFrame {
    let mut acc = acceleration_at(frame.pos, states, masses);

    let launch = &states[params.launch_body];
    if frame.accelerating {
        let radial = frame.pos - launch.pos;
        let prograde = DVec2::new(-radial.y, radial.x).normalize_or_zero() * params.direction;
        acc += prograde * CRAFT_ACCEL;
    }

    if let Some(burn) = &params.correction {
        if burn.covers(flight_frame) {
            acc += DVec2::new(burn.angle.cos(), burn.angle.sin()) * CRAFT_ACCEL;
        }
    }

    let vel = frame.vel + acc * dt;
    let pos = frame.pos + vel * dt;

    let accelerating = frame.accelerating
        && (vel - launch.vel).length() < ESCAPE_CUTOFF * params.escape_speed;

    CraftFrame {
        pos,
        vel,
        accelerating,
    }
}
