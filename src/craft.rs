//! Craft state machine: parked orbits, free flight and transfer capture.
//!
//! A craft is massless. While `Orbiting` its position is a pure function of
//! the parent body and its (altitude, angle); once launched it becomes
//! `Free` and its position is owned by the head of its own trajectory
//! buffer, which stays aligned 1:1 with the prediction buffer. A free craft
//! with a destination captures into orbit when its trajectory runs out.

use std::collections::VecDeque;

use bevy::math::DVec2;
use bevy::prelude::*;

use crate::body::{Bodies, Body};
use crate::physics::craft_step;
use crate::prediction::{BodyFrame, FrameLookup, PredictionBuffer};
use crate::types::{
    circular_speed, escape_speed, wrap_angle, BodyId, CraftFrame, CraftId, FlightParams,
    CRAFT_ORBITAL_ALT, DT_FIXED,
};

/// A craft parked on a circular orbit around a body.
#[derive(Clone, Debug)]
pub struct Orbit {
    pub parent: BodyId,
    /// Height above the parent's surface.
    pub altitude: f64,
    /// Current orbit angle, radians in [0, 2π).
    pub angle: f64,
    /// Orbit direction, +1 or -1.
    pub direction: f64,
}

impl Orbit {
    /// Orbit radius measured from the parent's center.
    pub fn radius(&self, parent: &Body) -> f64 {
        parent.radius + self.altitude
    }

    /// Angular rate omega = v_circ / r.
    pub fn angular_rate(&self, parent: &Body) -> f64 {
        let r = self.radius(parent);
        circular_speed(parent.mass, r) / r
    }

    /// World position derived from the parent's current state.
    pub fn position(&self, parent: &Body) -> DVec2 {
        parent.state.pos + DVec2::new(self.angle.cos(), self.angle.sin()) * self.radius(parent)
    }

    /// World velocity: parent velocity plus the orbit tangent.
    pub fn velocity(&self, parent: &Body) -> DVec2 {
        let tangent = DVec2::new(-self.angle.sin(), self.angle.cos()) * self.direction;
        parent.state.vel + tangent * circular_speed(parent.mass, self.radius(parent))
    }

    /// Orbit angle after `frames_ahead` more shifts, as the planner assumes
    /// it when probing future launch frames.
    pub fn angle_at(&self, parent: &Body, frames_ahead: usize) -> f64 {
        wrap_angle(
            self.angle + self.direction * self.angular_rate(parent) * DT_FIXED * frames_ahead as f64,
        )
    }
}

/// A craft coasting (or boosting) through the shared gravity field.
#[derive(Clone, Debug)]
pub struct FreeFlight {
    pub pos: DVec2,
    pub vel: DVec2,
    /// Escape boost still firing.
    pub accelerating: bool,
    pub escape_speed: f64,
    pub launch_body: BodyId,
    /// Orbit direction inherited at launch; orients the boost.
    pub direction: f64,
    /// Frames flown since launch.
    pub flight_frame: usize,
    pub correction: Option<crate::types::CorrectionBurn>,
    /// Set for transfer flights; triggers capture when the trajectory ends.
    pub destination: Option<BodyId>,
    /// Future craft frames, aligned with the prediction buffer.
    pub trajectory: VecDeque<CraftFrame>,
}

impl FreeFlight {
    /// Whether the correction burn is firing right now. Rendering hint.
    pub fn is_correcting(&self) -> bool {
        self.correction
            .map(|burn| burn.covers(self.flight_frame))
            .unwrap_or(false)
    }

    fn params(&self) -> FlightParams {
        FlightParams {
            launch_body: self.launch_body.0,
            direction: self.direction,
            escape_speed: self.escape_speed,
            correction: self.correction,
        }
    }
}

/// The two lives of a craft. Capture re-enters `Orbiting`.
#[derive(Clone, Debug)]
pub enum CraftState {
    Orbiting(Orbit),
    Free(FreeFlight),
}

/// A named craft.
#[derive(Clone, Debug)]
pub struct Craft {
    pub name: String,
    pub state: CraftState,
}

impl Craft {
    /// Current world position, regardless of state.
    pub fn position(&self, bodies: &Bodies) -> DVec2 {
        match &self.state {
            CraftState::Orbiting(orbit) => bodies
                .get(orbit.parent)
                .map(|parent| orbit.position(parent))
                .unwrap_or_default(),
            CraftState::Free(flight) => flight.pos,
        }
    }

    pub fn is_orbiting(&self) -> bool {
        matches!(self.state, CraftState::Orbiting(_))
    }
}

/// Resource holding all crafts in stable dense order.
#[derive(Resource, Default, Debug)]
pub struct Crafts {
    entries: Vec<Craft>,
}

impl Crafts {
    pub fn reset(&mut self, entries: Vec<Craft>) {
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: CraftId) -> Option<&Craft> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: CraftId) -> Option<&mut Craft> {
        self.entries.get_mut(id.0)
    }

    pub fn contains(&self, id: CraftId) -> bool {
        id.0 < self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Craft> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Craft> {
        self.entries.iter_mut()
    }

    pub fn as_slice(&self) -> &[Craft] {
        &self.entries
    }
}

/// Craft state on the orbit tangent at the moment of launch.
///
/// Shared between the actual launch transition and the planner, which calls
/// it for future launch frames against snapshot body states. The escape
/// boost starts firing immediately, so `accelerating` is set.
pub fn launch_state(
    angle: f64,
    probe_direction: f64,
    altitude: f64,
    parent_mass: f64,
    parent_radius: f64,
    parent_state: &crate::types::BodyState,
) -> CraftFrame {
    let r = parent_radius + altitude;
    let radial = DVec2::new(angle.cos(), angle.sin());
    let tangent = DVec2::new(-angle.sin(), angle.cos()) * probe_direction;
    CraftFrame {
        pos: parent_state.pos + radial * r,
        vel: parent_state.vel + tangent * circular_speed(parent_mass, r),
        accelerating: true,
    }
}

/// Simulate a craft forward through predicted body frames.
///
/// Produces one `CraftFrame` per buffer index in `start_index..frame_count`,
/// stepping with the body states one frame earlier (`prev` covers the first
/// step, which is the currently visible state when `start_index` is 0).
pub fn fly_through<F: FrameLookup>(
    frames: &F,
    masses: &[f64],
    start_index: usize,
    prev: &BodyFrame,
    start: CraftFrame,
    start_flight_frame: usize,
    params: &FlightParams,
) -> Vec<CraftFrame> {
    let count = frames.frame_count();
    let mut out = Vec::with_capacity(count.saturating_sub(start_index));
    let mut state = start;
    let mut flight_frame = start_flight_frame;

    for i in start_index..count {
        let bodies_now = if i == start_index {
            prev
        } else {
            frames.body_frame(i - 1)
        };
        state = craft_step(state, &bodies_now.states, masses, flight_frame, params, DT_FIXED);
        flight_frame += 1;
        out.push(state);
    }

    out
}

/// Advance every craft across one buffer shift.
///
/// Orbiting crafts advance their angle by one frame's worth of sweep; free
/// crafts pop their synchronized trajectory head. A transfer craft whose
/// trajectory just ran dry captures into orbit around its destination.
pub fn apply_shift(crafts: &mut Crafts, bodies: &Bodies) {
    for craft in crafts.iter_mut() {
        match &mut craft.state {
            CraftState::Orbiting(orbit) => {
                let Some(parent) = bodies.get(orbit.parent) else {
                    continue;
                };
                orbit.angle = wrap_angle(
                    orbit.angle + orbit.direction * orbit.angular_rate(parent) * DT_FIXED,
                );
            }
            CraftState::Free(flight) => {
                if let Some(frame) = flight.trajectory.pop_front() {
                    flight.pos = frame.pos;
                    flight.vel = frame.vel;
                    flight.accelerating = frame.accelerating;
                    flight.flight_frame += 1;
                }
                if flight.trajectory.is_empty() {
                    if let Some(dest) = flight.destination {
                        if let Some(body) = bodies.get(dest) {
                            let orbit = capture_orbit(flight.pos, dest, body);
                            info!(
                                "{} captured into orbit around {}",
                                craft.name, body.name
                            );
                            craft.state = CraftState::Orbiting(orbit);
                        }
                    }
                }
            }
        }
    }
}

/// Snap an arriving craft onto the capture orbit of its destination.
///
/// The angle is taken from the approach geometry; position and speed are
/// snapped exactly to the circular orbit at `CRAFT_ORBITAL_ALT`.
fn capture_orbit(pos: DVec2, dest: BodyId, body: &Body) -> Orbit {
    let offset = pos - body.state.pos;
    Orbit {
        parent: dest,
        altitude: CRAFT_ORBITAL_ALT,
        angle: wrap_angle(offset.y.atan2(offset.x)),
        direction: 1.0,
    }
}

/// Grow free crafts' trajectories to match the buffer after a top-up.
///
/// Transfer crafts are excluded: their trajectory is the plan, truncated at
/// the insertion frame, and must not be extended.
pub fn extend_free_trajectories(crafts: &mut Crafts, buffer: &PredictionBuffer, bodies: &Bodies) {
    for craft in crafts.iter_mut() {
        let CraftState::Free(flight) = &mut craft.state else {
            continue;
        };
        if flight.destination.is_some() {
            continue;
        }

        let have = flight.trajectory.len();
        if have >= buffer.len() {
            continue;
        }

        let (start, start_flight_frame) = match flight.trajectory.back() {
            Some(frame) => (*frame, flight.flight_frame + have),
            None => (
                CraftFrame {
                    pos: flight.pos,
                    vel: flight.vel,
                    accelerating: flight.accelerating,
                },
                flight.flight_frame,
            ),
        };

        // Body states one frame before the first new trajectory frame
        let prev = if have == 0 {
            BodyFrame {
                states: bodies.states(),
            }
        } else {
            buffer.body_frame(have - 1).clone()
        };

        let params = flight.params();
        let extension = fly_through(
            buffer,
            buffer.masses(),
            have,
            &prev,
            start,
            start_flight_frame,
            &params,
        );
        flight.trajectory.extend(extension);
    }
}

/// Launch a parked craft into free flight, simulating its trajectory
/// in-line against the current prediction buffer. No destination is set;
/// the craft just flies.
pub fn launch(
    craft: &mut Craft,
    bodies: &Bodies,
    buffer: &PredictionBuffer,
) -> Result<(), crate::error::TransferError> {
    let CraftState::Orbiting(orbit) = &craft.state else {
        return Err(crate::error::TransferError::NotOrbiting);
    };
    let parent = bodies
        .get(orbit.parent)
        .ok_or(crate::error::TransferError::UnknownBody(orbit.parent))?;

    let start = launch_state(
        orbit.angle,
        orbit.direction,
        orbit.altitude,
        parent.mass,
        parent.radius,
        &parent.state,
    );
    let esc = escape_speed(parent.mass, orbit.radius(parent));
    let params = FlightParams {
        launch_body: orbit.parent.0,
        direction: orbit.direction,
        escape_speed: esc,
        correction: None,
    };
    let prev = BodyFrame {
        states: bodies.states(),
    };
    let trajectory = fly_through(buffer, buffer.masses(), 0, &prev, start, 0, &params);

    info!("{} launched from {}", craft.name, parent.name);
    craft.state = CraftState::Free(FreeFlight {
        pos: start.pos,
        vel: start.vel,
        accelerating: true,
        escape_speed: esc,
        launch_body: orbit.parent,
        direction: orbit.direction,
        flight_frame: 0,
        correction: None,
        destination: None,
        trajectory: trajectory.into(),
    });
    Ok(())
}

/// Launch a parked craft onto a planned transfer.
///
/// The plan's pre-computed trajectory, correction burn and destination are
/// adopted wholesale; the craft will capture when the trajectory ends.
pub fn launch_with_plan(
    craft: &mut Craft,
    bodies: &Bodies,
    plan: &crate::planner::TransferPlan,
) -> Result<(), crate::error::TransferError> {
    let CraftState::Orbiting(orbit) = &craft.state else {
        return Err(crate::error::TransferError::NotOrbiting);
    };
    let parent = bodies
        .get(orbit.parent)
        .ok_or(crate::error::TransferError::UnknownBody(orbit.parent))?;

    let start = launch_state(
        orbit.angle,
        plan.direction,
        orbit.altitude,
        parent.mass,
        parent.radius,
        &parent.state,
    );
    let esc = escape_speed(parent.mass, orbit.radius(parent));

    info!(
        "{} departing {} for transfer, arrival in {} frames",
        craft.name,
        parent.name,
        plan.frames.len()
    );
    craft.state = CraftState::Free(FreeFlight {
        pos: start.pos,
        vel: start.vel,
        accelerating: true,
        escape_speed: esc,
        launch_body: orbit.parent,
        direction: plan.direction,
        flight_frame: 0,
        correction: plan.correction,
        destination: Some(plan.destination),
        trajectory: plan.frames.iter().copied().collect(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::types::BodyState;
    use approx::assert_relative_eq;

    fn terra() -> Body {
        let v = circular_speed(1000.0, 600.0);
        Body {
            name: "Terra".into(),
            mass: 50.0,
            radius: 25.0,
            state: BodyState::new(DVec2::new(600.0, 0.0), DVec2::new(0.0, v)),
        }
    }

    #[test]
    fn test_orbit_position_is_pure_function_of_parent() {
        let body = terra();
        let orbit = Orbit {
            parent: BodyId(1),
            altitude: 5.0,
            angle: 0.0,
            direction: 1.0,
        };

        let pos = orbit.position(&body);
        assert_relative_eq!(pos.x, 630.0, epsilon = 1e-12);
        assert_relative_eq!(pos.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orbit_angle_advances_and_wraps() {
        let body = terra();
        let mut orbit = Orbit {
            parent: BodyId(1),
            altitude: 5.0,
            angle: 0.0,
            direction: 1.0,
        };

        let omega = orbit.angular_rate(&body);
        let period = std::f64::consts::TAU / omega;
        let steps = (period / DT_FIXED).round() as usize;

        for _ in 0..steps {
            orbit.angle = wrap_angle(orbit.angle + orbit.direction * omega * DT_FIXED);
        }

        // Back near the start after one period, modulo 2π
        let err = orbit.angle.min(std::f64::consts::TAU - orbit.angle);
        assert!(err < omega * DT_FIXED, "angle {} not near 0", orbit.angle);
    }

    #[test]
    fn test_launch_state_matches_orbit_tangent() {
        let body = terra();
        let orbit = Orbit {
            parent: BodyId(1),
            altitude: 5.0,
            angle: std::f64::consts::FRAC_PI_2,
            direction: 1.0,
        };

        let frame = launch_state(
            orbit.angle,
            orbit.direction,
            orbit.altitude,
            body.mass,
            body.radius,
            &body.state,
        );

        assert_relative_eq!(frame.pos.x, orbit.position(&body).x, epsilon = 1e-9);
        assert_relative_eq!(frame.pos.y, orbit.position(&body).y, epsilon = 1e-9);
        assert_relative_eq!(frame.vel.x, orbit.velocity(&body).x, epsilon = 1e-9);
        assert_relative_eq!(frame.vel.y, orbit.velocity(&body).y, epsilon = 1e-9);
        assert!(frame.accelerating);
    }

    #[test]
    fn test_capture_snaps_to_orbital_altitude() {
        let body = terra();
        // Craft arrives slightly off the ideal altitude, 40 units out
        let arrival = body.state.pos + DVec2::new(40.0, 0.0);
        let orbit = capture_orbit(arrival, BodyId(1), &body);

        assert_eq!(orbit.parent, BodyId(1));
        assert_relative_eq!(orbit.altitude, CRAFT_ORBITAL_ALT, epsilon = 1e-12);
        assert_relative_eq!(orbit.angle, 0.0, epsilon = 1e-12);

        // Snapped position sits exactly at R + alt
        let snapped = orbit.position(&body);
        assert_relative_eq!(
            (snapped - body.state.pos).length(),
            body.radius + CRAFT_ORBITAL_ALT,
            epsilon = 1e-12
        );

        // Capture is idempotent: zero further ticks leave it in place
        assert_relative_eq!(orbit.position(&body).x, snapped.x, epsilon = 1e-12);
    }

    #[test]
    fn test_capture_speed_is_circular() {
        let body = terra();
        let orbit = capture_orbit(body.state.pos + DVec2::new(40.0, 0.0), BodyId(1), &body);

        let rel = orbit.velocity(&body) - body.state.vel;
        let expected = circular_speed(body.mass, body.radius + CRAFT_ORBITAL_ALT);
        assert_relative_eq!(rel.length(), expected, epsilon = 1e-9);
    }
}
