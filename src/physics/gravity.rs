//! Gravitational acceleration over a dense frame of bodies.

use bevy::math::DVec2;

use crate::types::{BodyState, G, MIN_DIST};

/// Compute gravitational acceleration on a massless probe at `pos`.
///
/// Sums over every body in the frame. Distances are clamped to `MIN_DIST`
/// before cubing, so the result is always finite.
///
/// # Arguments
/// * `pos` - Probe position in world units
/// * `states` - Body states in roster order
/// * `masses` - Body masses in roster order
pub fn acceleration_at(pos: DVec2, states: &[BodyState], masses: &[f64]) -> DVec2 {
    let mut acc = DVec2::ZERO;

    for (state, &mass) in states.iter().zip(masses.iter()) {
        let delta = state.pos - pos;
        let dist = delta.length().max(MIN_DIST);
        // a = G*m * delta / max(|delta|, MIN_DIST)^3
        acc += delta * (G * mass / (dist * dist * dist));
    }

    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_acceleration_points_at_body() {
        let states = [BodyState::default()];
        let masses = [1000.0];

        let acc = acceleration_at(DVec2::new(600.0, 0.0), &states, &masses);

        assert!(acc.x < 0.0, "acceleration should point at the body");
        assert_relative_eq!(acc.y, 0.0, epsilon = 1e-12);
        // |a| = G*m/r^2 = 50*1000/600^2
        assert_relative_eq!(acc.length(), 50.0 * 1000.0 / (600.0 * 600.0), epsilon = 1e-12);
    }

    #[test]
    fn test_acceleration_near_singularity_is_finite() {
        let states = [BodyState::default()];
        let masses = [1000.0];

        // Well inside the clamp distance
        let acc = acceleration_at(DVec2::new(0.5, 0.0), &states, &masses);

        assert!(acc.x.is_finite());
        assert!(acc.y.is_finite());
        // Clamped magnitude never exceeds G*m*|delta|/MIN_DIST^3
        assert!(acc.length() <= 50.0 * 1000.0 * 0.5 / 1000.0 + 1e-9);
    }

    #[test]
    fn test_acceleration_at_body_center_has_no_self_term() {
        let states = [BodyState::default()];
        let masses = [1000.0];

        // delta is zero, so the clamped term contributes nothing
        let acc = acceleration_at(DVec2::ZERO, &states, &masses);
        assert_eq!(acc, DVec2::ZERO);
    }
}
