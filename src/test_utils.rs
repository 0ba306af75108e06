//! Test utilities: orbit fixtures and physical-invariant assertions.

use bevy::math::DVec2;

use crate::types::{BodyState, G};

/// Fixtures for building test worlds.
pub mod fixtures {
    use super::*;
    use crate::body::{Bodies, Body};

    /// Sol at the origin with Terra on a circular orbit at 600 units.
    pub fn sol_terra() -> Bodies {
        let mut bodies = Bodies::default();
        let v = crate::types::circular_speed(1000.0, 600.0);
        bodies.reset(vec![
            Body {
                name: "Sol".into(),
                mass: 1000.0,
                radius: 80.0,
                state: BodyState::default(),
            },
            Body {
                name: "Terra".into(),
                mass: 50.0,
                radius: 25.0,
                state: BodyState::new(DVec2::new(600.0, 0.0), DVec2::new(0.0, v)),
            },
        ]);
        bodies
    }
}

/// Assertions over conserved quantities.
pub mod assertions {
    use super::*;

    /// Total mechanical energy of an N-body system: kinetic plus pairwise
    /// potential.
    pub fn total_energy(states: &[BodyState], masses: &[f64]) -> f64 {
        let mut energy = 0.0;
        for (state, &mass) in states.iter().zip(masses) {
            energy += 0.5 * mass * state.vel.length_squared();
        }
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                let r = states[i].pos.distance(states[j].pos);
                energy -= G * masses[i] * masses[j] / r;
            }
        }
        energy
    }

    /// Total momentum of an N-body system.
    pub fn total_momentum(states: &[BodyState], masses: &[f64]) -> DVec2 {
        states
            .iter()
            .zip(masses)
            .map(|(state, &mass)| state.vel * mass)
            .fold(DVec2::ZERO, |acc, p| acc + p)
    }

    /// Assert relative energy drift stays under a tolerance.
    pub fn assert_energy_conserved(initial: f64, current: f64, tolerance: f64) {
        let drift = ((current - initial) / initial).abs();
        assert!(
            drift <= tolerance,
            "energy not conserved: initial={initial:.6e}, current={current:.6e}, drift={drift:.6e}"
        );
    }
}
