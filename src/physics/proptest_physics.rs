//! Property-based tests for the N-body integrator.

use bevy::math::DVec2;
use proptest::prelude::*;

use crate::physics::{craft_step, nbody_step};
use crate::test_utils::assertions;
use crate::types::{
    circular_speed, escape_speed, BodyState, CraftFrame, FlightParams, DT_FIXED, ESCAPE_CUTOFF,
};

/// Sol plus one planet on a circular orbit at `radius`.
fn two_body(radius: f64, planet_mass: f64) -> (Vec<BodyState>, Vec<f64>) {
    let v = circular_speed(1000.0, radius);
    (
        vec![
            BodyState::default(),
            BodyState::new(DVec2::new(radius, 0.0), DVec2::new(0.0, v)),
        ],
        vec![1000.0, planet_mass],
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Energy stays bounded over a quarter orbit at the fixed timestep.
    ///
    /// Semi-implicit Euler is symplectic: energy oscillates instead of
    /// drifting, so the relative error stays small at any phase.
    #[test]
    fn prop_energy_bounded_over_quarter_orbit(
        radius in 300.0f64..900.0,
        planet_mass in 1.0f64..60.0,
    ) {
        let (mut states, masses) = two_body(radius, planet_mass);
        let initial = assertions::total_energy(&states, &masses);

        let period = std::f64::consts::TAU * radius / circular_speed(1000.0, radius);
        let steps = (period / 4.0 / DT_FIXED) as usize;
        for _ in 0..steps {
            nbody_step(&mut states, &masses, DT_FIXED);
        }

        let current = assertions::total_energy(&states, &masses);
        let drift = ((current - initial) / initial).abs();
        prop_assert!(
            drift < 0.02,
            "energy drift {:.4}% over a quarter orbit (r={radius})",
            drift * 100.0
        );
    }

    /// Pairwise-symmetric forces conserve total momentum to within noise.
    #[test]
    fn prop_momentum_conserved(
        radius in 200.0f64..900.0,
        planet_mass in 1.0f64..60.0,
        steps in 10usize..500,
    ) {
        let (mut states, masses) = two_body(radius, planet_mass);
        let initial = assertions::total_momentum(&states, &masses);

        for _ in 0..steps {
            nbody_step(&mut states, &masses, DT_FIXED);
        }

        let current = assertions::total_momentum(&states, &masses);
        prop_assert!((current - initial).length() < 1e-9);
    }

    /// The integrator is a pure function: identical runs match bitwise.
    #[test]
    fn prop_steps_are_deterministic(
        radius in 200.0f64..900.0,
        steps in 1usize..300,
    ) {
        let (states, masses) = two_body(radius, 50.0);
        let mut a = states.clone();
        let mut b = states;

        for _ in 0..steps {
            nbody_step(&mut a, &masses, DT_FIXED);
        }
        for _ in 0..steps {
            nbody_step(&mut b, &masses, DT_FIXED);
        }

        prop_assert_eq!(a[1].pos, b[1].pos);
        prop_assert_eq!(a[1].vel, b[1].vel);
    }

    /// The escape boost always terminates, at or above the cutoff speed.
    #[test]
    fn prop_escape_boost_terminates(
        body_mass in 10.0f64..100.0,
        orbit_radius in 15.0f64..60.0,
    ) {
        let states = vec![BodyState::default()];
        let masses = vec![body_mass];
        let esc = escape_speed(body_mass, orbit_radius);
        let params = FlightParams {
            launch_body: 0,
            direction: 1.0,
            escape_speed: esc,
            correction: None,
        };

        let mut frame = CraftFrame {
            pos: DVec2::new(orbit_radius, 0.0),
            vel: DVec2::new(0.0, circular_speed(body_mass, orbit_radius)),
            accelerating: true,
        };

        let mut steps = 0;
        while frame.accelerating && steps < 50_000 {
            frame = craft_step(frame, &states, &masses, 0, &params, DT_FIXED);
            steps += 1;
        }

        prop_assert!(!frame.accelerating, "boost did not terminate");
        prop_assert!(frame.vel.length() >= ESCAPE_CUTOFF * esc - 1e-9);
    }

    /// Gravity clamping keeps every step finite, even through a body.
    #[test]
    fn prop_no_singularities(
        x in -50.0f64..50.0,
        y in -50.0f64..50.0,
        vx in -20.0f64..20.0,
        vy in -20.0f64..20.0,
    ) {
        let states = vec![BodyState::default()];
        let masses = vec![1000.0];
        let params = FlightParams {
            launch_body: 0,
            direction: 1.0,
            escape_speed: escape_speed(1000.0, 85.0),
            correction: None,
        };

        let mut frame = CraftFrame {
            pos: DVec2::new(x, y),
            vel: DVec2::new(vx, vy),
            accelerating: false,
        };
        for _ in 0..200 {
            frame = craft_step(frame, &states, &masses, 0, &params, DT_FIXED);
            prop_assert!(frame.pos.x.is_finite() && frame.pos.y.is_finite());
            prop_assert!(frame.vel.x.is_finite() && frame.vel.y.is_finite());
        }
    }
}
