//! Common utilities for integration tests.
#![allow(dead_code)]

use starferry::planner::PlannerSettings;
use starferry::prediction::PredictionSettings;
use starferry::sim::Simulation;
use starferry::types::DT_FIXED;

/// Build a simulation with a shrunken horizon so integration tests finish
/// quickly. The structure is identical to the reference configuration,
/// only the spans differ.
pub fn reduced_world(preset: &str) -> Simulation {
    let mut sim = Simulation::new(preset).expect("preset exists");
    {
        let world = sim.world_mut();
        *world.resource_mut::<PredictionSettings>() = PredictionSettings {
            horizon_time: 45.0,
            solid_time: 40.0,
            max_catchup: 2000,
        };
        *world.resource_mut::<PlannerSettings>() = PlannerSettings {
            min_launch_lead: 1.0,
            min_runway: 8.0,
            batch_size: 25,
            max_iterations: 20,
            ..Default::default()
        };
    }
    // Reload so the buffer is rebuilt under the new settings
    sim.reset(preset).expect("preset exists");
    sim
}

/// Build a simulation on the 90/60-second horizon variant for transfer
/// search tests. Unlike `reduced_world`, the planner settings keep their
/// reference thresholds, lead and batch size; only the runway is scaled to
/// the shorter horizon and the optimizer's round cap is bounded so a full
/// sweep finishes in test time.
pub fn planner_world(preset: &str) -> Simulation {
    let mut sim = Simulation::new(preset).expect("preset exists");
    {
        let world = sim.world_mut();
        *world.resource_mut::<PredictionSettings>() = PredictionSettings {
            horizon_time: 90.0,
            solid_time: 60.0,
            max_catchup: 20_000,
        };
        *world.resource_mut::<PlannerSettings>() = PlannerSettings {
            min_runway: 30.0,
            max_iterations: 60,
            ..Default::default()
        };
    }
    sim.reset(preset).expect("preset exists");
    sim
}

/// Advance by wall-clock seconds in sub-step chunks, like a host loop.
pub fn run_seconds(sim: &mut Simulation, seconds: f64) {
    let chunk: f64 = 0.1;
    let mut remaining = seconds;
    while remaining > 1e-12 {
        let dt = chunk.min(remaining);
        sim.tick(dt);
        remaining -= dt;
    }
}

/// Tick without advancing simulation time, letting the planner make
/// progress against a static buffer.
pub fn idle_tick(sim: &mut Simulation) {
    sim.tick(0.0);
}

/// Whether the transfer search has swept the whole launch window.
pub fn sweep_complete(sim: &mut Simulation) -> bool {
    let world = sim.world_mut();
    let buffer_len = world
        .resource::<starferry::prediction::PredictionBuffer>()
        .len();
    let settings = world.resource::<PlannerSettings>().clone();
    world
        .resource::<starferry::planner::TransferSearch>()
        .sweep_complete(buffer_len, &settings)
}

/// Seconds of wall time that produce exactly `shifts` fixed steps at 1x,
/// with a small safety margin against accumulator rounding.
pub fn wall_for_shifts(shifts: usize) -> f64 {
    shifts as f64 * DT_FIXED + DT_FIXED * 0.1
}
