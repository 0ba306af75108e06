//! Fixed-step simulation clock and the per-shift advance loop.
//!
//! Wall time is fed in by the host, scaled by an integer speed multiplier,
//! and accumulated into whole `DT_FIXED` steps. Each whole step consumes
//! exactly one prediction frame and notifies every dependent in a fixed
//! order: bodies adopt the popped frame, crafts pop their synchronized
//! trajectory frame, the plan registry decrements and may fire a scheduled
//! launch. Interleaving per shift (not per tick) keeps multi-step ticks at
//! high speed multipliers exact.

use bevy::prelude::*;

use crate::body::Bodies;
use crate::craft::{self, Crafts};
use crate::planner::TransferSearch;
use crate::prediction::{BufferShifted, PredictionBuffer, PredictionSettings};
use crate::registry::PlanRegistry;
use crate::types::{SimSet, DT_FIXED, SPEED_STEPS};

/// Resource accumulating wall time into fixed steps.
#[derive(Resource, Debug)]
pub struct SimulationClock {
    accumulator: f64,
    speed: u32,
    paused: bool,
    /// Wall time fed since the last tick, consumed by the advance system.
    pending: f64,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            accumulator: 0.0,
            speed: 1,
            paused: false,
            pending: 0.0,
        }
    }
}

impl SimulationClock {
    /// Queue wall-clock seconds for the next advance.
    pub fn feed(&mut self, real_dt: f64) {
        if real_dt.is_finite() && real_dt > 0.0 {
            self.pending += real_dt;
        }
    }

    /// Set the speed multiplier. Values outside the valid steps are ignored.
    pub fn set_speed(&mut self, multiplier: u32) {
        if SPEED_STEPS.contains(&multiplier) {
            self.speed = multiplier;
        } else {
            warn!("ignoring invalid speed multiplier {multiplier}");
        }
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Freeze advancement. The buffer and accumulator are kept.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Reset for a fresh world.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn take_pending(&mut self) -> f64 {
        std::mem::replace(&mut self.pending, 0.0)
    }
}

/// Plugin driving the whole simulation advance.
pub struct ClockPlugin;

impl Plugin for ClockPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationClock>()
            .add_message::<BufferShifted>()
            .add_systems(Update, advance_simulation.in_set(SimSet::Advance));
    }
}

/// Advance the simulation by the fed wall time.
///
/// Emits exactly `floor((accumulator + fed * speed) / DT_FIXED)` shifts,
/// in order, stopping early only if the buffer runs dry.
#[allow(clippy::too_many_arguments)]
fn advance_simulation(
    mut clock: ResMut<SimulationClock>,
    mut buffer: ResMut<PredictionBuffer>,
    mut bodies: ResMut<Bodies>,
    mut crafts: ResMut<Crafts>,
    mut registry: ResMut<PlanRegistry>,
    mut transfer_search: ResMut<TransferSearch>,
    settings: Res<PredictionSettings>,
    mut shifts: MessageWriter<BufferShifted>,
) {
    let wall = clock.take_pending();
    if clock.is_paused() {
        return;
    }
    let speed = clock.speed() as f64;
    clock.accumulator += wall * speed;

    while clock.accumulator >= DT_FIXED {
        let Some(frame) = buffer.pop_head() else {
            break;
        };
        clock.accumulator -= DT_FIXED;
        bodies.apply_frame(&frame);
        craft::apply_shift(&mut crafts, &bodies);

        if let Some(fired) = registry.on_shift() {
            let launched = crafts
                .get_mut(fired.craft)
                .map(|craft| craft::launch_with_plan(craft, &bodies, &fired.plan));
            match launched {
                Some(Ok(())) => {
                    // The request is fulfilled; remaining plans for it are moot
                    registry.cancel();
                    transfer_search.cancel();
                }
                Some(Err(err)) => {
                    warn!("scheduled launch aborted: {err}");
                    registry.cancel();
                    transfer_search.cancel();
                }
                None => warn!("scheduled launch lost: craft no longer exists"),
            }
        }

        shifts.write(BufferShifted);
    }

    buffer.top_up(&settings);
    craft::extend_free_trajectories(&mut crafts, &buffer, &bodies);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_validation() {
        let mut clock = SimulationClock::default();
        clock.set_speed(8);
        assert_eq!(clock.speed(), 8);

        clock.set_speed(3);
        assert_eq!(clock.speed(), 8, "invalid multiplier must be ignored");
    }

    #[test]
    fn test_feed_rejects_non_finite() {
        let mut clock = SimulationClock::default();
        clock.feed(f64::NAN);
        clock.feed(-1.0);
        assert_eq!(clock.take_pending(), 0.0);

        clock.feed(0.25);
        clock.feed(0.25);
        assert_eq!(clock.take_pending(), 0.5);
        assert_eq!(clock.take_pending(), 0.0);
    }

    #[test]
    fn test_pause_keeps_accumulator() {
        let mut clock = SimulationClock::default();
        clock.accumulator = 0.02;
        clock.pause();
        assert!(clock.is_paused());
        clock.resume();
        assert_eq!(clock.accumulator, 0.02);
    }
}
