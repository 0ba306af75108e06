//! Parallel transfer search over future launch frames.
//!
//! The main loop owns a `TransferSearch` resource tracking the active
//! request, the current snapshot, and the in-flight batches. Batches are
//! pure evaluations dispatched to the async compute pool; each carries the
//! generation it was spawned under and the shift serial of its snapshot, so
//! stale replies are dropped and fresh ones are adjusted for any buffer
//! shifts that happened in the meantime.

pub mod optimizer;
pub mod search;

use std::panic::{catch_unwind, AssertUnwindSafe};

use bevy::prelude::*;
use bevy::tasks::{block_on, futures_lite::future, AsyncComputeTaskPool, Task, TaskPool};

use crate::body::Bodies;
use crate::craft::{CraftState, Crafts};
use crate::prediction::{PredictionBuffer, PredictionSnapshot};
use crate::registry::PlanRegistry;
use crate::types::{BodyId, CraftId, SimSet};

pub use search::{
    BatchReport, PlannerSettings, RejectedCandidate, RouteSpec, TransferPlan,
    TRAJECTORY_SAMPLE_STRIDE,
};

/// An active transfer request.
#[derive(Clone, Copy, Debug)]
pub struct ActiveRequest {
    pub craft: CraftId,
    pub source: BodyId,
    pub destination: BodyId,
}

/// One batch currently running on the compute pool.
struct InFlightBatch {
    generation: u64,
    task: Task<Result<BatchReport, String>>,
}

/// Resource orchestrating the search.
#[derive(Resource, Default)]
pub struct TransferSearch {
    request: Option<ActiveRequest>,
    /// Bumped on every new request or cancel; stale batch replies are
    /// dropped on receipt.
    generation: u64,
    snapshot: Option<PredictionSnapshot>,
    route: Option<RouteSpec>,
    /// High-water mark of dispatched launch frames, buffer-relative.
    searched_up_to: usize,
    last_seen_serial: u64,
    in_flight: Vec<InFlightBatch>,
}

impl TransferSearch {
    /// Start searching a new route. Cancels anything in flight.
    pub fn begin(&mut self, request: ActiveRequest, lead_frames: usize, buffer_serial: u64) {
        self.generation += 1;
        self.request = Some(request);
        self.snapshot = None;
        self.route = None;
        self.searched_up_to = lead_frames;
        self.last_seen_serial = buffer_serial;
        // Dropping a task cancels it
        self.in_flight.clear();
    }

    /// Abandon the current request.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.request = None;
        self.snapshot = None;
        self.route = None;
        self.in_flight.clear();
    }

    pub fn request(&self) -> Option<&ActiveRequest> {
        self.request.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.request.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Launch frames covered so far, buffer-relative.
    pub fn searched_up_to(&self) -> usize {
        self.searched_up_to
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether the sweep has covered everything the horizon allows.
    pub fn sweep_complete(&self, buffer_len: usize, settings: &PlannerSettings) -> bool {
        self.in_flight.is_empty()
            && self.searched_up_to >= buffer_len.saturating_sub(settings.runway_frames())
    }
}

/// Plugin wiring the planner systems after the simulation advance.
pub struct PlannerPlugin;

impl Plugin for PlannerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransferSearch>().add_systems(
            Update,
            (track_shifts, collect_batches, dispatch_batches)
                .chain()
                .in_set(SimSet::Plan),
        );
    }
}

/// Keep the searched high-water mark aligned with the rolling buffer.
///
/// While batches are in flight the mark is left alone (their replies carry
/// their own snapshot serial and get adjusted on receipt); once the search
/// is idle, each shift moves the frontier back one frame, preserving sweep
/// progress across shifts.
fn track_shifts(
    mut transfer_search: ResMut<TransferSearch>,
    buffer: Res<PredictionBuffer>,
    settings: Res<PlannerSettings>,
) {
    let serial = buffer.shift_serial();
    let delta = serial.saturating_sub(transfer_search.last_seen_serial) as usize;
    transfer_search.last_seen_serial = serial;

    if delta > 0 && transfer_search.is_active() && transfer_search.in_flight.is_empty() {
        let floor = settings.lead_frames();
        transfer_search.searched_up_to =
            transfer_search.searched_up_to.saturating_sub(delta).max(floor);
    }
}

/// Poll in-flight batches and merge finished ones into the registry.
fn collect_batches(
    mut transfer_search: ResMut<TransferSearch>,
    mut registry: ResMut<PlanRegistry>,
    buffer: Res<PredictionBuffer>,
) {
    let current_generation = transfer_search.generation;
    let live_serial = buffer.shift_serial();

    transfer_search.in_flight.retain_mut(|batch| {
        let Some(result) = block_on(future::poll_once(&mut batch.task)) else {
            return true;
        };

        let report = match result {
            Ok(report) => report,
            Err(message) => {
                // A failed worker just means a missing batch; the main loop
                // is never blocked by it.
                warn!("planner batch failed: {message}");
                return false;
            }
        };

        if batch.generation != current_generation {
            debug!(
                "dropping stale planner batch (generation {} != {})",
                batch.generation, current_generation
            );
            return false;
        }

        let shift_delta = live_serial.saturating_sub(report.snapshot_serial) as usize;
        for plan in report.acceptable {
            registry.ingest(plan, shift_delta);
        }
        if let Some(rejected) = report.best_rejected {
            registry.ingest_rejected(rejected, shift_delta);
        }
        false
    });
}

/// Dispatch the next tranche of launch frames to idle worker slots.
///
/// A fresh snapshot is captured whenever the buffer shifted since the last
/// one, so newly spawned batches always index the live buffer. Dispatch
/// stops at the runway boundary; new tail frames re-open it.
fn dispatch_batches(
    mut transfer_search: ResMut<TransferSearch>,
    buffer: Res<PredictionBuffer>,
    bodies: Res<Bodies>,
    crafts: Res<Crafts>,
    settings: Res<PlannerSettings>,
) {
    let Some(request) = transfer_search.request else {
        return;
    };

    // The craft may have launched or despawned since the request
    let parked = crafts
        .get(request.craft)
        .and_then(|craft| match &craft.state {
            CraftState::Orbiting(orbit) => Some(orbit.clone()),
            CraftState::Free(_) => None,
        });
    let Some(orbit) = parked else {
        debug!("transfer request craft is no longer parked; cancelling search");
        transfer_search.cancel();
        return;
    };

    let pool = AsyncComputeTaskPool::get_or_init(TaskPool::new);
    let slots = pool.thread_num().max(1);
    let limit = buffer.len().saturating_sub(settings.runway_frames());

    if transfer_search.searched_up_to >= limit || transfer_search.in_flight.len() >= slots {
        return;
    }

    // Re-snapshot before dispatching a tranche if the buffer moved
    let stale = transfer_search
        .snapshot
        .as_ref()
        .map(|snap| snap.0.serial != buffer.shift_serial())
        .unwrap_or(true);
    if stale {
        if buffer.is_empty() || !bodies.contains(request.destination) {
            return;
        }
        transfer_search.snapshot = Some(buffer.snapshot());
        transfer_search.route = Some(RouteSpec {
            source: orbit.parent,
            destination: request.destination,
            altitude: orbit.altitude,
            base_angle: orbit.angle,
            orbit_direction: orbit.direction,
        });
    }

    let (Some(snapshot), Some(route)) =
        (transfer_search.snapshot.clone(), transfer_search.route.clone())
    else {
        return;
    };

    while transfer_search.in_flight.len() < slots && transfer_search.searched_up_to < limit {
        let start = transfer_search.searched_up_to;
        let end = (start + settings.batch_size).min(limit);
        transfer_search.searched_up_to = end;

        let snap = snapshot.clone();
        let batch_route = route.clone();
        let batch_settings = (*settings).clone();
        let generation = transfer_search.generation;

        let task = pool.spawn(async move {
            catch_unwind(AssertUnwindSafe(|| {
                search::evaluate_batch(&snap.0, &batch_route, &batch_settings, generation, start..end)
            }))
            .map_err(|_| format!("panic while evaluating launch frames {start}..{end}"))
        });

        transfer_search.in_flight.push(InFlightBatch { generation, task });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_resets_progress_and_bumps_generation() {
        let mut transfer_search = TransferSearch::default();
        let generation_before = transfer_search.generation();

        transfer_search.begin(
            ActiveRequest {
                craft: CraftId(0),
                source: BodyId(1),
                destination: BodyId(2),
            },
            152,
            0,
        );

        assert!(transfer_search.is_active());
        assert_eq!(transfer_search.searched_up_to(), 152);
        assert_eq!(transfer_search.generation(), generation_before + 1);
        assert_eq!(transfer_search.in_flight_count(), 0);
    }

    #[test]
    fn test_cancel_clears_request_and_invalidates_generation() {
        let mut transfer_search = TransferSearch::default();
        transfer_search.begin(
            ActiveRequest {
                craft: CraftId(0),
                source: BodyId(1),
                destination: BodyId(2),
            },
            10,
            0,
        );
        let generation = transfer_search.generation();

        transfer_search.cancel();

        assert!(!transfer_search.is_active());
        assert!(transfer_search.generation() > generation);
    }

    #[test]
    fn test_sweep_complete_accounts_for_runway() {
        let mut transfer_search = TransferSearch::default();
        let settings = PlannerSettings::default();
        transfer_search.searched_up_to = 5000;

        // 10910-frame horizon minus 6061 runway frames leaves 4849
        assert!(transfer_search.sweep_complete(10_910, &settings));
        transfer_search.searched_up_to = 4000;
        assert!(!transfer_search.sweep_complete(10_910, &settings));
    }
}
