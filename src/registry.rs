//! Shift-aware registry of acceptable transfer plans.
//!
//! Planner results arrive by value, possibly out of order and possibly
//! stale. The registry adjusts their buffer-relative indices for shifts
//! that happened since their snapshot, keeps the survivors sorted by
//! arrival, expires entries whose launch time has passed, and counts down
//! a scheduled launch.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::planner::{RejectedCandidate, TransferPlan, TRAJECTORY_SAMPLE_STRIDE};
use crate::types::{BodyId, CraftId};

/// A launch armed by the user, fired when its countdown reaches zero.
#[derive(Clone, Debug)]
pub struct ScheduledLaunch {
    pub craft: CraftId,
    pub plan: TransferPlan,
}

/// Resource holding accepted plans, the per-route cache, and the pending
/// scheduled launch.
#[derive(Resource, Default, Debug)]
pub struct PlanRegistry {
    /// Alive plans, sorted ascending by arrival frame.
    acceptable: Vec<TransferPlan>,
    /// Most recent acceptable plan per (source, destination) route.
    /// Survives request cancellation; cleared only on world reset.
    cache: HashMap<(BodyId, BodyId), TransferPlan>,
    /// Cheapest non-acceptable candidate, for UI display while searching.
    best_rejected: Option<RejectedCandidate>,
    scheduled: Option<ScheduledLaunch>,
}

/// Move a plan's buffer-relative indices back by `delta` shifts.
/// Returns false when the launch time has already passed.
fn rebase_plan(plan: &mut TransferPlan, delta: usize) -> bool {
    if plan.launch_frame <= delta {
        return false;
    }
    plan.launch_frame -= delta;
    plan.arrival_frame = plan.arrival_frame.saturating_sub(delta);
    plan.sample_offset = (plan.sample_offset + TRAJECTORY_SAMPLE_STRIDE
        - delta % TRAJECTORY_SAMPLE_STRIDE)
        % TRAJECTORY_SAMPLE_STRIDE;
    true
}

impl PlanRegistry {
    /// Merge a planner result, adjusting for shifts since its snapshot.
    /// Entries for the same launch frame are replaced: last write wins.
    pub fn ingest(&mut self, mut plan: TransferPlan, shift_delta: usize) -> bool {
        if !rebase_plan(&mut plan, shift_delta) {
            return false;
        }

        self.acceptable
            .retain(|existing| existing.launch_frame != plan.launch_frame);

        let at = self
            .acceptable
            .partition_point(|existing| existing.arrival_frame <= plan.arrival_frame);

        // The route cache keeps the cheapest live plan, so a restarted
        // search is seeded with a score no worse than anything seen before.
        match self.cache.entry((plan.source, plan.destination)) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if plan.score <= slot.get().score {
                    slot.insert(plan.clone());
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(plan.clone());
            }
        }
        self.acceptable.insert(at, plan);
        true
    }

    /// Track the cheapest rejected candidate for UI display.
    pub fn ingest_rejected(&mut self, mut candidate: RejectedCandidate, shift_delta: usize) {
        if candidate.launch_frame <= shift_delta {
            return;
        }
        candidate.launch_frame -= shift_delta;
        if self
            .best_rejected
            .map(|best| candidate.score < best.score)
            .unwrap_or(true)
        {
            self.best_rejected = Some(candidate);
        }
    }

    /// The plan a schedule action would arm: earliest arrival.
    pub fn current_best(&self) -> Option<&TransferPlan> {
        self.acceptable.first()
    }

    pub fn best_rejected(&self) -> Option<&RejectedCandidate> {
        self.best_rejected.as_ref()
    }

    pub fn acceptable(&self) -> &[TransferPlan] {
        &self.acceptable
    }

    pub fn scheduled(&self) -> Option<&ScheduledLaunch> {
        self.scheduled.as_ref()
    }

    /// Re-seed the acceptable list from the route cache, so restarting a
    /// cancelled search against an unshifted buffer is instantly Ready.
    pub fn seed_from_cache(&mut self, source: BodyId, destination: BodyId) {
        if let Some(plan) = self.cache.get(&(source, destination)) {
            if plan.launch_frame > 0 {
                let plan = plan.clone();
                self.ingest(plan, 0);
            }
        }
    }

    /// Arm the current best plan for launch. Returns the armed plan.
    pub fn schedule_best(&mut self, craft: CraftId) -> Option<&ScheduledLaunch> {
        if self.acceptable.is_empty() {
            return None;
        }
        let plan = self.acceptable.remove(0);
        self.scheduled = Some(ScheduledLaunch { craft, plan });
        self.scheduled.as_ref()
    }

    /// Apply one buffer shift: decrement every index, expire passed plans,
    /// and pop the scheduled launch if its countdown just reached zero.
    pub fn on_shift(&mut self) -> Option<ScheduledLaunch> {
        self.acceptable.retain_mut(|plan| rebase_plan(plan, 1));
        self.cache.retain(|_, plan| rebase_plan(plan, 1));

        if let Some(rejected) = &mut self.best_rejected {
            if rejected.launch_frame <= 1 {
                self.best_rejected = None;
            } else {
                rejected.launch_frame -= 1;
            }
        }

        if let Some(scheduled) = &mut self.scheduled {
            scheduled.plan.launch_frame = scheduled.plan.launch_frame.saturating_sub(1);
            scheduled.plan.arrival_frame = scheduled.plan.arrival_frame.saturating_sub(1);
            if scheduled.plan.launch_frame == 0 {
                return self.scheduled.take();
            }
        }
        None
    }

    /// Drop the active request's plans but keep the route cache.
    pub fn cancel(&mut self) {
        self.acceptable.clear();
        self.best_rejected = None;
        self.scheduled = None;
    }

    /// Full reset, used when loading a preset.
    pub fn clear(&mut self) {
        self.cancel();
        self.cache.clear();
    }
}
