//! Candidate trajectory evaluation for the transfer search.
//!
//! Everything here is a pure function over a prediction snapshot, so batches
//! can run on worker tasks without touching main-loop state. Workers reason
//! in snapshot-relative frame indices; the registry adjusts for any shifts
//! that happened since the snapshot was taken.

use std::ops::Range;

use crate::craft::{fly_through, launch_state};
use crate::planner::optimizer::optimize_burn;
use crate::prediction::SnapshotData;
use crate::types::{
    circular_speed, escape_speed, BodyId, CorrectionBurn, CraftFrame, DT_FIXED,
    CRAFT_ORBITAL_ALT,
};

use bevy::prelude::*;

/// Dash-pattern alignment stride for rendered trajectories.
pub const TRAJECTORY_SAMPLE_STRIDE: usize = 4;

/// Tunables for the transfer search.
#[derive(Resource, Clone, Debug)]
pub struct PlannerSettings {
    /// No launch is scheduled sooner than this (seconds).
    pub min_launch_lead: f64,
    /// A launch must leave at least this much horizon after it (seconds).
    pub min_runway: f64,
    /// Launch frames per dispatched batch.
    pub batch_size: usize,
    /// Run the burn optimizer only when the base score is at most this.
    pub pre_opt_threshold: f64,
    /// A corrected score at most this makes a plan acceptable.
    pub post_opt_threshold: f64,
    /// Hard cap on optimizer descent rounds.
    pub max_iterations: usize,
    /// Longest correction burn (seconds).
    pub max_burn_time: f64,
    /// Angle neighbor step in the descent, radians.
    pub angle_step: f64,
    /// Frames averaged after insertion for the corrected score.
    pub scoring_window: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            min_launch_lead: 5.0,
            min_runway: 200.0,
            batch_size: 50,
            pre_opt_threshold: 20.0,
            post_opt_threshold: 5.0,
            max_iterations: 10_000,
            max_burn_time: 10.0,
            angle_step: 0.1_f64.to_radians(),
            scoring_window: 20,
        }
    }
}

impl PlannerSettings {
    /// Earliest searchable launch frame. Never zero: immediate launches are
    /// rejected outright.
    pub fn lead_frames(&self) -> usize {
        ((self.min_launch_lead / DT_FIXED).ceil() as usize).max(1)
    }

    pub fn runway_frames(&self) -> usize {
        (self.min_runway / DT_FIXED).ceil() as usize
    }

    /// Upper bound on burn duration, in frames.
    pub fn burn_frame_cap(&self) -> usize {
        (self.max_burn_time / DT_FIXED).ceil() as usize
    }
}

/// Immutable description of one search problem, captured together with the
/// snapshot it indexes into.
#[derive(Clone, Debug)]
pub struct RouteSpec {
    pub source: BodyId,
    pub destination: BodyId,
    /// Craft altitude above the source body.
    pub altitude: f64,
    /// Craft orbit angle at snapshot time.
    pub base_angle: f64,
    /// Direction the parked orbit sweeps; the planner probes launch
    /// tangents both ways regardless.
    pub orbit_direction: f64,
}

impl RouteSpec {
    fn parent_mass(&self, snapshot: &SnapshotData) -> f64 {
        snapshot.masses[self.source.0]
    }

    fn orbit_radius(&self, snapshot: &SnapshotData) -> f64 {
        snapshot.radii[self.source.0] + self.altitude
    }

    /// Ideal approach distance at the destination.
    pub fn ideal_distance(&self, snapshot: &SnapshotData) -> f64 {
        snapshot.radii[self.destination.0] + CRAFT_ORBITAL_ALT
    }

    /// Orbit angle at a future snapshot frame.
    fn angle_at(&self, snapshot: &SnapshotData, frame: usize) -> f64 {
        let r = self.orbit_radius(snapshot);
        let omega = circular_speed(self.parent_mass(snapshot), r) / r;
        self.base_angle + self.orbit_direction * omega * DT_FIXED * frame as f64
    }
}

/// A transfer the registry considers worth keeping.
///
/// `launch_frame` is the number of buffer shifts until launch; trajectory
/// frame `k` then aligns with buffer frame `launch_frame + k` of the
/// snapshot the plan was computed against. Both it and `arrival_frame` are
/// decremented on every shift; `insertion_frame` indexes into `frames` and
/// never moves.
#[derive(Clone, Debug)]
pub struct TransferPlan {
    pub source: BodyId,
    pub destination: BodyId,
    /// Launch tangent direction, +1 or -1.
    pub direction: f64,
    pub launch_frame: usize,
    pub arrival_frame: usize,
    /// Corrected score: mean approach error over the post-insertion window.
    pub score: f64,
    /// Index of closest approach inside `frames`; also the truncation point.
    pub insertion_frame: usize,
    pub correction: Option<CorrectionBurn>,
    /// Craft frames from launch to insertion, inclusive.
    pub frames: Vec<CraftFrame>,
    /// Rendering hint for dash alignment; shifts with the buffer.
    pub sample_offset: usize,
}

/// Cheapest non-acceptable candidate seen, surfaced for the UI while the
/// search keeps looking.
#[derive(Clone, Copy, Debug)]
pub struct RejectedCandidate {
    pub launch_frame: usize,
    pub score: f64,
}

/// Everything one batch sends back to the main loop.
#[derive(Debug)]
pub struct BatchReport {
    pub generation: u64,
    /// Shift serial of the snapshot the indices are relative to.
    pub snapshot_serial: u64,
    pub range: Range<usize>,
    pub acceptable: Vec<TransferPlan>,
    pub best_rejected: Option<RejectedCandidate>,
}

/// Treat NaN distances (pathological inputs) as infinitely bad.
fn finite_or_inf(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        f64::INFINITY
    }
}

/// Closest approach of a trajectory to the destination.
///
/// Scans for the frame of minimum craft-to-destination distance, then
/// scores that approach against the ideal capture distance. Returns the
/// base score `|d_min - ideal|` and the trajectory index of the minimum,
/// which is also the insertion frame.
pub(crate) fn closest_approach(
    frames: &[CraftFrame],
    snapshot: &SnapshotData,
    launch_frame: usize,
    destination: usize,
    ideal: f64,
) -> Option<(f64, usize)> {
    let mut nearest: Option<(f64, usize)> = None;
    for (k, craft) in frames.iter().enumerate() {
        let dest_pos = snapshot.frames[launch_frame + k].states[destination].pos;
        let dist = finite_or_inf(craft.pos.distance(dest_pos));
        if nearest.map(|(d, _)| dist < d).unwrap_or(true) {
            nearest = Some((dist, k));
        }
    }
    nearest.map(|(d_min, k)| (finite_or_inf((d_min - ideal).abs()), k))
}

/// Outcome of probing a single launch frame in one tangent direction.
struct Probe {
    direction: f64,
    score: f64,
    insertion: usize,
    frames: Vec<CraftFrame>,
    correction: Option<CorrectionBurn>,
    acceptable: bool,
}

/// Evaluate one launch frame, probing both tangent directions and keeping
/// the better outcome.
///
/// Launch at frame `L` means the craft departs once `L` shifts have been
/// consumed, so the launch-moment body state is snapshot frame `L - 1` and
/// the trajectory covers snapshot frames `L..`.
fn evaluate_launch_frame(
    snapshot: &SnapshotData,
    route: &RouteSpec,
    settings: &PlannerSettings,
    launch_frame: usize,
) -> Option<Probe> {
    if launch_frame == 0 {
        return None;
    }
    let ideal = route.ideal_distance(snapshot);
    let parent_mass = route.parent_mass(snapshot);
    let parent_radius = snapshot.radii[route.source.0];
    let esc = escape_speed(parent_mass, route.orbit_radius(snapshot));
    let angle = route.angle_at(snapshot, launch_frame);

    let mut best: Option<Probe> = None;

    for direction in [1.0, -1.0] {
        let start = launch_state(
            angle,
            direction,
            route.altitude,
            parent_mass,
            parent_radius,
            &snapshot.frames[launch_frame - 1].states[route.source.0],
        );
        let params = crate::types::FlightParams {
            launch_body: route.source.0,
            direction,
            escape_speed: esc,
            correction: None,
        };
        let prev = &snapshot.frames[launch_frame - 1];
        let base = fly_through(
            snapshot,
            &snapshot.masses,
            launch_frame,
            prev,
            start,
            0,
            &params,
        );
        if base.is_empty() {
            continue;
        }

        let Some((base_score, base_insertion)) = closest_approach(
            &base,
            snapshot,
            launch_frame,
            route.destination.0,
            ideal,
        ) else {
            continue;
        };

        let probe = if base_score <= settings.pre_opt_threshold {
            match optimize_burn(
                snapshot,
                route,
                settings,
                launch_frame,
                direction,
                start,
                esc,
                &base,
                base_insertion,
                ideal,
            ) {
                Some(opt) => Probe {
                    direction,
                    score: opt.score,
                    insertion: opt.insertion,
                    frames: opt.frames,
                    correction: Some(opt.burn),
                    acceptable: opt.score <= settings.post_opt_threshold,
                },
                None => Probe {
                    direction,
                    score: base_score,
                    insertion: base_insertion,
                    frames: base,
                    correction: None,
                    acceptable: false,
                },
            }
        } else {
            Probe {
                direction,
                score: base_score,
                insertion: base_insertion,
                frames: base,
                correction: None,
                acceptable: false,
            }
        };

        if best.as_ref().map(|b| probe.score < b.score).unwrap_or(true) {
            best = Some(probe);
        }
    }

    best
}

/// Evaluate a contiguous range of launch frames against a snapshot.
///
/// Returns every acceptable trajectory found plus the cheapest rejected
/// candidate as a fallback. Frames without enough runway never reach here;
/// the dispatcher bounds the range.
pub fn evaluate_batch(
    snapshot: &SnapshotData,
    route: &RouteSpec,
    settings: &PlannerSettings,
    generation: u64,
    range: Range<usize>,
) -> BatchReport {
    let mut acceptable = Vec::new();
    let mut best_rejected: Option<RejectedCandidate> = None;

    for launch_frame in range.clone() {
        if launch_frame >= snapshot.frames.len() {
            break;
        }
        let Some(probe) = evaluate_launch_frame(snapshot, route, settings, launch_frame) else {
            continue;
        };

        if probe.acceptable {
            // Truncate at the insertion frame; the tail after closest
            // approach is never flown.
            let mut frames = probe.frames;
            frames.truncate(probe.insertion + 1);
            let arrival_frame = launch_frame + frames.len();
            acceptable.push(TransferPlan {
                source: route.source,
                destination: route.destination,
                direction: probe.direction,
                launch_frame,
                arrival_frame,
                score: probe.score,
                insertion_frame: probe.insertion,
                correction: probe.correction,
                frames,
                sample_offset: launch_frame % TRAJECTORY_SAMPLE_STRIDE,
            });
        } else if best_rejected
            .map(|r| probe.score < r.score)
            .unwrap_or(true)
        {
            best_rejected = Some(RejectedCandidate {
                launch_frame,
                score: probe.score,
            });
        }
    }

    BatchReport {
        generation,
        snapshot_serial: snapshot.serial,
        range,
        acceptable,
        best_rejected,
    }
}
