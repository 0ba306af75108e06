//! Correction burn optimizer.
//!
//! A coordinate descent over (burn angle, burn duration), re-simulating the
//! candidate trajectory for every probe. The objective is the corrected
//! score: the mean approach error over a short window after insertion,
//! which prefers plans that stay near the target altitude instead of
//! merely grazing it.

use crate::craft::fly_through;
use crate::planner::search::{PlannerSettings, RouteSpec};
use crate::prediction::SnapshotData;
use crate::types::{CorrectionBurn, CraftFrame, FlightParams};

/// Result of a successful descent.
pub(crate) struct BurnOutcome {
    pub burn: CorrectionBurn,
    pub frames: Vec<CraftFrame>,
    pub score: f64,
    pub insertion: usize,
}

/// Corrected score of a trajectory: recompute the closest-approach index
/// (the frame of minimum craft-to-destination distance), then average the
/// approach error over `window` frames starting there.
///
/// NaN distances poison the mean to `+inf`, so pathological trajectories
/// are naturally discarded.
pub fn windowed_score(
    frames: &[CraftFrame],
    snapshot: &SnapshotData,
    launch_frame: usize,
    destination: usize,
    ideal: f64,
    window: usize,
) -> Option<(f64, usize)> {
    let (_, insertion) =
        crate::planner::search::closest_approach(frames, snapshot, launch_frame, destination, ideal)?;

    let end = (insertion + window).min(frames.len());
    let mut sum = 0.0;
    for k in insertion..end {
        let dest_pos = snapshot.frames[launch_frame + k].states[destination].pos;
        let err = (frames[k].pos.distance(dest_pos) - ideal).abs();
        sum += if err.is_finite() { err } else { f64::INFINITY };
    }
    Some((sum / (end - insertion) as f64, insertion))
}

/// Re-simulate the candidate with a given burn and score it.
fn evaluate_burn(
    snapshot: &SnapshotData,
    route: &RouteSpec,
    settings: &PlannerSettings,
    launch_frame: usize,
    direction: f64,
    start: CraftFrame,
    escape_speed: f64,
    ideal: f64,
    burn: CorrectionBurn,
) -> Option<(f64, usize, Vec<CraftFrame>)> {
    let params = FlightParams {
        launch_body: route.source.0,
        direction,
        escape_speed,
        correction: Some(burn),
    };
    let frames = fly_through(
        snapshot,
        &snapshot.masses,
        launch_frame,
        &snapshot.frames[launch_frame - 1],
        start,
        0,
        &params,
    );
    let (score, insertion) = windowed_score(
        &frames,
        snapshot,
        launch_frame,
        route.destination.0,
        ideal,
        settings.scoring_window,
    )?;
    Some((score, insertion, frames))
}

/// Descend on the correction burn for one candidate.
///
/// Starts with a one-frame retrograde burn at two thirds of the way to
/// insertion, then repeatedly tries the four neighbors (angle up/down one
/// step, duration up/down one frame) and moves to the best improvement.
/// Stops when no neighbor improves or after the iteration cap.
#[allow(clippy::too_many_arguments)]
pub(crate) fn optimize_burn(
    snapshot: &SnapshotData,
    route: &RouteSpec,
    settings: &PlannerSettings,
    launch_frame: usize,
    direction: f64,
    start: CraftFrame,
    escape_speed: f64,
    base: &[CraftFrame],
    base_insertion: usize,
    ideal: f64,
) -> Option<BurnOutcome> {
    let start_frame = base_insertion * 2 / 3;

    // Retrograde of the craft's velocity at the burn point
    let v_at_start = if start_frame == 0 {
        start.vel
    } else {
        base[start_frame - 1].vel
    };
    let mut burn = CorrectionBurn {
        angle: std::f64::consts::PI + v_at_start.y.atan2(v_at_start.x),
        duration: 1,
        start_frame,
    };

    let duration_cap = settings.burn_frame_cap();

    let (mut score, mut insertion, mut frames) = evaluate_burn(
        snapshot, route, settings, launch_frame, direction, start, escape_speed, ideal, burn,
    )?;

    for _ in 0..settings.max_iterations {
        let mut neighbors = Vec::with_capacity(4);
        neighbors.push(CorrectionBurn {
            angle: burn.angle + settings.angle_step,
            ..burn
        });
        neighbors.push(CorrectionBurn {
            angle: burn.angle - settings.angle_step,
            ..burn
        });
        if burn.duration < duration_cap {
            neighbors.push(CorrectionBurn {
                duration: burn.duration + 1,
                ..burn
            });
        }
        if burn.duration > 0 {
            neighbors.push(CorrectionBurn {
                duration: burn.duration - 1,
                ..burn
            });
        }

        let mut improved = false;
        for candidate in neighbors {
            if let Some((s, i, f)) = evaluate_burn(
                snapshot,
                route,
                settings,
                launch_frame,
                direction,
                start,
                escape_speed,
                ideal,
                candidate,
            ) {
                if s < score {
                    burn = candidate;
                    score = s;
                    insertion = i;
                    frames = f;
                    improved = true;
                }
            }
        }

        if !improved {
            break;
        }
    }

    Some(BurnOutcome {
        burn,
        frames,
        score,
        insertion,
    })
}
