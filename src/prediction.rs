//! Rolling-horizon prediction of body motion.
//!
//! The prediction buffer is the single source of truth for where bodies are
//! going. The clock consumes frames at the head (each pop is a "shift" and
//! becomes the authoritative body state), and the tail is topped up by
//! integrating forward, so the simulation advances in lock-step with its own
//! predictions. The planner reads an immutable snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use bevy::prelude::*;

use crate::body::Bodies;
use crate::physics::nbody_step;
use crate::types::{BodyId, BodyState, DT_FIXED};

/// One predicted world state: every body's kinematics, dense in roster order.
#[derive(Clone, Debug)]
pub struct BodyFrame {
    pub states: Vec<BodyState>,
}

/// Message written once per consumed frame, in pop order.
///
/// Every consumer that subscribes before a tick sees exactly as many of
/// these as the accumulator produced whole steps, in order.
#[derive(Message)]
pub struct BufferShifted;

/// Configuration for the prediction horizon.
#[derive(Resource, Clone, Debug)]
pub struct PredictionSettings {
    /// Look-ahead covered by the buffer, in seconds.
    pub horizon_time: f64,
    /// Prefix of the horizon rendered solid; the remainder is the fade
    /// region. Purely a rendering hint, correctness holds with fade = 0.
    pub solid_time: f64,
    /// Most frames integrated onto the tail per tick.
    pub max_catchup: usize,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            horizon_time: 360.0,
            solid_time: 320.0,
            max_catchup: 100,
        }
    }
}

impl PredictionSettings {
    /// Target buffer length in frames.
    pub fn horizon_frames(&self) -> usize {
        (self.horizon_time / DT_FIXED).ceil() as usize
    }

    /// First frame of the fade region.
    pub fn solid_frames(&self) -> usize {
        (self.solid_time / DT_FIXED).ceil() as usize
    }
}

/// FIFO of predicted body frames covering up to the configured horizon.
///
/// Frame `i` represents the world `(i + 1) * DT_FIXED` seconds after the
/// currently visible body state. Insertion happens only at the tail,
/// removal only at the head.
#[derive(Resource, Default, Debug)]
pub struct PredictionBuffer {
    frames: VecDeque<BodyFrame>,
    /// Integration state at the tail, one step ahead of the last frame.
    tail: Vec<BodyState>,
    masses: Vec<f64>,
    radii: Vec<f64>,
    shift_serial: u64,
}

impl PredictionBuffer {
    /// Rebuild from the current roster. Fills at most one catch-up tranche;
    /// subsequent ticks grow the buffer to the full horizon.
    pub fn initialize(&mut self, bodies: &Bodies, settings: &PredictionSettings) {
        self.frames.clear();
        self.tail = bodies.states();
        self.masses = bodies.masses();
        self.radii = bodies.radii();
        self.shift_serial = 0;
        self.top_up(settings);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total number of shifts since initialization.
    pub fn shift_serial(&self) -> u64 {
        self.shift_serial
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Random read of a whole frame.
    pub fn frame(&self, index: usize) -> Option<&BodyFrame> {
        self.frames.get(index)
    }

    /// Random read of one body's predicted state.
    pub fn body_state(&self, index: usize, body: BodyId) -> Option<BodyState> {
        self.frames
            .get(index)
            .and_then(|f| f.states.get(body.0))
            .copied()
    }

    /// Consume the head frame. The caller adopts it as the authoritative
    /// body state and must emit exactly one shift notification.
    pub fn pop_head(&mut self) -> Option<BodyFrame> {
        let frame = self.frames.pop_front()?;
        self.shift_serial += 1;
        Some(frame)
    }

    /// Integrate new frames onto the tail, up to the catch-up cap and never
    /// past the horizon.
    pub fn top_up(&mut self, settings: &PredictionSettings) {
        let horizon = settings.horizon_frames();
        let mut added = 0;
        while self.frames.len() < horizon && added < settings.max_catchup {
            nbody_step(&mut self.tail, &self.masses, DT_FIXED);
            self.frames.push_back(BodyFrame {
                states: self.tail.clone(),
            });
            added += 1;
        }
    }

    /// Immutable view for the planner. Cheap to clone and to send across
    /// worker tasks; the frame data is copied exactly once per snapshot.
    pub fn snapshot(&self) -> PredictionSnapshot {
        PredictionSnapshot(Arc::new(SnapshotData {
            frames: self.frames.iter().cloned().collect(),
            masses: self.masses.clone(),
            radii: self.radii.clone(),
            serial: self.shift_serial,
        }))
    }
}

/// Frozen copy of the buffer shared with planner workers.
#[derive(Debug)]
pub struct SnapshotData {
    pub frames: Vec<BodyFrame>,
    pub masses: Vec<f64>,
    pub radii: Vec<f64>,
    /// Shift serial at capture time. The difference to the live serial is
    /// the index adjustment applied when a result is merged.
    pub serial: u64,
}

/// Shared handle to a snapshot.
#[derive(Clone, Debug)]
pub struct PredictionSnapshot(pub Arc<SnapshotData>);

/// Frame-indexed access shared by the live buffer and snapshots, so flight
/// simulation code has exactly one implementation.
pub trait FrameLookup {
    fn frame_count(&self) -> usize;
    fn body_frame(&self, index: usize) -> &BodyFrame;
}

impl FrameLookup for PredictionBuffer {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn body_frame(&self, index: usize) -> &BodyFrame {
        &self.frames[index]
    }
}

impl FrameLookup for SnapshotData {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn body_frame(&self, index: usize) -> &BodyFrame {
        &self.frames[index]
    }
}
