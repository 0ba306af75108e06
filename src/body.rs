//! The body roster: a dense array owning every gravitating body.
//!
//! Bodies are created at reset and keep their mass, radius and identity for
//! the rest of the run. Their kinematic state is owned by the prediction
//! buffer head; the roster only holds the most recently popped values.

use bevy::prelude::*;

use crate::prediction::BodyFrame;
use crate::types::{BodyId, BodyState};

/// A gravitationally massive body with a radius for capture arithmetic.
#[derive(Clone, Debug)]
pub struct Body {
    /// Display name.
    pub name: String,
    /// Mass in world units. Immutable after reset.
    pub mass: f64,
    /// Radius in world units. Immutable after reset.
    pub radius: f64,
    /// Most recently popped kinematic state.
    pub state: BodyState,
}

/// Resource holding all bodies in stable dense order.
#[derive(Resource, Default, Debug)]
pub struct Bodies {
    entries: Vec<Body>,
}

impl Bodies {
    /// Replace the roster wholesale. Used by scenario reset only.
    pub fn reset(&mut self, entries: Vec<Body>) {
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.entries.get(id.0)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        id.0 < self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.entries.iter()
    }

    /// Read-only view of the whole roster.
    pub fn as_slice(&self) -> &[Body] {
        &self.entries
    }

    /// Masses in roster order, as the integrator consumes them.
    pub fn masses(&self) -> Vec<f64> {
        self.entries.iter().map(|b| b.mass).collect()
    }

    /// Radii in roster order.
    pub fn radii(&self) -> Vec<f64> {
        self.entries.iter().map(|b| b.radius).collect()
    }

    /// Kinematic states in roster order.
    pub fn states(&self) -> Vec<BodyState> {
        self.entries.iter().map(|b| b.state).collect()
    }

    /// Adopt a popped prediction frame as the authoritative body state.
    pub fn apply_frame(&mut self, frame: &BodyFrame) {
        debug_assert_eq!(frame.states.len(), self.entries.len());
        for (body, state) in self.entries.iter_mut().zip(frame.states.iter()) {
            body.state = *state;
        }
    }
}
