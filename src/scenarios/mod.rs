//! Preset worlds and the reset path that loads them.

pub mod presets;

use bevy::math::DVec2;
use bevy::prelude::*;

use crate::body::{Bodies, Body};
use crate::craft::{Craft, CraftState, Crafts, Orbit};
use crate::planner::TransferSearch;
use crate::prediction::{PredictionBuffer, PredictionSettings};
use crate::registry::PlanRegistry;
use crate::time::SimulationClock;
use crate::types::{circular_speed, BodyId, BodyState};

pub use presets::PRESETS;

/// One body in a preset.
#[derive(Clone, Copy, Debug)]
pub struct BodySpec {
    pub name: &'static str,
    pub pos: (f64, f64),
    /// Initial velocity; `None` means circular orbit around body 0.
    pub vel: Option<(f64, f64)>,
    pub mass: f64,
    pub radius: f64,
}

/// One craft in a preset, parked in orbit.
#[derive(Clone, Copy, Debug)]
pub struct CraftSpec {
    pub name: &'static str,
    /// Index of the parent body within the preset.
    pub parent: usize,
    pub altitude: f64,
    pub angle: f64,
}

/// A named world configuration.
#[derive(Clone, Copy, Debug)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub bodies: &'static [BodySpec],
    pub crafts: &'static [CraftSpec],
}

/// Look up a preset by id.
pub fn preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Resolve a body spec into a live body, computing circular velocity around
/// the primary when the preset leaves it implicit.
fn resolve_body(spec: &BodySpec, primary: &BodySpec) -> Body {
    let pos = DVec2::new(spec.pos.0, spec.pos.1);
    let vel = match spec.vel {
        Some((vx, vy)) => DVec2::new(vx, vy),
        None => {
            let offset = pos - DVec2::new(primary.pos.0, primary.pos.1);
            let r = offset.length();
            let tangent = DVec2::new(-offset.y, offset.x) / r;
            tangent * circular_speed(primary.mass, r)
        }
    };
    Body {
        name: spec.name.to_string(),
        mass: spec.mass,
        radius: spec.radius,
        state: BodyState::new(pos, vel),
    }
}

/// Discard every buffer and plan and load the preset into the world.
pub fn apply_preset(world: &mut World, preset: &Preset) {
    info!("loading preset: {} ({})", preset.name, preset.id);

    let primary = &preset.bodies[0];
    let bodies_list: Vec<Body> = preset
        .bodies
        .iter()
        .map(|spec| resolve_body(spec, primary))
        .collect();
    let crafts_list: Vec<Craft> = preset
        .crafts
        .iter()
        .map(|spec| Craft {
            name: spec.name.to_string(),
            state: CraftState::Orbiting(Orbit {
                parent: BodyId(spec.parent),
                altitude: spec.altitude,
                angle: spec.angle,
                direction: 1.0,
            }),
        })
        .collect();

    world.resource_mut::<Bodies>().reset(bodies_list);
    world.resource_mut::<Crafts>().reset(crafts_list);
    world.resource_mut::<SimulationClock>().reset();
    world.resource_mut::<PlanRegistry>().clear();
    world.resource_mut::<TransferSearch>().cancel();

    world.resource_scope(|world, mut buffer: Mut<PredictionBuffer>| {
        let bodies = world.resource::<Bodies>();
        let settings = world.resource::<PredictionSettings>();
        buffer.initialize(bodies, settings);
    });
}
