//! Preset world definitions.
//!
//! Each preset lists bodies (position, mass, radius) and crafts (parent,
//! altitude, starting angle). Velocities left at `None` are computed at load
//! time as the circular orbit speed around the primary, so presets stay
//! consistent if masses are tuned.

use super::{BodySpec, CraftSpec, Preset};
use crate::types::CRAFT_ORBITAL_ALT;

/// All available presets.
pub static PRESETS: &[Preset] = &[SOL_TERRA, INNER_SYSTEM];

/// Two bodies, one craft. The smallest world where orbits, prediction and
/// manual launches can be exercised.
pub static SOL_TERRA: Preset = Preset {
    id: "sol_terra",
    name: "Sol & Terra",
    description: "A star and a single planet with a parked craft.",
    bodies: &[
        BodySpec {
            name: "Sol",
            pos: (0.0, 0.0),
            vel: Some((0.0, 0.0)),
            mass: 1000.0,
            radius: 80.0,
        },
        BodySpec {
            name: "Terra",
            pos: (600.0, 0.0),
            vel: None, // circular around Sol
            mass: 50.0,
            radius: 25.0,
        },
    ],
    crafts: &[CraftSpec {
        name: "Pathfinder",
        parent: 1,
        altitude: CRAFT_ORBITAL_ALT,
        angle: 0.0,
    }],
};

/// Three bodies with a craft parked at the inner planet, the reference
/// world for transfer planning between Ember and Terra.
pub static INNER_SYSTEM: Preset = Preset {
    id: "inner_system",
    name: "Inner System",
    description: "Sol with two planets; the craft starts at Ember.",
    bodies: &[
        BodySpec {
            name: "Sol",
            pos: (0.0, 0.0),
            vel: Some((0.0, 0.0)),
            mass: 1000.0,
            radius: 80.0,
        },
        BodySpec {
            name: "Ember",
            pos: (300.0, 0.0),
            vel: None,
            mass: 20.0,
            radius: 15.0,
        },
        BodySpec {
            name: "Terra",
            pos: (600.0, 0.0),
            vel: None,
            mass: 50.0,
            radius: 25.0,
        },
    ],
    crafts: &[CraftSpec {
        name: "Wayfarer",
        parent: 1,
        altitude: CRAFT_ORBITAL_ALT,
        angle: 0.0,
    }],
};
