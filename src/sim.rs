//! Headless simulation facade.
//!
//! Hosts (renderers, UIs, tests) drive the core through an opaque
//! `Simulation` handle: feed wall time, read bodies/crafts/prediction,
//! request and schedule transfers. Internally it is a Bevy `App` built on
//! `MinimalPlugins`; the handle is the only thing that mutates it.

use bevy::prelude::*;

use crate::body::{Bodies, Body};
use crate::craft::{self, Craft, CraftState, Crafts};
use crate::error::{PresetError, TransferError};
use crate::planner::{
    ActiveRequest, PlannerPlugin, PlannerSettings, RejectedCandidate, TransferPlan, TransferSearch,
};
use crate::prediction::{PredictionBuffer, PredictionSettings};
use crate::registry::PlanRegistry;
use crate::scenarios::{self, Preset};
use crate::time::{ClockPlugin, SimulationClock};
use crate::types::{BodyId, CraftId, SimSet};

/// Plugin bundle wiring the whole simulator core into an `App`.
///
/// Host apps that embed the core directly (instead of going through
/// `Simulation`) add this plus their own presentation plugins.
pub struct SimulatorPlugin;

impl Plugin for SimulatorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Bodies>()
            .init_resource::<Crafts>()
            .init_resource::<PredictionBuffer>()
            .init_resource::<PredictionSettings>()
            .init_resource::<PlannerSettings>()
            .init_resource::<PlanRegistry>()
            .configure_sets(Update, (SimSet::Advance, SimSet::Plan).chain())
            .add_plugins((ClockPlugin, PlannerPlugin));
    }
}

/// Lifecycle of a transfer request, as shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    /// No request active.
    Idle,
    /// Searching; nothing acceptable yet.
    Searching,
    /// At least one acceptable plan is waiting.
    Ready,
    /// A launch is armed and counting down.
    Scheduled,
}

/// Read-only view of the active transfer request.
pub struct TransferHandle<'a> {
    pub state: TransferState,
    best: Option<&'a TransferPlan>,
    rejected: Option<&'a RejectedCandidate>,
}

impl<'a> TransferHandle<'a> {
    /// The plan `schedule_best` would arm, if any.
    pub fn best_plan(&self) -> Option<&'a TransferPlan> {
        self.best
    }

    /// Cheapest rejected candidate, for display while searching.
    /// Scheduling is disabled for these.
    pub fn best_rejected(&self) -> Option<&'a RejectedCandidate> {
        self.rejected
    }
}

/// The opaque simulation handle.
#[derive(Debug)]
pub struct Simulation {
    app: App,
}

impl Simulation {
    /// Build a fresh simulation loaded with the named preset.
    pub fn new(preset_id: &str) -> Result<Self, PresetError> {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(SimulatorPlugin);
        let mut sim = Self { app };
        sim.reset(preset_id)?;
        Ok(sim)
    }

    /// Discard all buffers and plans and reload a preset.
    pub fn reset(&mut self, preset_id: &str) -> Result<(), PresetError> {
        let preset: &Preset = scenarios::preset(preset_id)
            .ok_or_else(|| PresetError::Unknown(preset_id.to_string()))?;
        scenarios::apply_preset(self.app.world_mut(), preset);
        Ok(())
    }

    /// Advance the simulation by wall-clock seconds.
    pub fn tick(&mut self, real_dt: f64) {
        self.app
            .world_mut()
            .resource_mut::<SimulationClock>()
            .feed(real_dt);
        self.app.update();
    }

    pub fn set_speed(&mut self, multiplier: u32) {
        self.app
            .world_mut()
            .resource_mut::<SimulationClock>()
            .set_speed(multiplier);
    }

    pub fn speed(&self) -> u32 {
        self.app.world().resource::<SimulationClock>().speed()
    }

    pub fn pause(&mut self) {
        self.app
            .world_mut()
            .resource_mut::<SimulationClock>()
            .pause();
    }

    pub fn resume(&mut self) {
        self.app
            .world_mut()
            .resource_mut::<SimulationClock>()
            .resume();
    }

    pub fn is_paused(&self) -> bool {
        self.app.world().resource::<SimulationClock>().is_paused()
    }

    /// Read-only view of the bodies.
    pub fn bodies(&self) -> &[Body] {
        self.app.world().resource::<Bodies>().as_slice()
    }

    /// Read-only view of the crafts.
    pub fn crafts(&self) -> &[Craft] {
        self.app.world().resource::<Crafts>().as_slice()
    }

    /// Read-only view of the prediction buffer.
    pub fn prediction(&self) -> &PredictionBuffer {
        self.app.world().resource::<PredictionBuffer>()
    }

    /// Begin planning a transfer for `craft` to `destination`.
    ///
    /// Contract errors abort the request; the simulation keeps running.
    pub fn request_transfer(
        &mut self,
        craft: CraftId,
        destination: BodyId,
    ) -> Result<(), TransferError> {
        let world = self.app.world_mut();

        let source = {
            let crafts = world.resource::<Crafts>();
            let bodies = world.resource::<Bodies>();
            let entry = crafts.get(craft).ok_or(TransferError::UnknownCraft(craft))?;
            if !bodies.contains(destination) {
                return Err(TransferError::UnknownBody(destination));
            }
            let CraftState::Orbiting(orbit) = &entry.state else {
                return Err(TransferError::NotOrbiting);
            };
            if orbit.parent == destination {
                return Err(TransferError::SameBody);
            }
            orbit.parent
        };

        let lead = world.resource::<PlannerSettings>().lead_frames();
        let serial = world.resource::<PredictionBuffer>().shift_serial();
        world.resource_mut::<PlanRegistry>().cancel();
        world.resource_mut::<TransferSearch>().begin(
            ActiveRequest {
                craft,
                source,
                destination,
            },
            lead,
            serial,
        );
        world
            .resource_mut::<PlanRegistry>()
            .seed_from_cache(source, destination);
        Ok(())
    }

    /// Current transfer request state and plans.
    pub fn transfer(&self) -> TransferHandle<'_> {
        let world = self.app.world();
        let registry = world.resource::<PlanRegistry>();
        let transfer_search = world.resource::<TransferSearch>();

        let state = if registry.scheduled().is_some() {
            TransferState::Scheduled
        } else if transfer_search.is_active() {
            if registry.current_best().is_some() {
                TransferState::Ready
            } else {
                TransferState::Searching
            }
        } else {
            TransferState::Idle
        };

        TransferHandle {
            state,
            best: registry.current_best(),
            rejected: registry.best_rejected(),
        }
    }

    /// Arm the current best plan for launch.
    pub fn schedule_best(&mut self) -> Result<(), TransferError> {
        let world = self.app.world_mut();
        let craft = world
            .resource::<TransferSearch>()
            .request()
            .map(|request| request.craft)
            .ok_or(TransferError::NothingToSchedule)?;

        world
            .resource_mut::<PlanRegistry>()
            .schedule_best(craft)
            .map(|_| ())
            .ok_or(TransferError::NothingToSchedule)
    }

    /// Drop the active request (and any armed launch). The route cache is
    /// kept, so an identical request against an unshifted buffer is
    /// instantly Ready again.
    pub fn cancel_transfer(&mut self) {
        let world = self.app.world_mut();
        world.resource_mut::<TransferSearch>().cancel();
        world.resource_mut::<PlanRegistry>().cancel();
    }

    /// Launch a parked craft into plan-less free flight.
    pub fn launch_craft(&mut self, craft: CraftId) -> Result<(), TransferError> {
        let world = self.app.world_mut();
        world.resource_scope(|world, mut crafts: Mut<Crafts>| {
            let bodies = world.resource::<Bodies>();
            let buffer = world.resource::<PredictionBuffer>();
            let entry = crafts
                .get_mut(craft)
                .ok_or(TransferError::UnknownCraft(craft))?;
            craft::launch(entry, bodies, buffer)
        })
    }

    /// Direct access to the underlying ECS world, for embedding hosts and
    /// integration tests that tune settings before `reset`.
    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_loads_preset() {
        let sim = Simulation::new("sol_terra").expect("preset exists");
        assert_eq!(sim.bodies().len(), 2);
        assert_eq!(sim.crafts().len(), 1);
        assert!(sim.crafts()[0].is_orbiting());
        assert!(sim.prediction().len() > 0);
    }

    #[test]
    fn test_new_rejects_unknown_preset() {
        let err = Simulation::new("missing").unwrap_err();
        assert_eq!(err, PresetError::Unknown("missing".to_string()));
    }

    #[test]
    fn test_transfer_contract_errors() {
        let mut sim = Simulation::new("inner_system").unwrap();

        // destination == source
        assert_eq!(
            sim.request_transfer(CraftId(0), BodyId(1)),
            Err(TransferError::SameBody)
        );
        // unknown ids
        assert_eq!(
            sim.request_transfer(CraftId(9), BodyId(2)),
            Err(TransferError::UnknownCraft(CraftId(9)))
        );
        assert_eq!(
            sim.request_transfer(CraftId(0), BodyId(9)),
            Err(TransferError::UnknownBody(BodyId(9)))
        );

        // A failed request leaves the handle idle and the planner untouched
        assert_eq!(sim.transfer().state, TransferState::Idle);
    }

    #[test]
    fn test_request_enters_searching() {
        let mut sim = Simulation::new("inner_system").unwrap();
        sim.request_transfer(CraftId(0), BodyId(2)).unwrap();
        assert_eq!(sim.transfer().state, TransferState::Searching);

        sim.cancel_transfer();
        assert_eq!(sim.transfer().state, TransferState::Idle);
    }

    #[test]
    fn test_schedule_without_plan_errors() {
        let mut sim = Simulation::new("inner_system").unwrap();
        assert_eq!(
            sim.schedule_best(),
            Err(TransferError::NothingToSchedule)
        );
    }
}
