//! Typed errors for facade contract violations.
//!
//! Only contract errors live here. A planner that has not found an
//! acceptable trajectory yet is not an error: it is the `Searching` state,
//! observable through the transfer handle.

use thiserror::Error;

use crate::types::{BodyId, CraftId};

/// Contract errors raised by transfer and launch operations.
/// The simulation itself keeps running after any of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    #[error("unknown craft id {0:?}")]
    UnknownCraft(CraftId),
    #[error("unknown body id {0:?}")]
    UnknownBody(BodyId),
    #[error("destination equals source body")]
    SameBody,
    #[error("craft is not parked in an orbit")]
    NotOrbiting,
    #[error("no acceptable plan available to schedule")]
    NothingToSchedule,
}

/// Raised when resetting to a preset name that does not exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresetError {
    #[error("unknown preset `{0}`")]
    Unknown(String),
}
