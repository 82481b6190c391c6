//! Core controller for a marine lithium-ion battery energy storage system.
//!
//! This crate holds the six tightly coupled subsystems that make up the
//! safety-critical part of the firmware: per-cell aggregation, current-limit
//! derating, coulomb-counting SoC estimation, the protection engine,
//! contactor sequencing, the pack state machine and the multi-pack array
//! coordinator. Everything here is fixed-width integer arithmetic over plain
//! data records; there is no I/O, no allocation and no dependency on any
//! specific MCU, so the full test suite runs on the host.
//!
//! Collaborators that live outside this crate (cell-monitor ASIC driver,
//! CAN framing, non-volatile storage) are represented only by the trait
//! contracts they must satisfy; see `marine-ess-hal`.

#![cfg_attr(not(test), no_std)]

pub mod aggregator;
pub mod array;
pub mod balancing;
pub mod config;
pub mod contactor;
pub mod controller;
pub mod current_limit;
pub mod ems;
pub mod error;
pub mod fault_log;
pub mod pack_state_machine;
pub mod protection;
pub mod soc;
pub mod state;
pub mod status;

pub use array::{ArrayCoordinator, ArrayState};
pub use config::Tunables;
pub use controller::{Controller, ExternalContactorInputs};
pub use ems::{EmsCommand, EmsMessage};
pub use error::CoreError;
pub use fault_log::{FaultEvent, FaultKind, FaultLogSink, RingFaultLog};
pub use pack_state_machine::{ContactorRequest, StateMachineOutcome};
pub use state::{
    CanonicalPackState, CanonicalProtectionState, ContactorState, FaultBits, Mode, PackState,
    ProtectionState, CANONICAL_N_CELLS, CANONICAL_N_SENSORS,
};
pub use status::StatusSnapshot;
