//! Hardware-collaborator contracts for the marine ESS controller (spec §9:
//! "an abstract capability set" with "two implementations coexist").
//!
//! `marine-ess-core` never depends on this crate; instead `marine-ess-core`
//! defines the few collaborator traits it calls directly
//! ([`marine_ess_core::FaultLogSink`]) while the broader I/O surface a full
//! firmware needs (cell-monitor driver, clock, persistent store, EMS line)
//! lives here, one layer further from the safety-critical core.

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod traits;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "board")]
pub mod board;

pub use error::HalError;
pub use traits::{CellMonitorDriver, EmsLink, ModuleReadings, MonotonicClock, PersistentSnapshot, PersistentStore};
