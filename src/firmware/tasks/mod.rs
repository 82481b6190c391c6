pub mod can_rx;
pub mod can_tx;
pub mod core_tick;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use marine_ess_core::{ArrayCoordinator, EmsMessage, CANONICAL_N_CELLS, CANONICAL_N_SENSORS};

/// Upper bound on packs sharing one DC bus (spec §4.7's array is bounded
/// the same way a pack's cell count is: a compile-time capacity, no heap).
pub const MAX_PACKS: usize = 8;

/// Canonical pack topology (spec §6): 22 modules of 14 cells / 3 sensors.
pub const N_MODULES: usize = 22;
pub const CELLS_PER_MODULE: usize = 14;
pub const SENSORS_PER_MODULE: usize = 3;

pub type Array = ArrayCoordinator<CANONICAL_N_CELLS, CANONICAL_N_SENSORS, MAX_PACKS>;

/// Filled in by `system::initialize` once the board config is known; every
/// task after that locks this rather than holding its own copy, matching
/// spec §5's "pack state record is shared between monitor, protection,
/// contactor, state, and CAN tasks" (here the whole array, since the fused
/// `core_tick` task folds monitor/protection/contactor/state into one
/// critical section per tick; see that module's doc comment).
pub static ARRAY: Mutex<CriticalSectionRawMutex, Option<Array>> = Mutex::new(None);

/// Most recently decoded EMS command, written by `can_rx` and consumed by
/// `core_tick`. A `Mutex<Option<_>>` rather than a `Signal` because the
/// pack state machine re-evaluates the same command every tick until a new
/// one arrives (spec §6: reception, not presence, updates `last_ems_msg_ms`).
pub static PENDING_EMS: Mutex<CriticalSectionRawMutex, EmsMessage> =
    Mutex::new(EmsMessage { command: marine_ess_core::EmsCommand::None, timestamp_ms: 0 });

#[cfg(feature = "renode-mock")]
pub type EmsLinkImpl = marine_ess_hal::mock::MockEmsLink<{ MAX_PACKS }>;

#[cfg(not(feature = "renode-mock"))]
pub type EmsLinkImpl = crate::firmware::ems_link::BatteryGuardEmsLink;

/// Single shared EMS-line handle: `can_tx` publishes through it, `can_rx`
/// polls it, the same one-bus-two-tasks split a real FDCAN peripheral
/// requires (spec §6 "EMS command input" / "Status output" share one link).
pub static EMS_LINK: Mutex<CriticalSectionRawMutex, Option<EmsLinkImpl>> = Mutex::new(None);
