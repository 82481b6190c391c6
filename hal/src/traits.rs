//! The capability set spec §9 calls "an abstract capability set" for
//! hardware access: cell-monitor ASIC exchange, persistent storage, the
//! monotonic clock and the EMS line protocol. `marine-ess-core` never sees
//! any of this directly — it is driven by plain data records produced and
//! consumed on the other side of these traits, matching the teacher's
//! `SafetyMonitor`/`ErrorCode` collaborator pattern of reporting through
//! return values rather than owning I/O.

use crate::error::HalError;
use marine_ess_core::EmsMessage;

/// Per-cell mV / per-sensor deci-°C readings for one module, pulled out of
/// the driver so the module size isn't baked into the trait signature.
pub struct ModuleReadings<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize> {
    pub cell_mv: [u16; CELLS_PER_MODULE],
    pub temp_deci_c: [i16; SENSORS_PER_MODULE],
    pub current_ma: i32,
    /// Raw hardware-safety bits: bit0 hw_ov, bit1 hw_uv, bit2 short-circuit
    /// discharge, bit3 over-temperature discharge/charge/FET (spec §6).
    pub safety_status: u8,
}

/// Cell-monitor ASIC driver contract (spec §6), one instance per module.
///
/// Register-level I2C framing is deliberately not part of this trait —
/// spec.md §1 excludes it from scope. Implementors own whatever bus
/// transaction gets them from `module_id` to a `ModuleReadings`.
pub trait CellMonitorDriver<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize> {
    /// Verify the device for `module_id` is present and responding.
    async fn init(&mut self, module_id: u16) -> Result<(), HalError>;

    async fn read_all(
        &mut self,
        module_id: u16,
    ) -> Result<ModuleReadings<CELLS_PER_MODULE, SENSORS_PER_MODULE>, HalError>;

    /// Commands the passive-balance FETs for `module_id`; `mask` is indexed
    /// the same way as `ModuleReadings::cell_mv`.
    async fn set_balance_mask(
        &mut self,
        module_id: u16,
        mask: &[bool; CELLS_PER_MODULE],
    ) -> Result<(), HalError>;
}

/// Monotonic millisecond clock, independent of wall-clock time (spec §9:
/// all timing in the core is `dt_ms`/`timestamp_ms`, never a calendar date).
pub trait MonotonicClock {
    fn now_ms(&self) -> u32;
}

/// SoC and cumulative counters that must survive a power cycle (spec §6
/// "Persistent-store contract"). The core never touches NVM directly;
/// spec.md §1 excludes "non-volatile storage of fault log and persistent
/// counters" from its responsibility, so this is purely the trait boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistentSnapshot {
    pub soc_hundredths: u16,
    pub cumulative_charge_mah: u32,
    pub cumulative_discharge_mah: u32,
    pub runtime_hours: u32,
}

pub trait PersistentStore {
    async fn save_persistent(&mut self, snapshot: PersistentSnapshot) -> Result<(), HalError>;
    async fn load_persistent(&mut self) -> Result<PersistentSnapshot, HalError>;
}

/// The EMS line-protocol boundary (spec §6 "EMS command input" / "Status
/// output"). Decoding the wire format and CAN framing are out of scope
/// (spec.md §1); this trait hands the core an already-decoded
/// [`EmsMessage`] and accepts an already-encoded status snapshot.
pub trait EmsLink {
    /// Returns the most recently received command, if one arrived since the
    /// last poll. Reception alone (even of `EmsCommand::None`) updates the
    /// caller's `last_ems_msg_ms` bookkeeping, per spec §6.
    async fn poll_command(&mut self) -> Option<EmsMessage>;

    async fn publish_status(&mut self, snapshot: &marine_ess_core::StatusSnapshot);
}
