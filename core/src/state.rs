//! Data model (spec §3): `PackState`, `ProtectionState`, the mode and
//! contactor-state enums and the fault bitset.
//!
//! Pack topology (`N_CELLS`, `N_SENSORS`) is carried as const generics
//! rather than `heapless::Vec`s, matching spec §3's "fixed-width integer"
//! and §9's "no dynamic allocation at steady state": the arrays are part of
//! the struct's fixed layout, sized once at the call site (canonically
//! `N_CELLS = 22 * 14 = 308`, `N_SENSORS = 22 * 3 = 66`, spec §6).

use bitflags::bitflags;

bitflags! {
    /// Fault bitset (spec §3 `faults` field).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct FaultBits: u32 {
        const CELL_OV        = 1 << 0;
        const CELL_UV        = 1 << 1;
        const CELL_OT        = 1 << 2;
        const HW_OV          = 1 << 3;
        const HW_UV          = 1 << 4;
        const HW_OT          = 1 << 5;
        const OC_CHARGE      = 1 << 6;
        const OC_DISCHARGE   = 1 << 7;
        const SC_DISCHARGE   = 1 << 8;
        const CONTACTOR_WELD = 1 << 9;
        const EMS_TIMEOUT    = 1 << 10;
        const COMM_LOSS      = 1 << 11;
        const IMBALANCE      = 1 << 12;
    }
}

/// Pack operating mode (spec §4.6): seven modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Off,
    NotReady,
    Ready,
    Connecting,
    Connected,
    PowerSave,
    Fault,
}

/// Contactor sequencer state (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContactorState {
    Open,
    PreCharge,
    Closing,
    Closed,
    Opening,
    Welded,
}

/// Per-pack measurement and derived-statistics record (spec §3 `PackState`).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PackState<const N_CELLS: usize, const N_SENSORS: usize> {
    /// Millivolts per series cell. `0` means unconnected/invalid.
    pub cell_mv: [u16; N_CELLS],
    /// Tenths of a degree Celsius per temperature sensor.
    pub temp_deci_c: [i16; N_SENSORS],

    pub pack_voltage_mv: u32,
    /// Signed; positive = charging (current flowing into the pack).
    pub pack_current_ma: i32,

    pub max_cell_mv: u16,
    pub min_cell_mv: u16,
    pub avg_cell_mv: u16,
    pub max_temp_deci_c: i16,
    pub min_temp_deci_c: i16,

    /// Hundredths of a percent, `[0, 10000]`.
    pub soc_hundredths: u16,

    pub charge_limit_ma: i32,
    pub discharge_limit_ma: i32,

    pub mode: Mode,
    pub contactor_state: ContactorState,

    pub faults: FaultBits,
    pub fault_latched: bool,
    pub has_warning: bool,

    pub uptime_ms: u32,
    pub last_ems_msg_ms: u32,
}

impl<const N_CELLS: usize, const N_SENSORS: usize> PackState<N_CELLS, N_SENSORS> {
    /// Power-on initialization (spec §3 Lifecycle): mode `NOT_READY`,
    /// contactor `OPEN`, all outputs de-energized, no faults.
    pub const fn new() -> Self {
        Self {
            cell_mv: [0; N_CELLS],
            temp_deci_c: [0; N_SENSORS],
            pack_voltage_mv: 0,
            pack_current_ma: 0,
            max_cell_mv: 0,
            min_cell_mv: 0,
            avg_cell_mv: 0,
            max_temp_deci_c: 0,
            min_temp_deci_c: 0,
            soc_hundredths: 0,
            charge_limit_ma: 0,
            discharge_limit_ma: 0,
            mode: Mode::NotReady,
            contactor_state: ContactorState::Open,
            faults: FaultBits::empty(),
            fault_latched: false,
            has_warning: false,
            uptime_ms: 0,
            last_ems_msg_ms: 0,
        }
    }
}

impl<const N_CELLS: usize, const N_SENSORS: usize> Default for PackState<N_CELLS, N_SENSORS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-cell/per-sensor protection timers (spec §3 `ProtectionState`), owned
/// exclusively by the protection engine (spec §5 "Shared-resource policy").
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectionState<const N_CELLS: usize, const N_SENSORS: usize> {
    pub ov_timer_ms: [u32; N_CELLS],
    pub uv_timer_ms: [u32; N_CELLS],
    pub ot_timer_ms: [u32; N_SENSORS],

    pub hw_ov_timer_ms: u32,
    pub hw_uv_timer_ms: u32,
    pub hw_ot_timer_ms: u32,
    /// Set once the hardware-safety layer latches a fault; cleared only by
    /// explicit operator acknowledgement (spec §7), never by `reset_faults`.
    pub hw_fault_latched: bool,

    pub oc_charge_timer_ms: u32,
    pub oc_discharge_timer_ms: u32,
    pub warn_oc_timer_ms: u32,

    pub safe_state_ms: u32,

    pub warn_ov_timer_ms: u32,
    pub warn_uv_timer_ms: u32,
    pub warn_ot_timer_ms: u32,
    pub warning_hold_ms: u32,
    pub warn_ov_active: bool,
    pub warn_uv_active: bool,
    pub warn_ot_active: bool,
    pub warn_oc_active: bool,
}

impl<const N_CELLS: usize, const N_SENSORS: usize> ProtectionState<N_CELLS, N_SENSORS> {
    pub const fn new() -> Self {
        Self {
            ov_timer_ms: [0; N_CELLS],
            uv_timer_ms: [0; N_CELLS],
            ot_timer_ms: [0; N_SENSORS],
            hw_ov_timer_ms: 0,
            hw_uv_timer_ms: 0,
            hw_ot_timer_ms: 0,
            hw_fault_latched: false,
            oc_charge_timer_ms: 0,
            oc_discharge_timer_ms: 0,
            warn_oc_timer_ms: 0,
            safe_state_ms: 0,
            warn_ov_timer_ms: 0,
            warn_uv_timer_ms: 0,
            warn_ot_timer_ms: 0,
            warning_hold_ms: 0,
            warn_ov_active: false,
            warn_uv_active: false,
            warn_ot_active: false,
            warn_oc_active: false,
        }
    }
}

impl<const N_CELLS: usize, const N_SENSORS: usize> Default for ProtectionState<N_CELLS, N_SENSORS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical pack topology from spec §6: 22 modules * 14 cells, 22 * 3 sensors.
pub const CANONICAL_N_CELLS: usize = 22 * 14;
pub const CANONICAL_N_SENSORS: usize = 22 * 3;

/// A `PackState` sized for the canonical 22-module pack.
pub type CanonicalPackState = PackState<CANONICAL_N_CELLS, CANONICAL_N_SENSORS>;
/// A `ProtectionState` sized for the canonical 22-module pack.
pub type CanonicalProtectionState = ProtectionState<CANONICAL_N_CELLS, CANONICAL_N_SENSORS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pack_state_is_not_ready_and_open() {
        let p = PackState::<8, 2>::new();
        assert_eq!(p.mode, Mode::NotReady);
        assert_eq!(p.contactor_state, ContactorState::Open);
        assert!(p.faults.is_empty());
        assert!(!p.fault_latched);
        assert_eq!(p.soc_hundredths, 0);
    }

    #[test]
    fn fault_bits_accumulate_without_overwrite() {
        let mut f = FaultBits::empty();
        f.insert(FaultBits::HW_OV);
        f.insert(FaultBits::CELL_UV);
        assert!(f.contains(FaultBits::HW_OV));
        assert!(f.contains(FaultBits::CELL_UV));
        assert!(!f.contains(FaultBits::CONTACTOR_WELD));
    }
}
