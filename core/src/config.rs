//! Tunable parameters (spec §6).
//!
//! Everything here is a runtime value rather than a compile-time constant
//! (other than pack topology, which is carried as const generics on
//! [`crate::state::PackState`]) so delay/threshold tuning doesn't require a
//! recompile, per spec §6: "deadband widths and fault-reset hold time are
//! engineering choices ... and should be configuration inputs."

use crate::current_limit::Breakpoint;

/// Number of breakpoints in each derating/OCV table.
pub const MAX_BREAKPOINTS: usize = 8;

/// One piecewise-linear derating curve, ordered by ascending `x`.
pub type Curve = [Breakpoint; MAX_BREAKPOINTS];

/// All tunable parameters for one pack's protection/derating/sequencing logic.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tunables {
    pub n_modules: u16,
    pub cells_per_module: u16,
    pub sensors_per_module: u16,

    pub nominal_capacity_mah: u32,

    // Software fault thresholds
    pub se_ov_fault_mv: u16,
    pub se_uv_fault_mv: u16,
    pub se_ot_fault_deci_c: i16,
    pub se_fault_delay_ms: u32,

    // Warning hysteresis pairs
    pub se_ov_warn_mv: u16,
    pub se_ov_warn_clear_mv: u16,
    pub se_uv_warn_mv: u16,
    pub se_uv_warn_clear_mv: u16,
    pub se_ot_warn_deci_c: i16,
    pub se_ot_warn_clear_deci_c: i16,
    pub warn_delay_ms: u32,
    pub warn_hold_ms: u32,

    // Hardware-safety layer (independent of software thresholds)
    pub hw_ov_mv: u16,
    pub hw_uv_mv: u16,
    pub hw_ot_deci_c: i16,
    pub hw_ov_delay_ms: u32,
    pub hw_uv_delay_ms: u32,
    pub hw_ot_delay_ms: u32,

    // Overcurrent
    pub oc_discharge_limit_ma: u32,
    pub oc_delay_ms: u32,
    pub oc_warn_delay_ms: u32,
    pub oc_warn_margin_ratio_permille: u32, // e.g. 1050 = 1.05x
    pub oc_warn_margin_ma: u32,             // e.g. 5000

    pub fault_reset_hold_ms: u32,

    // Array coordinator
    /// Internal DC resistance assumed for every pack on the bus (milliohms).
    /// Not fixed by the source literature; treated as a shared engineering
    /// constant across identical packs in one array.
    pub pack_internal_resistance_mohm: u32,

    // Contactor sequencer
    pub voltage_match_mv_per_module: u32,
    pub precharge_target_permille: u32, // e.g. 950 = 95% of bus voltage
    pub precharge_timeout_ms: u32,
    pub closing_timeout_ms: u32,
    pub opening_current_threshold_ma: u32,
    pub weld_detect_ms: u32,

    // Pack state machine
    pub ems_watchdog_ms: u32,

    // Aggregator / balancing
    pub imbalance_warn_mv: u16,
    pub balance_max_active_cells: usize,

    // SoC estimator
    pub rest_threshold_ma: u32,
    pub rest_hold_ms: u32,
    pub charge_coulombic_efficiency_permille: u32, // e.g. 998 = 0.998
    pub discharge_coulombic_efficiency_permille: u32, // 1000 = 1.000

    /// Leaky-integrator decay ratio denominator (dt / LEAK_DECAY_RATIO).
    pub leak_decay_ratio: u32,

    pub temp_derating_curve: Curve,
    pub soc_derating_curve: Curve,
    pub voltage_derating_curve: Curve,
    pub ocv_table: Curve,
}

impl Tunables {
    /// Canonical values from spec §6.
    pub const fn canonical() -> Self {
        const EMPTY_BP: Breakpoint = Breakpoint { x: 0, y_permille: 0 };
        Self {
            n_modules: 22,
            cells_per_module: 14,
            sensors_per_module: 3,

            nominal_capacity_mah: 128_000,

            se_ov_fault_mv: 4_225,
            se_uv_fault_mv: 3_000,
            se_ot_fault_deci_c: 650,
            se_fault_delay_ms: 5_000,

            se_ov_warn_mv: 4_210,
            se_ov_warn_clear_mv: 4_190,
            se_uv_warn_mv: 3_050,
            se_uv_warn_clear_mv: 3_100,
            se_ot_warn_deci_c: 600,
            se_ot_warn_clear_deci_c: 569,
            warn_delay_ms: 5_000,
            warn_hold_ms: 10_000,

            hw_ov_mv: 4_300,
            hw_uv_mv: 2_700,
            hw_ot_deci_c: 700,
            hw_ov_delay_ms: 1_000,
            hw_uv_delay_ms: 1_000,
            hw_ot_delay_ms: 5_000,

            oc_discharge_limit_ma: 384_000,
            oc_delay_ms: 5_000,
            oc_warn_delay_ms: 10_000,
            oc_warn_margin_ratio_permille: 1_050,
            oc_warn_margin_ma: 5_000,

            fault_reset_hold_ms: 60_000,

            pack_internal_resistance_mohm: 50,

            voltage_match_mv_per_module: 1_200,
            precharge_target_permille: 950,
            precharge_timeout_ms: 5_000,
            closing_timeout_ms: 100,
            opening_current_threshold_ma: 1_000,
            weld_detect_ms: 200,

            ems_watchdog_ms: 5_000,

            imbalance_warn_mv: 50,
            balance_max_active_cells: 8,

            rest_threshold_ma: 2_000,
            rest_hold_ms: 30_000,
            charge_coulombic_efficiency_permille: 998,
            discharge_coulombic_efficiency_permille: 1_000,

            leak_decay_ratio: 2,

            // C-rate (permille of 1C) vs. temperature (deci-°C). Below 0°C,
            // charge is heavily derated; above 45°C, discharge derates too.
            temp_derating_curve: [
                Breakpoint { x: -200, y_permille: 0 },
                Breakpoint { x: 0, y_permille: 50 },
                Breakpoint { x: 100, y_permille: 500 },
                Breakpoint { x: 250, y_permille: 1_000 },
                Breakpoint { x: 450, y_permille: 1_000 },
                Breakpoint { x: 550, y_permille: 300 },
                Breakpoint { x: 650, y_permille: 0 },
                EMPTY_BP,
            ],
            // C-rate vs. SoC (hundredths of a percent): taper near both ends.
            soc_derating_curve: [
                Breakpoint { x: 0, y_permille: 0 },
                Breakpoint { x: 300, y_permille: 1_000 },
                Breakpoint { x: 8_000, y_permille: 1_000 },
                Breakpoint { x: 9_500, y_permille: 300 },
                Breakpoint { x: 10_000, y_permille: 50 },
                EMPTY_BP,
                EMPTY_BP,
                EMPTY_BP,
            ],
            // C-rate vs. extreme cell voltage (mV): taper near both rails.
            voltage_derating_curve: [
                Breakpoint { x: 3_000, y_permille: 50 },
                Breakpoint { x: 3_200, y_permille: 1_000 },
                Breakpoint { x: 4_100, y_permille: 1_000 },
                Breakpoint { x: 4_180, y_permille: 300 },
                Breakpoint { x: 4_225, y_permille: 0 },
                EMPTY_BP,
                EMPTY_BP,
                EMPTY_BP,
            ],
            // Open-circuit cell voltage (mV) vs. SoC (hundredths of a percent).
            ocv_table: [
                Breakpoint { x: 3_000, y_permille: 0 },
                Breakpoint { x: 3_300, y_permille: 500 },
                Breakpoint { x: 3_500, y_permille: 1_000 },
                Breakpoint { x: 3_700, y_permille: 3_000 },
                Breakpoint { x: 3_900, y_permille: 6_000 },
                Breakpoint { x: 4_050, y_permille: 8_500 },
                Breakpoint { x: 4_150, y_permille: 9_700 },
                Breakpoint { x: 4_200, y_permille: 10_000 },
            ],
        }
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_values_match_spec_table() {
        let t = Tunables::canonical();
        assert_eq!(t.n_modules, 22);
        assert_eq!(t.cells_per_module, 14);
        assert_eq!(t.sensors_per_module, 3);
        assert_eq!(t.nominal_capacity_mah, 128_000);
        assert_eq!(t.se_ov_fault_mv, 4_225);
        assert_eq!(t.se_uv_fault_mv, 3_000);
        assert_eq!(t.hw_ov_mv, 4_300);
        assert_eq!(t.hw_uv_mv, 2_700);
        assert_eq!(t.fault_reset_hold_ms, 60_000);
        assert_eq!(t.voltage_match_mv_per_module, 1_200);
        assert_eq!(t.weld_detect_ms, 200);
        assert_eq!(t.leak_decay_ratio, 2);
    }
}
