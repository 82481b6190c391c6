//! Status output (spec §6): "published periodically: pack mode, pack
//! voltage (0.1 V units), pack current (0.1 A, signed), SoC (percent
//! integer), worst-case temperature ..., fault bitset, charge and discharge
//! limits, cell voltage summary (min/max/mean/imbalance)."
//!
//! Wire-level CAN framing of this snapshot is out of scope here (spec §1);
//! `marine-ess-hal`/the firmware's CAN TX task turns this into frames.

use crate::state::{ContactorState, FaultBits, Mode, PackState};

/// Single-byte temperature encoding: degrees Celsius with a +40 offset, so
/// the representable range is -40..=215 °C in one unsigned byte (spec §6).
pub fn encode_temp_byte(deci_c: i16) -> u8 {
    let whole_c = deci_c / 10;
    (whole_c + 40).clamp(0, 255) as u8
}

/// A periodic status snapshot for one pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub mode: Mode,
    pub contactor_state: ContactorState,
    /// 0.1 V units.
    pub pack_voltage_decivolts: u32,
    /// 0.1 A units, signed.
    pub pack_current_deciamps: i32,
    /// Integer percent, 0-100.
    pub soc_percent: u8,
    pub worst_case_temp_byte: u8,
    pub faults: FaultBits,
    pub charge_limit_ma: i32,
    pub discharge_limit_ma: i32,
    pub min_cell_mv: u16,
    pub max_cell_mv: u16,
    pub avg_cell_mv: u16,
    pub has_warning: bool,
}

impl StatusSnapshot {
    pub fn capture<const N_CELLS: usize, const N_SENSORS: usize>(
        pack: &PackState<N_CELLS, N_SENSORS>,
    ) -> Self {
        let worst_case_temp_deci_c = if pack.max_temp_deci_c.unsigned_abs() >= pack.min_temp_deci_c.unsigned_abs()
        {
            pack.max_temp_deci_c
        } else {
            pack.min_temp_deci_c
        };
        Self {
            mode: pack.mode,
            contactor_state: pack.contactor_state,
            pack_voltage_decivolts: pack.pack_voltage_mv / 100,
            pack_current_deciamps: pack.pack_current_ma / 100,
            soc_percent: (pack.soc_hundredths / 100) as u8,
            worst_case_temp_byte: encode_temp_byte(worst_case_temp_deci_c),
            faults: pack.faults,
            charge_limit_ma: pack.charge_limit_ma,
            discharge_limit_ma: pack.discharge_limit_ma,
            min_cell_mv: pack.min_cell_mv,
            max_cell_mv: pack.max_cell_mv,
            avg_cell_mv: pack.avg_cell_mv,
            has_warning: pack.has_warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PackState;

    #[test]
    fn temp_byte_encodes_with_plus_forty_offset() {
        assert_eq!(encode_temp_byte(0), 40); // 0 C
        assert_eq!(encode_temp_byte(-400), 0); // -40 C
        assert_eq!(encode_temp_byte(250), 65); // 25.0 C
    }

    #[test]
    fn capture_converts_units() {
        let mut pack = PackState::<4, 1>::new();
        pack.pack_voltage_mv = 1_234_560;
        pack.pack_current_ma = -123_400;
        pack.soc_hundredths = 7_650;
        pack.max_temp_deci_c = 300;
        pack.min_temp_deci_c = 100;
        let snap = StatusSnapshot::capture(&pack);
        assert_eq!(snap.pack_voltage_decivolts, 12_345);
        assert_eq!(snap.pack_current_deciamps, -1_234);
        assert_eq!(snap.soc_percent, 76);
    }
}
