//! Passive cell-balancing decision (supplement to §4.1: the aggregator
//! raises the imbalance flag, this module decides which cells to bleed).
//!
//! Output feeds `set_balance_mask(module_id, mask_of_cells)` (spec §6) on
//! the cell-monitor driver; that call itself lives in `marine-ess-hal`.

use crate::config::Tunables;
use crate::state::PackState;

/// Decide which cells should have their passive-balance resistor enabled
/// this cycle. Balancing is only attempted while pack current is low
/// (bleeding under heavy load wastes the energy it's trying to conserve
/// and adds heat on top of whatever's already driving current); among
/// cells exceeding the imbalance deadband above the pack minimum, the
/// highest `balance_max_active_cells` are selected.
pub fn compute_balance_mask<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &PackState<N_CELLS, N_SENSORS>,
    t: &Tunables,
) -> [bool; N_CELLS] {
    let mut mask = [false; N_CELLS];

    if pack.min_cell_mv == 0 {
        return mask;
    }
    if pack.pack_current_ma.unsigned_abs() > t.rest_threshold_ma.saturating_mul(5) {
        return mask;
    }

    let mut candidates: heapless::Vec<(usize, u16), N_CELLS> = heapless::Vec::new();
    for (i, &mv) in pack.cell_mv.iter().enumerate() {
        if mv != 0 && mv > pack.min_cell_mv.saturating_add(t.imbalance_warn_mv) {
            let _ = candidates.push((i, mv));
        }
    }
    candidates.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    for &(i, _) in candidates.iter().take(t.balance_max_active_cells) {
        mask[i] = true;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PackState;

    #[test]
    fn no_balancing_with_no_valid_reading() {
        let t = Tunables::canonical();
        let pack = PackState::<4, 1>::new();
        let mask = compute_balance_mask(&pack, &t);
        assert!(mask.iter().all(|&b| !b));
    }

    #[test]
    fn selects_cells_above_deadband_capped_at_max() {
        let mut t = Tunables::canonical();
        t.balance_max_active_cells = 2;
        let mut pack = PackState::<5, 1>::new();
        pack.cell_mv = [3_700, 3_800, 3_820, 3_760, 3_700];
        pack.min_cell_mv = 3_700;
        pack.pack_current_ma = 0;
        let mask = compute_balance_mask(&pack, &t);
        // 3820 and 3800 exceed 3700+50; 3760 does not (only +60 > 50? actually 60>50 qualifies too)
        assert_eq!(mask.iter().filter(|&&b| b).count(), 2);
        assert!(mask[2]); // highest cell always selected
        assert!(mask[1]); // second highest
    }

    #[test]
    fn no_balancing_under_heavy_load() {
        let t = Tunables::canonical();
        let mut pack = PackState::<4, 1>::new();
        pack.cell_mv = [3_700, 3_900, 3_700, 3_700];
        pack.min_cell_mv = 3_700;
        pack.pack_current_ma = 50_000;
        let mask = compute_balance_mask(&pack, &t);
        assert!(mask.iter().all(|&b| !b));
    }
}
