//! Integer coulomb-counting state-of-charge estimator (spec §4.3).
//!
//! `soc_hundredths` is updated every tick from `pack_current_ma` with
//! saturating arithmetic clamped to `[0, 10000]`; when the pack has been at
//! rest (current near zero) for long enough *and* is in mode `READY`, the
//! estimate is overwritten by reverse-interpolating the open-circuit-voltage
//! table instead, correcting long-run coulomb-counting drift.

use crate::config::{Curve, Tunables};
use crate::state::{Mode, PackState};

/// Reverse-interpolate a monotonically increasing `(x, y)` curve: given `y`,
/// find `x`. Used by the array bus solver to turn a pack's SoC back into a
/// per-cell open-circuit voltage via the OCV table (the forward direction,
/// voltage -> SoC, is `current_limit::eval_curve`). Clamps to the nearest
/// endpoint outside the table's `y` range.
pub fn reverse_eval_curve(curve: &Curve, y: i32) -> i32 {
    let mut n = 1;
    for i in 1..curve.len() {
        if curve[i].x > curve[i - 1].x {
            n = i + 1;
        } else {
            break;
        }
    }
    let pts = &curve[..n];
    if y <= pts[0].y_permille {
        return pts[0].x;
    }
    let last = pts[n - 1];
    if y >= last.y_permille {
        return last.x;
    }
    for w in pts.windows(2) {
        let (a, b) = (w[0], w[1]);
        if y >= a.y_permille && y <= b.y_permille {
            let dy = (b.y_permille - a.y_permille) as i64;
            if dy == 0 {
                return a.x;
            }
            let dx = (b.x - a.x) as i64;
            let num = dx * (y - a.y_permille) as i64;
            return a.x + (num / dy) as i32;
        }
    }
    last.x
}

/// Advance the coulomb counter by one tick and apply the rest-detection OCV
/// reset when due. `rest_timer_ms` is a per-pack accumulator owned by the
/// caller (spec §9: "the SoC estimator's 'last rest timer' ... are fields of
/// the owning state record, not module-level variables").
pub fn update<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    rest_timer_ms: &mut u32,
    t: &Tunables,
) {
    let at_rest = pack.pack_current_ma.unsigned_abs() < t.rest_threshold_ma;
    if at_rest {
        *rest_timer_ms = rest_timer_ms.saturating_add(dt_ms);
    } else {
        *rest_timer_ms = 0;
    }

    if at_rest && *rest_timer_ms >= t.rest_hold_ms && pack.mode == Mode::Ready {
        let soc = crate::current_limit::eval_curve(&t.ocv_table, pack.avg_cell_mv as i32);
        pack.soc_hundredths = soc.clamp(0, 10_000) as u16;
        *rest_timer_ms = 0;
        return;
    }

    let eff_permille = if pack.pack_current_ma > 0 {
        t.charge_coulombic_efficiency_permille as i64
    } else {
        t.discharge_coulombic_efficiency_permille as i64
    };

    let numerator =
        pack.pack_current_ma as i64 * dt_ms as i64 * eff_permille;
    let denominator = t.nominal_capacity_mah as i64 * 360 * 1000;
    if denominator == 0 {
        return;
    }
    let delta = numerator / denominator;

    let new_soc = pack.soc_hundredths as i64 + delta;
    pack.soc_hundredths = new_soc.clamp(0, 10_000) as u16;
}
