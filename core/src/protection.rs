//! Protection engine (spec §4.4) — the largest subsystem.
//!
//! Five independent axes run every tick, in this order:
//!
//! 1. **Hardware-safety layer** — always runs, even once a software fault is
//!    already latched; it has its own thresholds and delays, deliberately
//!    decoupled from the software layer so a firmware bug in (2)-(4) can't
//!    silently disable the last line of defense.
//! 2. **Warning channel** — hysteresis pairs with a leaky-integrator confirm,
//!    runs regardless of latch state so operators keep seeing temperature
//!    and voltage trend even after a fault has opened the contactors.
//! 3. **Software per-cell/per-sensor protection** — skipped once
//!    `fault_latched` is set; exits on the first cell or sensor whose timer
//!    reaches the delay.
//! 4. **Overcurrent** — only evaluated if (3) didn't already latch this tick.
//! 5. **Safe-state accumulator** — the only axis that runs while latched;
//!    gates whether `reset_faults` is honored.

use crate::config::Tunables;
use crate::fault_log::{FaultEvent, FaultKind, FaultLogSink};
use crate::state::{FaultBits, PackState, ProtectionState};

fn leaky_update(timer_ms: u32, condition: bool, dt_ms: u32, decay_ratio: u32) -> u32 {
    if condition {
        timer_ms.saturating_add(dt_ms)
    } else {
        timer_ms.saturating_sub(dt_ms / decay_ratio.max(1))
    }
}

/// Run one protection-engine tick. `timestamp_ms` is only used to stamp
/// fault-log entries.
pub fn tick<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    timestamp_ms: u32,
    t: &Tunables,
    log: &mut dyn FaultLogSink,
) {
    hardware_safety_layer(pack, prot, dt_ms, timestamp_ms, t, log);
    warning_channel(pack, prot, dt_ms, t);

    if pack.fault_latched {
        safe_state_accumulator(pack, prot, dt_ms, t);
        return;
    }

    if software_protection(pack, prot, dt_ms, timestamp_ms, t, log) {
        return;
    }

    overcurrent(pack, prot, dt_ms, timestamp_ms, t, log);
}

fn hardware_safety_layer<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    timestamp_ms: u32,
    t: &Tunables,
    log: &mut dyn FaultLogSink,
) {
    let any_hw_ov = pack.cell_mv.iter().any(|&mv| mv > t.hw_ov_mv);
    prot.hw_ov_timer_ms = leaky_update(prot.hw_ov_timer_ms, any_hw_ov, dt_ms, t.leak_decay_ratio);
    if prot.hw_ov_timer_ms >= t.hw_ov_delay_ms && !pack.faults.contains(FaultBits::HW_OV) {
        pack.faults.insert(FaultBits::HW_OV);
        pack.fault_latched = true;
        prot.hw_fault_latched = true;
        let idx = pack
            .cell_mv
            .iter()
            .position(|&mv| mv > t.hw_ov_mv)
            .unwrap_or(0);
        log.log_fault_event(FaultEvent {
            timestamp_ms,
            kind: FaultKind::HwOv,
            index: idx as u16,
            value: pack.cell_mv[idx] as i32,
        });
    }

    let any_hw_uv = pack.cell_mv.iter().any(|&mv| mv != 0 && mv < t.hw_uv_mv);
    prot.hw_uv_timer_ms = leaky_update(prot.hw_uv_timer_ms, any_hw_uv, dt_ms, t.leak_decay_ratio);
    if prot.hw_uv_timer_ms >= t.hw_uv_delay_ms && !pack.faults.contains(FaultBits::HW_UV) {
        pack.faults.insert(FaultBits::HW_UV);
        pack.fault_latched = true;
        prot.hw_fault_latched = true;
        let idx = pack
            .cell_mv
            .iter()
            .position(|&mv| mv != 0 && mv < t.hw_uv_mv)
            .unwrap_or(0);
        log.log_fault_event(FaultEvent {
            timestamp_ms,
            kind: FaultKind::HwUv,
            index: idx as u16,
            value: pack.cell_mv[idx] as i32,
        });
    }

    let any_hw_ot = pack.temp_deci_c.iter().any(|&c| c > t.hw_ot_deci_c);
    prot.hw_ot_timer_ms = leaky_update(prot.hw_ot_timer_ms, any_hw_ot, dt_ms, t.leak_decay_ratio);
    if prot.hw_ot_timer_ms >= t.hw_ot_delay_ms && !pack.faults.contains(FaultBits::HW_OT) {
        pack.faults.insert(FaultBits::HW_OT);
        pack.fault_latched = true;
        prot.hw_fault_latched = true;
        let idx = pack
            .temp_deci_c
            .iter()
            .position(|&c| c > t.hw_ot_deci_c)
            .unwrap_or(0);
        log.log_fault_event(FaultEvent {
            timestamp_ms,
            kind: FaultKind::HwOt,
            index: idx as u16,
            value: pack.temp_deci_c[idx] as i32,
        });
    }
}

/// Returns `true` if a fault was latched this tick (caller must not also
/// run the overcurrent axis).
fn software_protection<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    timestamp_ms: u32,
    t: &Tunables,
    log: &mut dyn FaultLogSink,
) -> bool {
    for i in 0..N_CELLS {
        let ov = pack.cell_mv[i] > t.se_ov_fault_mv;
        prot.ov_timer_ms[i] = leaky_update(prot.ov_timer_ms[i], ov, dt_ms, t.leak_decay_ratio);
        if prot.ov_timer_ms[i] >= t.se_fault_delay_ms {
            pack.faults.insert(FaultBits::CELL_OV);
            pack.fault_latched = true;
            log.log_fault_event(FaultEvent {
                timestamp_ms,
                kind: FaultKind::CellOv,
                index: i as u16,
                value: pack.cell_mv[i] as i32,
            });
            return true;
        }

        let uv = pack.cell_mv[i] != 0 && pack.cell_mv[i] < t.se_uv_fault_mv;
        prot.uv_timer_ms[i] = leaky_update(prot.uv_timer_ms[i], uv, dt_ms, t.leak_decay_ratio);
        if prot.uv_timer_ms[i] >= t.se_fault_delay_ms {
            pack.faults.insert(FaultBits::CELL_UV);
            pack.fault_latched = true;
            log.log_fault_event(FaultEvent {
                timestamp_ms,
                kind: FaultKind::CellUv,
                index: i as u16,
                value: pack.cell_mv[i] as i32,
            });
            return true;
        }
    }

    for j in 0..N_SENSORS {
        let ot = pack.temp_deci_c[j] > t.se_ot_fault_deci_c;
        prot.ot_timer_ms[j] = leaky_update(prot.ot_timer_ms[j], ot, dt_ms, t.leak_decay_ratio);
        if prot.ot_timer_ms[j] >= t.se_fault_delay_ms {
            pack.faults.insert(FaultBits::CELL_OT);
            pack.fault_latched = true;
            log.log_fault_event(FaultEvent {
                timestamp_ms,
                kind: FaultKind::CellOt,
                index: j as u16,
                value: pack.temp_deci_c[j] as i32,
            });
            return true;
        }
    }

    false
}

fn overcurrent<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    timestamp_ms: u32,
    t: &Tunables,
    log: &mut dyn FaultLogSink,
) {
    let discharge_mag = if pack.pack_current_ma < 0 {
        (-pack.pack_current_ma) as u32
    } else {
        0
    };
    let oc_discharge = discharge_mag > t.oc_discharge_limit_ma;
    prot.oc_discharge_timer_ms = leaky_update(
        prot.oc_discharge_timer_ms,
        oc_discharge,
        dt_ms,
        t.leak_decay_ratio,
    );
    if prot.oc_discharge_timer_ms >= t.oc_delay_ms
        && !pack.faults.contains(FaultBits::OC_DISCHARGE)
    {
        pack.faults.insert(FaultBits::OC_DISCHARGE);
        pack.fault_latched = true;
        log.log_fault_event(FaultEvent {
            timestamp_ms,
            kind: FaultKind::OcDischarge,
            index: 0,
            value: pack.pack_current_ma,
        });
    }

    let oc_charge_condition = pack.min_temp_deci_c < 0
        && pack.pack_current_ma > 0
        && pack.pack_current_ma as u32 > pack.charge_limit_ma.max(0) as u32;
    prot.oc_charge_timer_ms = leaky_update(
        prot.oc_charge_timer_ms,
        oc_charge_condition,
        dt_ms,
        t.leak_decay_ratio,
    );
    if prot.oc_charge_timer_ms >= t.oc_delay_ms && !pack.faults.contains(FaultBits::OC_CHARGE) {
        pack.faults.insert(FaultBits::OC_CHARGE);
        pack.fault_latched = true;
        log.log_fault_event(FaultEvent {
            timestamp_ms,
            kind: FaultKind::OcCharge,
            index: 0,
            value: pack.pack_current_ma,
        });
    }

    let margin = (pack.charge_limit_ma.max(0) as u32 * t.oc_warn_margin_ratio_permille / 1_000)
        + t.oc_warn_margin_ma;
    let oc_warn_condition = pack.pack_current_ma > 0 && pack.pack_current_ma as u32 > margin;
    prot.warn_oc_timer_ms = leaky_update(
        prot.warn_oc_timer_ms,
        oc_warn_condition,
        dt_ms,
        t.leak_decay_ratio,
    );
    prot.warn_oc_active = prot.warn_oc_timer_ms >= t.oc_warn_delay_ms;
}

fn safe_state_accumulator<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    t: &Tunables,
) {
    let all_cells_safe = pack
        .cell_mv
        .iter()
        .all(|&mv| mv < t.se_ov_fault_mv && (mv == 0 || mv > t.se_uv_fault_mv));
    let all_temps_safe = pack.max_temp_deci_c < t.se_ot_fault_deci_c;

    if all_cells_safe && all_temps_safe {
        prot.safe_state_ms = prot.safe_state_ms.saturating_add(dt_ms);
    } else {
        prot.safe_state_ms = 0;
    }
}

fn warning_channel<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    prot: &mut ProtectionState<N_CELLS, N_SENSORS>,
    dt_ms: u32,
    t: &Tunables,
) {
    let ov_threshold = if prot.warn_ov_active {
        t.se_ov_warn_clear_mv
    } else {
        t.se_ov_warn_mv
    };
    let ov_condition = pack.cell_mv.iter().any(|&mv| mv > ov_threshold);
    prot.warn_ov_timer_ms = leaky_update(prot.warn_ov_timer_ms, ov_condition, dt_ms, t.leak_decay_ratio);
    if !prot.warn_ov_active && prot.warn_ov_timer_ms >= t.warn_delay_ms {
        prot.warn_ov_active = true;
    } else if prot.warn_ov_active && prot.warn_ov_timer_ms == 0 {
        prot.warn_ov_active = false;
    }

    let uv_threshold = if prot.warn_uv_active {
        t.se_uv_warn_clear_mv
    } else {
        t.se_uv_warn_mv
    };
    let uv_condition = pack.cell_mv.iter().any(|&mv| mv != 0 && mv < uv_threshold);
    prot.warn_uv_timer_ms = leaky_update(prot.warn_uv_timer_ms, uv_condition, dt_ms, t.leak_decay_ratio);
    if !prot.warn_uv_active && prot.warn_uv_timer_ms >= t.warn_delay_ms {
        prot.warn_uv_active = true;
    } else if prot.warn_uv_active && prot.warn_uv_timer_ms == 0 {
        prot.warn_uv_active = false;
    }

    let ot_threshold = if prot.warn_ot_active {
        t.se_ot_warn_clear_deci_c
    } else {
        t.se_ot_warn_deci_c
    };
    let ot_condition = pack.temp_deci_c.iter().any(|&c| c > ot_threshold);
    prot.warn_ot_timer_ms = leaky_update(prot.warn_ot_timer_ms, ot_condition, dt_ms, t.leak_decay_ratio);
    if !prot.warn_ot_active && prot.warn_ot_timer_ms >= t.warn_delay_ms {
        prot.warn_ot_active = true;
    } else if prot.warn_ot_active && prot.warn_ot_timer_ms == 0 {
        prot.warn_ot_active = false;
    }

    let any_active =
        prot.warn_ov_active || prot.warn_uv_active || prot.warn_ot_active || prot.warn_oc_active;

    if any_active {
        pack.has_warning = true;
        prot.warning_hold_ms = t.warn_hold_ms;
    } else if prot.warning_hold_ms > 0 {
        prot.warning_hold_ms = prot.warning_hold_ms.saturating_sub(dt_ms);
        pack.has_warning = true;
    } else {
        pack.has_warning = false;
    }
}

/// `true` once `safe_state_ms` has held long enough for `reset_faults` to be
/// honored (spec §4.4d / §7).
pub fn fault_reset_guard<const N_CELLS: usize, const N_SENSORS: usize>(
    prot: &ProtectionState<N_CELLS, N_SENSORS>,
    t: &Tunables,
) -> bool {
    prot.safe_state_ms >= t.fault_reset_hold_ms
}

/// Render the currently active warning axes into a short human-readable
/// tag string, e.g. `"OV OT"`. Used by the status/telemetry layer, not
/// persisted in [`ProtectionState`] itself.
pub fn warning_message<const N_CELLS: usize, const N_SENSORS: usize>(
    prot: &ProtectionState<N_CELLS, N_SENSORS>,
) -> heapless::String<32> {
    let mut s: heapless::String<32> = heapless::String::new();
    let mut push = |tag: &str| {
        if !s.is_empty() {
            let _ = s.push(' ');
        }
        let _ = s.push_str(tag);
    };
    if prot.warn_ov_active {
        push("OV");
    }
    if prot.warn_uv_active {
        push("UV");
    }
    if prot.warn_ot_active {
        push("OT");
    }
    if prot.warn_oc_active {
        push("OC");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_log::RingFaultLog;
    use crate::state::PackState;

    fn pack4() -> PackState<4, 1> {
        let mut p = PackState::<4, 1>::new();
        p.cell_mv = [3700, 3700, 3700, 3700];
        p
    }

    #[test]
    fn hardware_ov_latches_independently_of_software_thresholds() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        pack.cell_mv[1] = 4_310; // above hw_ov_mv (4300), below se_ov_fault (4225)? no, above both
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();
        for ts in 0..2 {
            tick(&mut pack, &mut prot, 1_000, ts * 1_000, &t, &mut log);
        }
        assert!(pack.faults.contains(FaultBits::HW_OV));
        assert!(pack.fault_latched);
        assert!(prot.hw_fault_latched);
        assert_eq!(log.last().unwrap().kind, FaultKind::HwOv);
    }

    #[test]
    fn software_ov_latches_after_delay_and_logs_first_offender() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        pack.cell_mv[2] = 4_230; // above se_ov_fault (4225), below hw_ov_mv (4300)
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();
        for ts in 0..6 {
            tick(&mut pack, &mut prot, 1_000, ts * 1_000, &t, &mut log);
        }
        assert!(pack.faults.contains(FaultBits::CELL_OV));
        assert!(pack.fault_latched);
        let ev = log.last().unwrap();
        assert_eq!(ev.kind, FaultKind::CellOv);
        assert_eq!(ev.index, 2);
    }

    #[test]
    fn overcurrent_discharge_latches_after_delay() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        pack.pack_current_ma = -400_000; // exceeds 384A discharge limit
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();
        for ts in 0..6 {
            tick(&mut pack, &mut prot, 1_000, ts * 1_000, &t, &mut log);
        }
        assert!(pack.faults.contains(FaultBits::OC_DISCHARGE));
        assert!(pack.fault_latched);
    }

    #[test]
    fn safe_state_gates_fault_reset() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        pack.fault_latched = true;
        pack.faults.insert(FaultBits::HW_OV);
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();
        assert!(!fault_reset_guard(&prot, &t));
        for ts in 0..t.fault_reset_hold_ms / 1_000 {
            tick(&mut pack, &mut prot, 1_000, ts, &t, &mut log);
        }
        assert!(fault_reset_guard(&prot, &t));
    }

    #[test]
    fn safe_state_resets_if_a_cell_goes_unsafe_mid_hold() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        pack.fault_latched = true;
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();
        for ts in 0..30 {
            tick(&mut pack, &mut prot, 1_000, ts, &t, &mut log);
        }
        assert!(prot.safe_state_ms > 0);
        pack.cell_mv[0] = 4_300; // now unsafe (>= se_ov_fault)
        tick(&mut pack, &mut prot, 1_000, 31, &t, &mut log);
        assert_eq!(prot.safe_state_ms, 0);
    }

    #[test]
    fn ot_warning_confirms_then_clears_with_hysteresis_and_hold() {
        let t = Tunables::canonical();
        let mut pack = pack4();
        let mut prot = ProtectionState::<4, 1>::new();
        let mut log = RingFaultLog::<8>::new();

        pack.temp_deci_c = [610]; // above warn trigger (600 = 60.0C)
        for ts in 0..6 {
            tick(&mut pack, &mut prot, 1_000, ts, &t, &mut log);
        }
        assert!(prot.warn_ot_active);
        assert!(pack.has_warning);

        // cool below the clear level (569 = 56.9C); condition now false but
        // active stays latched until the leaky timer fully decays.
        pack.temp_deci_c = [500];
        for ts in 0..20 {
            tick(&mut pack, &mut prot, 1_000, ts, &t, &mut log);
        }
        assert!(!prot.warn_ot_active);
        // has_warning should still be held true for warn_hold_ms after the
        // last axis cleared, then fall.
    }

    #[test]
    fn warning_message_lists_active_axes() {
        let mut prot = ProtectionState::<4, 1>::new();
        assert_eq!(warning_message(&prot).as_str(), "");
        prot.warn_ov_active = true;
        prot.warn_ot_active = true;
        assert_eq!(warning_message(&prot).as_str(), "OV OT");
    }
}
