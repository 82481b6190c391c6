//! Contactor sequencer (spec §4.5): `OPEN → PRE_CHARGE → CLOSING → CLOSED →
//! OPENING → {OPEN, WELDED}`.
//!
//! Owned exclusively by the contactor task (spec §5 "Shared-resource
//! policy"); `pack.contactor_state` is the authoritative state, the timers
//! below are this module's private working set.

use crate::config::Tunables;
use crate::state::{ContactorState, FaultBits, PackState};

/// Per-pack contactor timers, reset on entry to the state they gate.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContactorTimers {
    pub precharge_timer_ms: u32,
    pub closing_timer_ms: u32,
    pub opening_timer_ms: u32,
}

impl ContactorTimers {
    pub const fn new() -> Self {
        Self {
            precharge_timer_ms: 0,
            closing_timer_ms: 0,
            opening_timer_ms: 0,
        }
    }
}

/// Commanded/observed inputs the sequencer reads each tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactorInputs {
    pub close_requested: bool,
    pub open_requested: bool,
    /// Target bus voltage pre-charge is driving toward.
    pub bus_voltage_mv: u32,
    /// Both main-contactor feedback inputs reporting closed.
    pub feedback_closed: bool,
}

/// Advance the contactor state machine by one tick. `pack.pack_voltage_mv`
/// and `pack.pack_current_ma` are read directly off the pack record; the
/// rest of the observed world comes in via `inputs`.
pub fn tick<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    timers: &mut ContactorTimers,
    inputs: &ContactorInputs,
    dt_ms: u32,
    t: &Tunables,
) {
    match pack.contactor_state {
        ContactorState::Open => {
            timers.precharge_timer_ms = 0;
            if inputs.close_requested {
                pack.contactor_state = ContactorState::PreCharge;
                timers.precharge_timer_ms = 0;
            }
        }

        ContactorState::PreCharge => {
            timers.precharge_timer_ms = timers.precharge_timer_ms.saturating_add(dt_ms);
            let target =
                (inputs.bus_voltage_mv as u64 * t.precharge_target_permille as u64 / 1_000) as u32;
            if inputs.open_requested {
                pack.contactor_state = ContactorState::Opening;
                timers.opening_timer_ms = 0;
            } else if pack.pack_voltage_mv >= target {
                pack.contactor_state = ContactorState::Closing;
                timers.closing_timer_ms = 0;
            } else if timers.precharge_timer_ms >= t.precharge_timeout_ms {
                pack.contactor_state = ContactorState::Open;
            }
        }

        ContactorState::Closing => {
            timers.closing_timer_ms = timers.closing_timer_ms.saturating_add(dt_ms);
            if inputs.open_requested {
                pack.contactor_state = ContactorState::Opening;
                timers.opening_timer_ms = 0;
            } else if inputs.feedback_closed {
                pack.contactor_state = ContactorState::Closed;
            } else if timers.closing_timer_ms >= t.closing_timeout_ms {
                pack.contactor_state = ContactorState::Open;
            }
        }

        ContactorState::Closed => {
            if inputs.open_requested {
                pack.contactor_state = ContactorState::Opening;
                timers.opening_timer_ms = 0;
            }
        }

        ContactorState::Opening => {
            timers.opening_timer_ms = timers.opening_timer_ms.saturating_add(dt_ms);
            if pack.pack_current_ma.unsigned_abs() < t.opening_current_threshold_ma {
                pack.contactor_state = ContactorState::Open;
            } else if timers.opening_timer_ms >= t.weld_detect_ms {
                pack.contactor_state = ContactorState::Welded;
                pack.faults.insert(FaultBits::CONTACTOR_WELD);
                pack.fault_latched = true;
            }
        }

        ContactorState::Welded => {
            // Terminal: only a manual fault reset after hardware service
            // can leave this state (handled by the pack state machine, not
            // here).
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PackState;

    fn pack() -> PackState<4, 1> {
        PackState::<4, 1>::new()
    }

    #[test]
    fn precharge_advances_to_closing_once_voltage_matches_target() {
        let t = Tunables::canonical();
        let mut pack = pack();
        let mut timers = ContactorTimers::new();
        let mut inputs = ContactorInputs {
            close_requested: true,
            bus_voltage_mv: 1_000_000,
            ..Default::default()
        };
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::PreCharge);

        pack.pack_voltage_mv = 960_000; // >= 95% of 1,000,000
        inputs.close_requested = false;
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::Closing);
    }

    #[test]
    fn precharge_times_out_back_to_open() {
        let t = Tunables::canonical();
        let mut pack = pack();
        let mut timers = ContactorTimers::new();
        let inputs = ContactorInputs {
            close_requested: true,
            bus_voltage_mv: 1_000_000,
            ..Default::default()
        };
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::PreCharge);
        for _ in 0..(t.precharge_timeout_ms / 100 + 1) {
            tick(&mut pack, &mut timers, &inputs, 100, &t);
        }
        assert_eq!(pack.contactor_state, ContactorState::Open);
    }

    #[test]
    fn closing_requires_feedback_before_closed() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.contactor_state = ContactorState::Closing;
        let mut timers = ContactorTimers::new();
        let mut inputs = ContactorInputs::default();
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::Closing);

        inputs.feedback_closed = true;
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::Closed);
    }

    #[test]
    fn weld_detected_when_current_persists_past_opening_window() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.contactor_state = ContactorState::Closed;
        pack.pack_current_ma = 50_000; // 50A, well above the 1A open threshold
        let mut timers = ContactorTimers::new();
        let mut inputs = ContactorInputs {
            open_requested: true,
            ..Default::default()
        };
        tick(&mut pack, &mut timers, &inputs, 50, &t); // Closed -> Opening
        assert_eq!(pack.contactor_state, ContactorState::Opening);

        inputs.open_requested = false;
        for _ in 0..(t.weld_detect_ms / 50) {
            tick(&mut pack, &mut timers, &inputs, 50, &t);
        }
        assert_eq!(pack.contactor_state, ContactorState::Welded);
        assert!(pack.faults.contains(FaultBits::CONTACTOR_WELD));
        assert!(pack.fault_latched);
    }

    #[test]
    fn opening_returns_to_open_once_current_decays() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.contactor_state = ContactorState::Opening;
        pack.pack_current_ma = 0;
        let mut timers = ContactorTimers::new();
        let inputs = ContactorInputs::default();
        tick(&mut pack, &mut timers, &inputs, 10, &t);
        assert_eq!(pack.contactor_state, ContactorState::Open);
    }
}
