//! Pack operating-mode state machine (spec §4.6): seven modes, EMS
//! watchdog, and the fault-reset guard gate.
//!
//! Transitions are a total function of `(current_mode, inputs) →
//! next_mode`; an EMS command that doesn't apply to the current mode is
//! silently ignored, per spec.

use crate::config::Tunables;
use crate::ems::{EmsCommand, EmsMessage};
use crate::state::{ContactorState, FaultBits, Mode, PackState};

/// What the state machine wants the contactor sequencer to do this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactorRequest {
    pub close_requested: bool,
    pub open_requested: bool,
}

/// Result of one state-machine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateMachineOutcome {
    pub contactor_request: ContactorRequest,
    /// A `ResetFaults` command arrived but the safe-state hold guard was
    /// not satisfied (spec §7: "A reset is denied ... surfaced, not
    /// silently absorbed").
    pub reset_denied: bool,
}

/// Advance the pack mode by one tick. `comm_ok` is "every module reports
/// communication OK" (self-test pass); `reset_guard` is
/// [`crate::protection::fault_reset_guard`]'s result, computed by the
/// caller since it needs the `ProtectionState` this module doesn't own.
pub fn tick<const N_CELLS: usize, const N_SENSORS: usize>(
    pack: &mut PackState<N_CELLS, N_SENSORS>,
    ems: EmsMessage,
    comm_ok: bool,
    reset_guard: bool,
    dt_ms: u32,
    t: &Tunables,
) -> StateMachineOutcome {
    pack.uptime_ms = pack.uptime_ms.saturating_add(dt_ms);
    if ems.command != EmsCommand::None {
        pack.last_ems_msg_ms = ems.timestamp_ms;
    }

    if matches!(pack.mode, Mode::Connecting | Mode::Connected)
        && pack.uptime_ms.saturating_sub(pack.last_ems_msg_ms) > t.ems_watchdog_ms
    {
        pack.faults.insert(FaultBits::EMS_TIMEOUT);
        pack.fault_latched = true;
    }

    // Communication fault (spec §7): cell-monitor comm-loss is latched the
    // same as EMS timeout, once the pack is past the stage where "no
    // comm yet" is the expected startup condition.
    if !comm_ok && !matches!(pack.mode, Mode::Off | Mode::NotReady) {
        pack.faults.insert(FaultBits::COMM_LOSS);
        pack.fault_latched = true;
    }

    let mut req = ContactorRequest::default();
    let mut reset_denied = false;

    if pack.fault_latched && pack.mode != Mode::Fault {
        pack.mode = Mode::Fault;
        pack.charge_limit_ma = 0;
        pack.discharge_limit_ma = 0;
        req.open_requested = true;
    } else {
        match pack.mode {
            Mode::Off => {}

            Mode::NotReady => {
                if comm_ok {
                    pack.mode = Mode::Ready;
                }
            }

            Mode::Ready => match ems.command {
                EmsCommand::ConnectForCharge | EmsCommand::ConnectForDischarge => {
                    pack.mode = Mode::Connecting;
                    req.close_requested = true;
                }
                EmsCommand::PowerSave => {
                    pack.mode = Mode::PowerSave;
                }
                _ => {}
            },

            Mode::PowerSave => {
                if ems.command != EmsCommand::None && ems.command != EmsCommand::PowerSave {
                    pack.mode = Mode::Ready;
                }
            }

            Mode::Connecting => {
                if pack.contactor_state == ContactorState::Closed {
                    pack.mode = Mode::Connected;
                } else if pack.contactor_state == ContactorState::Open {
                    pack.mode = Mode::Ready;
                } else if ems.command == EmsCommand::Disconnect {
                    pack.mode = Mode::Ready;
                    req.open_requested = true;
                }
            }

            Mode::Connected => match ems.command {
                EmsCommand::Disconnect => {
                    pack.mode = Mode::Ready;
                    req.open_requested = true;
                }
                EmsCommand::SetLimits {
                    charge_ma,
                    discharge_ma,
                } => {
                    pack.charge_limit_ma = pack.charge_limit_ma.min(charge_ma as i32);
                    pack.discharge_limit_ma = pack.discharge_limit_ma.min(discharge_ma as i32);
                }
                _ => {}
            },

            Mode::Fault => {
                if ems.command == EmsCommand::ResetFaults {
                    if reset_guard {
                        pack.fault_latched = false;
                        pack.faults = FaultBits::empty();
                        pack.mode = Mode::Ready;
                    } else {
                        reset_denied = true;
                    }
                }
            }
        }
    }

    StateMachineOutcome {
        contactor_request: req,
        reset_denied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PackState;

    fn pack() -> PackState<4, 1> {
        let mut p = PackState::<4, 1>::new();
        p.mode = Mode::Ready;
        p
    }

    fn msg(cmd: EmsCommand, ts: u32) -> EmsMessage {
        EmsMessage {
            command: cmd,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn not_ready_advances_to_ready_on_comm_ok() {
        let t = Tunables::canonical();
        let mut pack = PackState::<4, 1>::new();
        let out = tick(&mut pack, EmsMessage::default(), true, false, 10, &t);
        assert_eq!(pack.mode, Mode::Ready);
        assert!(!out.contactor_request.close_requested);
    }

    #[test]
    fn ready_connect_for_charge_requests_close() {
        let t = Tunables::canonical();
        let mut pack = pack();
        let out = tick(&mut pack, msg(EmsCommand::ConnectForCharge, 0), true, false, 10, &t);
        assert_eq!(pack.mode, Mode::Connecting);
        assert!(out.contactor_request.close_requested);
    }

    #[test]
    fn connecting_follows_contactor_into_connected() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Connecting;
        pack.contactor_state = ContactorState::Closed;
        tick(&mut pack, EmsMessage::default(), true, false, 10, &t);
        assert_eq!(pack.mode, Mode::Connected);
    }

    #[test]
    fn fault_latched_forces_fault_mode_and_zeros_limits() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Connected;
        pack.charge_limit_ma = 50_000;
        pack.discharge_limit_ma = 50_000;
        pack.fault_latched = true;
        let out = tick(&mut pack, EmsMessage::default(), true, false, 10, &t);
        assert_eq!(pack.mode, Mode::Fault);
        assert_eq!(pack.charge_limit_ma, 0);
        assert_eq!(pack.discharge_limit_ma, 0);
        assert!(out.contactor_request.open_requested);
    }

    #[test]
    fn reset_faults_denied_without_safe_state_hold() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Fault;
        pack.fault_latched = true;
        let out = tick(
            &mut pack,
            msg(EmsCommand::ResetFaults, 0),
            true,
            false,
            10,
            &t,
        );
        assert_eq!(pack.mode, Mode::Fault);
        assert!(pack.fault_latched);
        assert!(out.reset_denied);
    }

    #[test]
    fn reset_faults_accepted_once_guard_satisfied() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Fault;
        pack.fault_latched = true;
        pack.faults.insert(FaultBits::CELL_OV);
        let out = tick(
            &mut pack,
            msg(EmsCommand::ResetFaults, 0),
            true,
            true,
            10,
            &t,
        );
        assert_eq!(pack.mode, Mode::Ready);
        assert!(!pack.fault_latched);
        assert!(pack.faults.is_empty());
        assert!(!out.reset_denied);
    }

    #[test]
    fn ems_watchdog_trips_fault_while_connected() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Connected;
        pack.last_ems_msg_ms = 0;
        // Advance uptime well past the watchdog window with no EMS traffic.
        for _ in 0..600 {
            tick(&mut pack, EmsMessage::default(), true, false, 10, &t);
        }
        assert_eq!(pack.mode, Mode::Fault);
        assert!(pack.faults.contains(FaultBits::EMS_TIMEOUT));
    }

    #[test]
    fn comm_loss_latches_fault_once_past_startup() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Connected;
        let out = tick(&mut pack, EmsMessage::default(), false, false, 10, &t);
        assert_eq!(pack.mode, Mode::Fault);
        assert!(pack.faults.contains(FaultBits::COMM_LOSS));
        assert!(out.contactor_request.open_requested);
    }

    #[test]
    fn comm_not_ok_during_startup_is_not_a_fault() {
        let t = Tunables::canonical();
        let mut pack = PackState::<4, 1>::new();
        tick(&mut pack, EmsMessage::default(), false, false, 10, &t);
        assert_eq!(pack.mode, Mode::NotReady);
        assert!(!pack.fault_latched);
    }

    #[test]
    fn set_limits_only_clamps_down_never_raises() {
        let t = Tunables::canonical();
        let mut pack = pack();
        pack.mode = Mode::Connected;
        pack.charge_limit_ma = 10_000;
        tick(
            &mut pack,
            msg(
                EmsCommand::SetLimits {
                    charge_ma: 50_000,
                    discharge_ma: 50_000,
                },
                0,
            ),
            true,
            false,
            10,
            &t,
        );
        assert_eq!(pack.charge_limit_ma, 10_000); // not raised
    }
}
