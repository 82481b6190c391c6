//! Per-pack controller (spec §3 `ArrayState`: "owns an ordered sequence of
//! per-pack `Controller` records"). Bundles `PackState` + `ProtectionState`
//! + the contactor sequencer's timers and drives them in the fixed order
//! spec §5 mandates: aggregate → SoC → current limits → protection →
//! state machine → contactor. Physics/driver update (reading new raw cell
//! values into `pack.cell_mv`/`temp_deci_c`/`pack_current_ma`) happens
//! before `tick` is called, by the caller (monitor task or array
//! coordinator in simulation).

use crate::aggregator;
use crate::balancing;
use crate::config::Tunables;
use crate::contactor::{self, ContactorInputs, ContactorTimers};
use crate::current_limit::{self, LimitInputs};
use crate::ems::EmsMessage;
use crate::fault_log::FaultLogSink;
use crate::pack_state_machine::{self, StateMachineOutcome};
use crate::protection;
use crate::soc;
use crate::state::{Mode, PackState, ProtectionState};

/// Inputs to the contactor sequencer that originate outside this pack (bus
/// voltage target, main-contactor feedback), as opposed to the
/// close/open request the state machine produces internally this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalContactorInputs {
    pub bus_voltage_mv: u32,
    pub feedback_closed: bool,
}

/// One pack's complete controller state.
pub struct Controller<const N_CELLS: usize, const N_SENSORS: usize> {
    pub id: u8,
    pub pack: PackState<N_CELLS, N_SENSORS>,
    pub protection: ProtectionState<N_CELLS, N_SENSORS>,
    pub contactor_timers: ContactorTimers,
    rest_timer_ms: u32,
}

impl<const N_CELLS: usize, const N_SENSORS: usize> Controller<N_CELLS, N_SENSORS> {
    pub const fn new(id: u8) -> Self {
        Self {
            id,
            pack: PackState::new(),
            protection: ProtectionState::new(),
            contactor_timers: ContactorTimers::new(),
            rest_timer_ms: 0,
        }
    }

    /// Advance this pack by one tick. `comm_ok` reports whether every
    /// module's self-test currently passes (gates NOT_READY → READY).
    pub fn tick(
        &mut self,
        dt_ms: u32,
        timestamp_ms: u32,
        t: &Tunables,
        ems: EmsMessage,
        comm_ok: bool,
        external: ExternalContactorInputs,
        log: &mut dyn FaultLogSink,
    ) -> StateMachineOutcome {
        aggregator::aggregate(&mut self.pack, t.imbalance_warn_mv);

        soc::update(&mut self.pack, dt_ms, &mut self.rest_timer_ms, t);

        let (charge_ma, discharge_ma) = current_limit::compute_limits(
            LimitInputs {
                worst_temp_deci_c: self.pack.max_temp_deci_c,
                soc_hundredths: self.pack.soc_hundredths,
                max_cell_mv: self.pack.max_cell_mv,
                min_cell_mv: self.pack.min_cell_mv,
            },
            &t.temp_derating_curve,
            &t.soc_derating_curve,
            &t.voltage_derating_curve,
            t.nominal_capacity_mah,
        );
        self.pack.charge_limit_ma = charge_ma as i32;
        self.pack.discharge_limit_ma = discharge_ma as i32;

        protection::tick(
            &mut self.pack,
            &mut self.protection,
            dt_ms,
            timestamp_ms,
            t,
            log,
        );

        let reset_guard = protection::fault_reset_guard(&self.protection, t);
        let was_fault = self.pack.mode == Mode::Fault;
        let outcome = pack_state_machine::tick(&mut self.pack, ems, comm_ok, reset_guard, dt_ms, t);

        if was_fault && self.pack.mode == Mode::Ready {
            // Spec §4.6 FAULT -> READY: "timers zeroed". hw_fault_latched
            // is intentionally excluded (spec §7: cleared only by explicit
            // operator acknowledgement, never alongside a software reset).
            let hw_latched = self.protection.hw_fault_latched;
            self.protection = ProtectionState::new();
            self.protection.hw_fault_latched = hw_latched;
            self.contactor_timers = ContactorTimers::new();
        }

        let contactor_inputs = ContactorInputs {
            close_requested: outcome.contactor_request.close_requested,
            open_requested: outcome.contactor_request.open_requested,
            bus_voltage_mv: external.bus_voltage_mv,
            feedback_closed: external.feedback_closed,
        };
        contactor::tick(&mut self.pack, &mut self.contactor_timers, &contactor_inputs, dt_ms, t);

        outcome
    }

    /// Passive-balance decision for this cycle (spec §6 `set_balance_mask`
    /// collaborator call); independent of the safety-critical tick order.
    pub fn balance_mask(&self, t: &Tunables) -> [bool; N_CELLS] {
        balancing::compute_balance_mask(&self.pack, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ems::EmsCommand;
    use crate::fault_log::RingFaultLog;
    use crate::state::ContactorState;

    #[test]
    fn power_on_to_connected_end_to_end() {
        let t = Tunables::canonical();
        let mut c = Controller::<4, 1>::new(0);
        c.pack.cell_mv = [3_700; 4];
        c.pack.temp_deci_c = [250];
        let mut log = RingFaultLog::<8>::new();

        // NOT_READY -> READY
        c.tick(
            10,
            0,
            &t,
            EmsMessage::default(),
            true,
            ExternalContactorInputs::default(),
            &mut log,
        );
        assert_eq!(c.pack.mode, Mode::Ready);

        // READY -> CONNECTING, contactor requested closed
        c.tick(
            10,
            10,
            &t,
            EmsMessage {
                command: EmsCommand::ConnectForCharge,
                timestamp_ms: 10,
            },
            true,
            ExternalContactorInputs {
                bus_voltage_mv: c.pack.pack_voltage_mv,
                feedback_closed: false,
            },
            &mut log,
        );
        assert_eq!(c.pack.mode, Mode::Connecting);
        assert_eq!(c.pack.contactor_state, ContactorState::PreCharge);

        // Voltage already matches target (same pack voltage as bus) -> CLOSING.
        c.tick(
            10,
            20,
            &t,
            EmsMessage::default(),
            true,
            ExternalContactorInputs {
                bus_voltage_mv: c.pack.pack_voltage_mv,
                feedback_closed: false,
            },
            &mut log,
        );
        assert_eq!(c.pack.contactor_state, ContactorState::Closing);

        // Feedback confirms closed -> CLOSED, then state machine follows to CONNECTED.
        c.tick(
            10,
            30,
            &t,
            EmsMessage::default(),
            true,
            ExternalContactorInputs {
                bus_voltage_mv: c.pack.pack_voltage_mv,
                feedback_closed: true,
            },
            &mut log,
        );
        assert_eq!(c.pack.contactor_state, ContactorState::Closed);

        c.tick(
            10,
            40,
            &t,
            EmsMessage::default(),
            true,
            ExternalContactorInputs {
                bus_voltage_mv: c.pack.pack_voltage_mv,
                feedback_closed: true,
            },
            &mut log,
        );
        assert_eq!(c.pack.mode, Mode::Connected);
    }

    #[test]
    fn fault_reset_zeros_protection_timers_but_not_hw_latch() {
        let t = Tunables::canonical();
        let mut c = Controller::<4, 1>::new(0);
        c.pack.cell_mv = [3_700; 4];
        c.pack.temp_deci_c = [250];
        c.pack.mode = Mode::Fault;
        c.pack.fault_latched = true;
        c.protection.safe_state_ms = t.fault_reset_hold_ms;
        c.protection.hw_fault_latched = true;
        c.protection.ov_timer_ms[0] = 1_234;
        let mut log = RingFaultLog::<8>::new();

        c.tick(
            10,
            0,
            &t,
            EmsMessage {
                command: EmsCommand::ResetFaults,
                timestamp_ms: 0,
            },
            true,
            ExternalContactorInputs::default(),
            &mut log,
        );

        assert_eq!(c.pack.mode, Mode::Ready);
        assert_eq!(c.protection.ov_timer_ms[0], 0);
        assert!(c.protection.hw_fault_latched);
    }
}
