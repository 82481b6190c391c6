//! Array coordinator (spec §4.7): connect ordering across packs sharing a
//! DC bus, the voltage-match gate, and the Kirchhoff-law bus/current
//! solver with per-pack limit clamping.
//!
//! `MAX_PACKS` bounds the array the same way `N_CELLS`/`N_SENSORS` bound a
//! pack: a compile-time capacity, no heap.

use crate::config::Tunables;
use crate::controller::{Controller, ExternalContactorInputs};
use crate::ems::{EmsCommand, EmsMessage};
use crate::error::CoreError;
use crate::fault_log::FaultLogSink;
use crate::soc::reverse_eval_curve;
use crate::state::Mode;

/// Where the array is in a multi-pack connect sequence (spec §4.7
/// "Connect ordering"). Not part of `PackState`/`ProtectionState` — this
/// is array-level sequencing state, owned solely by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectPhase {
    Idle,
    AwaitingPioneer { pioneer_id: u8, discharge: bool },
    BroadcastingRemaining { discharge: bool },
}

/// Array-wide derived quantities (spec §3 `ArrayState`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayState {
    pub bus_voltage_mv: u32,
    pub array_charge_limit_ma: u32,
    pub array_discharge_limit_ma: u32,
}

/// One or more packs sharing a DC bus.
pub struct ArrayCoordinator<const N_CELLS: usize, const N_SENSORS: usize, const MAX_PACKS: usize> {
    pub controllers: heapless::Vec<Controller<N_CELLS, N_SENSORS>, MAX_PACKS>,
    pub state: ArrayState,
    connect_phase: ConnectPhase,
}

impl<const N_CELLS: usize, const N_SENSORS: usize, const MAX_PACKS: usize>
    ArrayCoordinator<N_CELLS, N_SENSORS, MAX_PACKS>
{
    pub fn new() -> Self {
        Self {
            controllers: heapless::Vec::new(),
            state: ArrayState::default(),
            connect_phase: ConnectPhase::Idle,
        }
    }

    pub fn add_pack(&mut self, c: Controller<N_CELLS, N_SENSORS>) -> Result<(), CoreError> {
        if self.controllers.iter().any(|existing| existing.id == c.id) {
            return Err(CoreError::DuplicatePackId);
        }
        self.controllers.push(c).map_err(|_| CoreError::ArrayFull)
    }

    fn index_of(&self, id: u8) -> Option<usize> {
        self.controllers.iter().position(|c| c.id == id)
    }

    fn voltage_gate_ok(&self, pack_voltage_mv: u32, t: &Tunables) -> bool {
        let allowed = t.voltage_match_mv_per_module * t.n_modules as u32;
        pack_voltage_mv.abs_diff(self.state.bus_voltage_mv) <= allowed
    }

    /// Pick the connect pioneer: lowest SoC among READY packs for charge,
    /// highest for discharge (spec §4.7).
    fn select_pioneer(&self, discharge: bool) -> Option<u8> {
        self.controllers
            .iter()
            .filter(|c| c.pack.mode == Mode::Ready)
            .fold(None::<&Controller<N_CELLS, N_SENSORS>>, |best, c| match best {
                None => Some(c),
                Some(b) => {
                    let better = if discharge {
                        c.pack.soc_hundredths > b.pack.soc_hundredths
                    } else {
                        c.pack.soc_hundredths < b.pack.soc_hundredths
                    };
                    if better {
                        Some(c)
                    } else {
                        Some(b)
                    }
                }
            })
            .map(|c| c.id)
    }

    /// Resolve this tick's connect sequencing into a per-pack EMS command
    /// override array (index-aligned with `self.controllers`), and step the
    /// phase state machine forward.
    fn resolve_connect_phase(
        &mut self,
        ems: EmsMessage,
        t: &Tunables,
        per_pack_ems: &mut [EmsMessage],
    ) {
        if matches!(
            ems.command,
            EmsCommand::ConnectForCharge | EmsCommand::ConnectForDischarge
        ) && self.connect_phase == ConnectPhase::Idle
        {
            let discharge = matches!(ems.command, EmsCommand::ConnectForDischarge);
            if let Some(pioneer_id) = self.select_pioneer(discharge) {
                self.connect_phase = ConnectPhase::AwaitingPioneer {
                    pioneer_id,
                    discharge,
                };
            }
        }

        if let ConnectPhase::AwaitingPioneer {
            pioneer_id,
            discharge,
        } = self.connect_phase
        {
            if let Some(idx) = self.index_of(pioneer_id) {
                let pack = &self.controllers[idx].pack;
                if pack.mode == Mode::Connected {
                    self.connect_phase = ConnectPhase::BroadcastingRemaining { discharge };
                } else if pack.mode == Mode::Ready
                    && self.voltage_gate_ok(pack.pack_voltage_mv, t)
                {
                    per_pack_ems[idx] = EmsMessage {
                        command: connect_command(discharge),
                        timestamp_ms: ems.timestamp_ms,
                    };
                }
            } else {
                self.connect_phase = ConnectPhase::Idle;
            }
        }

        if let ConnectPhase::BroadcastingRemaining { discharge } = self.connect_phase {
            let mut any_ready_left = false;
            for (idx, c) in self.controllers.iter().enumerate() {
                if c.pack.mode == Mode::Ready {
                    any_ready_left = true;
                    if self.voltage_gate_ok(c.pack.pack_voltage_mv, t) {
                        per_pack_ems[idx] = EmsMessage {
                            command: connect_command(discharge),
                            timestamp_ms: ems.timestamp_ms,
                        };
                    }
                }
            }
            if !any_ready_left {
                self.connect_phase = ConnectPhase::Idle;
            }
        }
    }

    /// Sequencing per spec §4.7: step every controller, then solve the bus.
    ///
    /// `ems` is the array-wide EMS command for this tick; `comm_ok` and
    /// `feedback_closed` are index-aligned with `self.controllers`.
    /// `i_request_ma` is the externally requested total array current
    /// (positive = charging).
    pub fn tick(
        &mut self,
        dt_ms: u32,
        timestamp_ms: u32,
        t: &Tunables,
        ems: EmsMessage,
        comm_ok: &[bool],
        feedback_closed: &[bool],
        i_request_ma: i64,
        log: &mut dyn FaultLogSink,
    ) {
        let n = self.controllers.len();
        let mut per_pack_ems = [EmsMessage::default(); MAX_PACKS];
        if !matches!(
            ems.command,
            EmsCommand::ConnectForCharge | EmsCommand::ConnectForDischarge
        ) {
            for slot in per_pack_ems.iter_mut().take(n) {
                *slot = ems;
            }
        }
        self.resolve_connect_phase(ems, t, &mut per_pack_ems[..n]);

        for idx in 0..n {
            let bus_voltage_mv = self.state.bus_voltage_mv;
            let fb = feedback_closed.get(idx).copied().unwrap_or(false);
            let ok = comm_ok.get(idx).copied().unwrap_or(true);
            self.controllers[idx].tick(
                dt_ms,
                timestamp_ms,
                t,
                per_pack_ems[idx],
                ok,
                ExternalContactorInputs {
                    bus_voltage_mv,
                    feedback_closed: fb,
                },
                log,
            );
        }

        self.solve_bus(t, i_request_ma);
    }

    fn solve_bus(&mut self, t: &Tunables, i_request_ma: i64) {
        let connected: heapless::Vec<usize, MAX_PACKS> = self
            .controllers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.pack.mode == Mode::Connected)
            .map(|(i, _)| i)
            .collect();

        if connected.is_empty() {
            let ready_voltages: heapless::Vec<u32, MAX_PACKS> = self
                .controllers
                .iter()
                .filter(|c| c.pack.mode == Mode::Ready)
                .map(|c| c.pack.pack_voltage_mv)
                .collect();
            if !ready_voltages.is_empty() {
                let sum: u64 = ready_voltages.iter().map(|&v| v as u64).sum();
                self.state.bus_voltage_mv = (sum / ready_voltages.len() as u64) as u32;
            }
            self.state.array_charge_limit_ma = 0;
            self.state.array_discharge_limit_ma = 0;
            return;
        }

        let mut ocv_mv: heapless::Vec<i64, MAX_PACKS> = heapless::Vec::new();
        let mut charge_limit_ma: heapless::Vec<u32, MAX_PACKS> = heapless::Vec::new();
        let mut discharge_limit_ma: heapless::Vec<u32, MAX_PACKS> = heapless::Vec::new();
        for &idx in connected.iter() {
            let pack = &self.controllers[idx].pack;
            let per_cell_ocv = reverse_eval_curve(&t.ocv_table, pack.soc_hundredths as i32);
            let _ = ocv_mv.push(per_cell_ocv as i64 * N_CELLS as i64);
            let _ = charge_limit_ma.push(pack.charge_limit_ma.max(0) as u32);
            let _ = discharge_limit_ma.push(pack.discharge_limit_ma.max(0) as u32);
        }

        let (currents, v_bus_mv) = solve_bus_and_currents::<MAX_PACKS>(
            &ocv_mv,
            &charge_limit_ma,
            &discharge_limit_ma,
            i_request_ma,
            t.pack_internal_resistance_mohm,
        );

        for (k, &idx) in connected.iter().enumerate() {
            self.controllers[idx].pack.pack_current_ma = currents[k];
        }
        self.state.bus_voltage_mv = v_bus_mv.max(0) as u32;

        let min_charge = charge_limit_ma.iter().copied().min().unwrap_or(0);
        let min_discharge = discharge_limit_ma.iter().copied().min().unwrap_or(0);
        self.state.array_charge_limit_ma = min_charge * connected.len() as u32;
        self.state.array_discharge_limit_ma = min_discharge * connected.len() as u32;
    }
}

impl<const N_CELLS: usize, const N_SENSORS: usize, const MAX_PACKS: usize> Default
    for ArrayCoordinator<N_CELLS, N_SENSORS, MAX_PACKS>
{
    fn default() -> Self {
        Self::new()
    }
}

fn connect_command(discharge: bool) -> EmsCommand {
    if discharge {
        EmsCommand::ConnectForDischarge
    } else {
        EmsCommand::ConnectForCharge
    }
}

/// Kirchhoff bus-voltage/current solver with iterative per-pack clamping
/// (spec §4.7). All connected packs share `r_mohm` (the canonical array
/// assumes identical pack hardware), which collapses
/// `V_bus = (Σ OCV_k/R_k + I_request) / Σ 1/R_k` to
/// `V_bus = (Σ OCV_k + I_request·R/1000) / n`.
///
/// Returns per-pack currents index-aligned with the inputs, and the
/// solved bus voltage (mV) from the final (possibly all-clamped) pass.
fn solve_bus_and_currents<const MAX_PACKS: usize>(
    ocv_mv: &[i64],
    charge_limit_ma: &[u32],
    discharge_limit_ma: &[u32],
    i_request_ma: i64,
    r_mohm: u32,
) -> (heapless::Vec<i32, MAX_PACKS>, i32) {
    let n = ocv_mv.len();
    let mut clamped = [false; MAX_PACKS];
    let mut result: heapless::Vec<i32, MAX_PACKS> = heapless::Vec::new();
    for _ in 0..n {
        let _ = result.push(0);
    }
    if n == 0 || r_mohm == 0 {
        return (result, 0);
    }

    let mut remaining_request = i_request_ma;
    let mut v_bus_mv: i64 = 0;

    for _ in 0..n {
        let active: heapless::Vec<usize, MAX_PACKS> =
            (0..n).filter(|&i| !clamped[i]).collect();
        if active.is_empty() {
            break;
        }
        let sum_ocv: i64 = active.iter().map(|&i| ocv_mv[i]).sum();
        let m = active.len() as i64;
        let term = remaining_request * r_mohm as i64 / 1_000;
        v_bus_mv = (sum_ocv + term) / m;

        let mut any_new_clamp = false;
        for &i in active.iter() {
            let i_k = (v_bus_mv - ocv_mv[i]) * 1_000 / r_mohm as i64;
            if i_k > charge_limit_ma[i] as i64 {
                result[i] = charge_limit_ma[i] as i32;
                clamped[i] = true;
                remaining_request -= charge_limit_ma[i] as i64;
                any_new_clamp = true;
            } else if -i_k > discharge_limit_ma[i] as i64 {
                result[i] = -(discharge_limit_ma[i] as i32);
                clamped[i] = true;
                remaining_request += discharge_limit_ma[i] as i64;
                any_new_clamp = true;
            } else {
                result[i] = i_k as i32;
            }
        }
        if !any_new_clamp {
            break;
        }
    }

    (result, v_bus_mv as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driven_mode_sums_to_requested_current() {
        let ocv = [3_800_i64 * 10, 3_900 * 10, 4_000 * 10]; // three packs, 10 cells each
        let charge = [u32::MAX, u32::MAX, u32::MAX];
        let discharge = [u32::MAX, u32::MAX, u32::MAX];
        let (currents, _v) =
            solve_bus_and_currents::<8>(&ocv, &charge, &discharge, 200_000, 50);
        let sum: i64 = currents.iter().map(|&c| c as i64).sum();
        assert!((sum - 200_000).abs() <= 2_000);
    }

    #[test]
    fn equalization_mode_sums_to_near_zero() {
        let ocv = [3_800_i64 * 10, 3_900 * 10, 4_000 * 10];
        let charge = [u32::MAX, u32::MAX, u32::MAX];
        let discharge = [u32::MAX, u32::MAX, u32::MAX];
        let (currents, _v) = solve_bus_and_currents::<8>(&ocv, &charge, &discharge, 0, 50);
        // lowest OCV pack charges, highest discharges
        assert!(currents[0] > 0);
        assert!(currents[2] < 0);
        let sum: i64 = currents.iter().map(|&c| c as i64).sum();
        assert!(sum.abs() <= 1_000);
    }

    #[test]
    fn clamped_pack_current_is_redistributed() {
        let ocv = [3_800_i64 * 10, 4_000 * 10];
        let charge = [10_000_u32, u32::MAX];
        let discharge = [u32::MAX, u32::MAX];
        let (currents, _v) = solve_bus_and_currents::<8>(&ocv, &charge, &discharge, 200_000, 50);
        assert_eq!(currents[0], 10_000);
        // remaining request goes entirely to pack 1
        assert!((currents[0] as i64 + currents[1] as i64 - 200_000).abs() <= 2_000);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let (currents, v) = solve_bus_and_currents::<8>(&[], &[], &[], 100_000, 50);
        assert!(currents.is_empty());
        assert_eq!(v, 0);
    }
}
