//! The Monitor + Protection + Contactor + State tasks of spec §5's table,
//! fused into one 10 ms task.
//!
//! Spec §5 fixes the in-tick order (physics update → aggregate → SoC →
//! current limits → protection → state machine → contactor) and requires
//! "protection must never observe a pack state newer than the aggregator's
//! last complete pass" and that the four stages share one record inside a
//! critical section. Scheduling them as four independently-preemptible
//! embassy tasks at 10/10/50/100 ms would need its own cross-task lock-step
//! protocol to keep that same guarantee; `Controller::tick` already *is*
//! that fixed-order step function (spec §9: "no generator or coroutine ...
//! every tick completes with a well-defined state"), so this task just
//! drives it once per Monitor/Protection period. Running the contactor and
//! pack-state-machine steps faster than their nominal 50/100 ms cadence is
//! conservative, not incorrect: both are idempotent step functions over
//! already-converged state when nothing changed since the last call.
//!
//! CAN TX and CAN RX remain genuinely separate, slower, I/O-bound tasks
//! (`can_tx`, `can_rx`) since those talk to an external collaborator and
//! have their own suspension points (spec §5 "only I/O ... may block").

use embassy_time::{Duration, Ticker};

use marine_ess_core::{CanonicalPackState, EmsMessage, FaultBits, RingFaultLog, Tunables};
use marine_ess_hal::traits::CellMonitorDriver;

use super::{ARRAY, CELLS_PER_MODULE, N_MODULES, PENDING_EMS, SENSORS_PER_MODULE};

#[cfg(feature = "renode-mock")]
pub type ModuleDriver = marine_ess_hal::mock::MockCellMonitor<CELLS_PER_MODULE, SENSORS_PER_MODULE>;

#[cfg(not(feature = "renode-mock"))]
pub type ModuleDriver = crate::firmware::cell_monitor::BatteryGuardCellMonitor;

/// Per-pack cell-monitor chain: one driver instance per module (spec §6
/// "per module, M = N_MODULES").
pub struct PackIo {
    pub modules: [ModuleDriver; N_MODULES],
}

/// Pulls the latest reading from every module of one pack into its
/// `PackState` (the "physics/driver update" step of spec §5's fixed
/// order, run by the caller before `Controller::tick`). Returns whether
/// every module answered this cycle.
async fn refresh_pack(pack: &mut CanonicalPackState, io: &mut PackIo) -> bool {
    let mut comm_ok = true;
    for (module_idx, driver) in io.modules.iter_mut().enumerate() {
        match driver.read_all(module_idx as u16).await {
            Ok(reading) => {
                let cell_off = module_idx * CELLS_PER_MODULE;
                pack.cell_mv[cell_off..cell_off + CELLS_PER_MODULE]
                    .copy_from_slice(&reading.cell_mv);
                let temp_off = module_idx * SENSORS_PER_MODULE;
                pack.temp_deci_c[temp_off..temp_off + SENSORS_PER_MODULE]
                    .copy_from_slice(&reading.temp_deci_c);
                // The series string carries one current; module 0's shunt
                // reading is canonical. Other modules' readings are cross-
                // checked nowhere today — see DESIGN.md.
                if module_idx == 0 {
                    pack.pack_current_ma = reading.current_ma;
                }
                if reading.safety_status != 0 {
                    defmt::warn!(
                        "module {} raw safety_status=0x{:02x} (informational; protection re-evaluates hardware thresholds in software)",
                        module_idx,
                        reading.safety_status
                    );
                }
            }
            Err(_) => {
                comm_ok = false;
                pack.faults.insert(FaultBits::COMM_LOSS);
            }
        }
    }
    comm_ok
}

#[embassy_executor::task]
pub async fn run(mut packs_io: heapless::Vec<PackIo, { super::MAX_PACKS }>) {
    let t = Tunables::canonical();
    let mut log = RingFaultLog::<64>::new();
    let mut ticker = Ticker::every(Duration::from_millis(10));
    let mut timestamp_ms: u32 = 0;
    let mut logged_so_far = 0usize;

    defmt::info!("core_tick: starting, {} packs", packs_io.len());

    loop {
        ticker.next().await;

        let ems: EmsMessage = *PENDING_EMS.lock().await;

        {
            let mut guard = ARRAY.lock().await;
            if let Some(array) = guard.as_mut() {
                let n = array.controllers.len().min(packs_io.len());
                let mut comm_ok = heapless::Vec::<bool, { super::MAX_PACKS }>::new();
                let mut feedback_closed = heapless::Vec::<bool, { super::MAX_PACKS }>::new();

                for i in 0..n {
                    let ok = refresh_pack(&mut array.controllers[i].pack, &mut packs_io[i]).await;
                    let _ = comm_ok.push(ok);
                    // Main contactor feedback is read alongside the module
                    // chain in a full board bring-up; approximated here by
                    // the sequencer's own commanded state, which is the
                    // same simplification `renode-mock` uses elsewhere.
                    // Must include `Closing` itself (not just `Closed`):
                    // the sequencer only ever reaches `Closed` by observing
                    // `feedback_closed` true while in `Closing`, so gating
                    // this on `Closed` alone would never be satisfied.
                    let _ = feedback_closed.push(matches!(
                        array.controllers[i].pack.contactor_state,
                        marine_ess_core::ContactorState::Closing
                            | marine_ess_core::ContactorState::Closed
                    ));
                }

                array.tick(
                    10,
                    timestamp_ms,
                    &t,
                    ems,
                    &comm_ok,
                    &feedback_closed,
                    0,
                    &mut log,
                );
            }
        }

        timestamp_ms = timestamp_ms.wrapping_add(10);

        if log.len() > logged_so_far {
            logged_so_far = log.len();
            if let Some(event) = log.last() {
                defmt::warn!(
                    "fault logged: kind={:?} index={} value={} at t={}",
                    event.kind,
                    event.index,
                    event.value,
                    event.timestamp_ms
                );
            }
        }
    }
}
