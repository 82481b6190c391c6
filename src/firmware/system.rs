use embassy_executor::Spawner;
use embassy_stm32::Peripherals;
use embassy_time::{Duration, Timer};

use crate::firmware::config::{BoardConfig, HEARTBEAT_PERIOD_SECS};

/// Board bring-up: builds the array coordinator, wires one cell-monitor
/// chain per pack, stores them into the tasks' shared statics, and spawns
/// the periodic tasks (spec §5's task table).
pub async fn initialize(spawner: Spawner, p: Peripherals) -> ! {
    defmt::info!("=== ESS Controller Initialization ===");
    let cfg = BoardConfig::default();
    run_with_config(spawner, p, cfg).await
}

#[cfg(feature = "renode-mock")]
async fn run_with_config(spawner: Spawner, _p: Peripherals, cfg: BoardConfig) -> ! {
    use marine_ess_core::{ArrayCoordinator, Controller};

    use crate::firmware::tasks::core_tick::{ModuleDriver, PackIo};
    use crate::firmware::tasks::{can_rx, can_tx, core_tick, Array, EmsLinkImpl, ARRAY, EMS_LINK, MAX_PACKS};

    let mut array: Array = ArrayCoordinator::new();
    let mut packs_io = heapless::Vec::<PackIo, MAX_PACKS>::new();

    for pack_id in 0..cfg.n_packs {
        array
            .add_pack(Controller::new(pack_id))
            .expect("pack ids assigned from BoardConfig must be unique");
        let io = PackIo {
            modules: core::array::from_fn(|_| ModuleDriver::new()),
        };
        if packs_io.push(io).is_err() {
            panic!("BoardConfig::n_packs exceeds MAX_PACKS");
        }
    }

    *ARRAY.lock().await = Some(array);
    *EMS_LINK.lock().await = Some(EmsLinkImpl::new());

    spawner.spawn(core_tick::run(packs_io)).ok();
    spawner.spawn(can_tx::run()).ok();
    spawner.spawn(can_rx::run()).ok();

    defmt::info!("=== ESS Controller Ready: {} pack(s) ===", cfg.n_packs);
    heartbeat().await
}

/// Real-hardware bring-up is pending the cell-monitor I2C register map
/// (`cell_monitor::BatteryGuardRegisters`) and a shared-bus adapter for
/// `N_MODULES` devices on one bus; until then this target brings up clocks
/// and CAN only, matching the teacher's own "awaiting HAL" stubs.
#[cfg(not(feature = "renode-mock"))]
async fn run_with_config(_spawner: Spawner, _p: Peripherals, cfg: BoardConfig) -> ! {
    defmt::warn!(
        "cell-monitor bus not yet wired for this target (node 0x{:04x}); core_tick not spawned",
        cfg.can_node_id
    );
    heartbeat().await
}

async fn heartbeat() -> ! {
    let mut counter = 0u32;
    loop {
        Timer::after(Duration::from_secs(HEARTBEAT_PERIOD_SECS)).await;
        counter = counter.wrapping_add(1);
        defmt::info!("heartbeat: {} sec", counter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_config_default_has_at_least_one_pack() {
        let cfg = BoardConfig::default();
        assert!(cfg.n_packs >= 1);
    }
}
