//! Production `EmsLink` over FDCAN, on top of `marine_ess_hal::traits::EmsLink`.
//!
//! Frame layout for the EMS line protocol is outside scope (spec.md §1);
//! this is the one chip/bus-specific piece, stubbed the same way
//! `cell_monitor::BatteryGuardRegisters` stubs the ASIC register map.

use marine_ess_core::{EmsMessage, StatusSnapshot};
use marine_ess_hal::traits::EmsLink;

#[cfg(not(feature = "renode-mock"))]
pub struct BatteryGuardEmsLink {
    pub node_id: u16,
}

#[cfg(not(feature = "renode-mock"))]
impl BatteryGuardEmsLink {
    pub const fn new(node_id: u16) -> Self {
        Self { node_id }
    }
}

#[cfg(not(feature = "renode-mock"))]
impl EmsLink for BatteryGuardEmsLink {
    async fn poll_command(&mut self) -> Option<EmsMessage> {
        // TODO: non-blocking FDCAN receive + frame decode.
        None
    }

    async fn publish_status(&mut self, snapshot: &StatusSnapshot) {
        defmt::trace!(
            "status publish (node 0x{:04x}): mode={:?} soc={}%",
            self.node_id,
            snapshot.mode,
            snapshot.soc_percent
        );
        // TODO: encode snapshot into the EMS line protocol's CAN frame(s).
    }
}
