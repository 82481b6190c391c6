//! Errors at the hardware-collaborator boundary (spec §6: "Each call may
//! fail; a failure sets `faults.comm_loss` for that pack").
//!
//! These are distinct from `marine_ess_core::CoreError`: `CoreError` covers
//! misuse of the pure core API, `HalError` covers the I/O that actually
//! talks to a peripheral.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// The cell-monitor exchange for a module timed out or NAK'd.
    CommFailed,
    /// `init(module_id)` found no device answering on the bus.
    DeviceNotPresent,
    /// The persistent store failed to read or write its backing medium.
    StoreFailed,
}

impl HalError {
    pub const fn description(self) -> &'static str {
        match self {
            HalError::CommFailed => "cell-monitor communication failed",
            HalError::DeviceNotPresent => "cell-monitor device not present",
            HalError::StoreFailed => "persistent store access failed",
        }
    }
}
