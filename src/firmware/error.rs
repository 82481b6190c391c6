//! Firmware-wide error handling for the collaborator boundary that sits
//! above `marine_ess_hal::HalError` (which is scoped to one I/O call) and
//! below `marine_ess_core::CoreError` (which is scoped to core API misuse):
//! the things that can go wrong bringing the board itself up.

#[derive(Debug, Clone, Copy, defmt::Format, PartialEq)]
pub enum FirmwareError {
    /// A pack's cell-monitor chain failed `init()` at startup.
    CellMonitorInitFailed,
    /// CAN-FD peripheral bring-up failed.
    CanInitFailed,
    /// Persistent store failed to load at startup; running with defaults.
    FlashInitFailed,
    /// A pack id collided while building the array (`CoreError::DuplicatePackId`).
    DuplicatePackConfig,
    /// `BoardConfig::n_packs` exceeds the array's `MAX_PACKS` capacity.
    TooManyPacks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Warning,
    Critical,
}

impl FirmwareError {
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::CanInitFailed => true,
            Self::FlashInitFailed => true,
            Self::CellMonitorInitFailed => false,
            Self::DuplicatePackConfig => false,
            Self::TooManyPacks => false,
        }
    }

    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CanInitFailed | Self::FlashInitFailed => ErrorSeverity::Warning,
            Self::CellMonitorInitFailed | Self::DuplicatePackConfig | Self::TooManyPacks => {
                ErrorSeverity::Critical
            }
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            Self::CellMonitorInitFailed => "cell-monitor chain initialization failed",
            Self::CanInitFailed => "CAN-FD initialization failed",
            Self::FlashInitFailed => "persistent store initialization failed",
            Self::DuplicatePackConfig => "duplicate pack id in board config",
            Self::TooManyPacks => "board config exceeds array capacity",
        }
    }
}

pub type Result<T> = core::result::Result<T, FirmwareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_monitor_failure_is_critical_and_unrecoverable() {
        assert_eq!(
            FirmwareError::CellMonitorInitFailed.severity(),
            ErrorSeverity::Critical
        );
        assert!(!FirmwareError::CellMonitorInitFailed.is_recoverable());
    }

    #[test]
    fn can_failure_is_a_recoverable_warning() {
        assert_eq!(FirmwareError::CanInitFailed.severity(), ErrorSeverity::Warning);
        assert!(FirmwareError::CanInitFailed.is_recoverable());
    }
}
