//! Register-map glue for the production cell-monitor ASIC, on top of
//! `marine_ess_hal::board`'s generic I2C adapter.
//!
//! Register-level exchange for a specific ASIC family is outside scope
//! (spec.md §1); `BatteryGuardRegisters` is the one piece that's chip-
//! specific, kept to a handful of TODO-marked stubs until a part is
//! selected, the same way the teacher's `CanDriver` stubs out the FDCAN
//! register sequence pending HAL support.

use marine_ess_hal::board::{CellMonitorRegisters, I2cCellMonitor};
use marine_ess_hal::error::HalError;

#[cfg(not(feature = "renode-mock"))]
pub type BatteryGuardCellMonitor =
    I2cCellMonitor<embassy_stm32::i2c::I2c<'static, embassy_stm32::mode::Async>, BatteryGuardRegisters>;

pub struct BatteryGuardRegisters;

impl CellMonitorRegisters<14, 3> for BatteryGuardRegisters {
    async fn probe<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        addr: u8,
    ) -> Result<(), HalError> {
        defmt::info!("cell monitor probe: addr=0x{:02x} (register map pending)", addr);
        // TODO: read the ASIC's device-id register once a part is chosen.
        Ok(())
    }

    async fn read_cells<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        _addr: u8,
    ) -> Result<[u16; 14], HalError> {
        // TODO: block-read the per-cell voltage registers.
        Err(HalError::CommFailed)
    }

    async fn read_temps<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        _addr: u8,
    ) -> Result<[i16; 3], HalError> {
        // TODO: block-read the thermistor ADC registers.
        Err(HalError::CommFailed)
    }

    async fn read_current<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        _addr: u8,
    ) -> Result<i32, HalError> {
        // TODO: read the coulomb-counter/shunt register.
        Err(HalError::CommFailed)
    }

    async fn read_safety_status<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        _addr: u8,
    ) -> Result<u8, HalError> {
        Ok(0)
    }

    async fn write_balance_mask<I2C: embedded_hal_async::i2c::I2c>(
        &mut self,
        _bus: &mut I2C,
        addr: u8,
        _mask: &[bool; 14],
    ) -> Result<(), HalError> {
        defmt::debug!("balance mask write: addr=0x{:02x} (register map pending)", addr);
        Ok(())
    }
}
