//! Concrete peripheral adapters for target builds, generic over
//! `embedded-hal-async::i2c::I2c` the way the retrieved `card-io-fw` board
//! drivers are generic over their fuel-gauge I2C bus, rather than tying this
//! crate to one vendor HAL crate.
//!
//! Register-level framing for a specific cell-monitor ASIC is outside scope
//! (spec.md §1); `I2cCellMonitor` assumes a `read_block`/`write_block`
//! register map supplied by the caller through `CellMonitorRegisters`, so
//! swapping ASIC families only means swapping that one impl.

use embedded_hal_async::i2c::I2c;

use crate::error::HalError;
use crate::traits::{CellMonitorDriver, ModuleReadings};

/// Register-level exchange for one cell-monitor ASIC family. Implement this
/// once per supported chip; `I2cCellMonitor` handles the trait-boundary
/// conversion into `ModuleReadings` on top of it.
pub trait CellMonitorRegisters<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize> {
    async fn probe<I2C: I2c>(&mut self, bus: &mut I2C, addr: u8) -> Result<(), HalError>;
    async fn read_cells<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
        addr: u8,
    ) -> Result<[u16; CELLS_PER_MODULE], HalError>;
    async fn read_temps<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
        addr: u8,
    ) -> Result<[i16; SENSORS_PER_MODULE], HalError>;
    async fn read_current<I2C: I2c>(&mut self, bus: &mut I2C, addr: u8) -> Result<i32, HalError>;
    async fn read_safety_status<I2C: I2c>(&mut self, bus: &mut I2C, addr: u8) -> Result<u8, HalError>;
    async fn write_balance_mask<I2C: I2c>(
        &mut self,
        bus: &mut I2C,
        addr: u8,
        mask: &[bool; CELLS_PER_MODULE],
    ) -> Result<(), HalError>;
}

/// Adapts a register-level `CellMonitorRegisters` implementation onto the
/// core-facing `CellMonitorDriver` trait over one shared I2C bus, one
/// instance per module (`module_id` is the module's bus address).
pub struct I2cCellMonitor<I2C, R> {
    bus: I2C,
    regs: R,
}

impl<I2C, R> I2cCellMonitor<I2C, R> {
    pub fn new(bus: I2C, regs: R) -> Self {
        Self { bus, regs }
    }
}

impl<I2C, R, const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize>
    CellMonitorDriver<CELLS_PER_MODULE, SENSORS_PER_MODULE> for I2cCellMonitor<I2C, R>
where
    I2C: I2c,
    R: CellMonitorRegisters<CELLS_PER_MODULE, SENSORS_PER_MODULE>,
{
    async fn init(&mut self, module_id: u16) -> Result<(), HalError> {
        self.regs.probe(&mut self.bus, module_id as u8).await
    }

    async fn read_all(
        &mut self,
        module_id: u16,
    ) -> Result<ModuleReadings<CELLS_PER_MODULE, SENSORS_PER_MODULE>, HalError> {
        let addr = module_id as u8;
        let cell_mv = self.regs.read_cells(&mut self.bus, addr).await?;
        let temp_deci_c = self.regs.read_temps(&mut self.bus, addr).await?;
        let current_ma = self.regs.read_current(&mut self.bus, addr).await?;
        let safety_status = self.regs.read_safety_status(&mut self.bus, addr).await?;
        Ok(ModuleReadings {
            cell_mv,
            temp_deci_c,
            current_ma,
            safety_status,
        })
    }

    async fn set_balance_mask(
        &mut self,
        module_id: u16,
        mask: &[bool; CELLS_PER_MODULE],
    ) -> Result<(), HalError> {
        self.regs
            .write_balance_mask(&mut self.bus, module_id as u8, mask)
            .await
    }
}

/// `embassy-time`-backed [`crate::traits::MonotonicClock`].
pub struct EmbassyClock;

impl crate::traits::MonotonicClock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        embassy_time::Instant::now().as_millis() as u32
    }
}
