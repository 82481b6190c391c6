//! STM32 internal-flash-backed `PersistentStore` (spec §6 "persistent-store
//! contract": SoC and the cumulative charge/discharge/runtime counters must
//! survive a power cycle), dual-bank with a magic number and CRC32 the same
//! way the teacher's own `drivers::flash_storage::FlashStorage` protects its
//! calibration/config blob — just over a much smaller record.

use embassy_stm32::flash::{Blocking, Flash};
use crc::{Crc, CRC_32_CKSUM};

use marine_ess_hal::error::HalError;
use marine_ess_hal::traits::{PersistentSnapshot, PersistentStore};

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_CKSUM);

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct StoredRecord {
    magic: u32,
    version: u32,
    soc_hundredths: u16,
    _pad: u16,
    cumulative_charge_mah: u32,
    cumulative_discharge_mah: u32,
    runtime_hours: u32,
    crc: u32,
}

impl From<PersistentSnapshot> for StoredRecord {
    fn from(snapshot: PersistentSnapshot) -> Self {
        Self {
            magic: FlashPersistentStore::MAGIC,
            version: FlashPersistentStore::VERSION,
            soc_hundredths: snapshot.soc_hundredths,
            _pad: 0,
            cumulative_charge_mah: snapshot.cumulative_charge_mah,
            cumulative_discharge_mah: snapshot.cumulative_discharge_mah,
            runtime_hours: snapshot.runtime_hours,
            crc: 0,
        }
    }
}

impl From<StoredRecord> for PersistentSnapshot {
    fn from(record: StoredRecord) -> Self {
        Self {
            soc_hundredths: record.soc_hundredths,
            cumulative_charge_mah: record.cumulative_charge_mah,
            cumulative_discharge_mah: record.cumulative_discharge_mah,
            runtime_hours: record.runtime_hours,
        }
    }
}

/// Dual-bank store for the last 2 pages of internal flash, matching
/// `FlashStorage`'s bank layout on the STM32G431CB's 2 KB pages.
pub struct FlashPersistentStore {
    flash: Flash<'static, Blocking>,
}

impl FlashPersistentStore {
    const BANK_A_ADDR: u32 = 0x0801_F000; // page 62
    const BANK_B_ADDR: u32 = 0x0801_F800; // page 63
    const PAGE_SIZE: u32 = 2048;
    const MAGIC: u32 = 0xE55B_A77E;
    const VERSION: u32 = 1;

    pub fn new(flash_peripheral: embassy_stm32::Peri<'static, embassy_stm32::peripherals::FLASH>) -> Self {
        let flash = Flash::new_blocking(flash_peripheral);
        defmt::info!(
            "persistent store: bank A=0x{:08x} bank B=0x{:08x}",
            Self::BANK_A_ADDR,
            Self::BANK_B_ADDR
        );
        Self { flash }
    }

    fn calculate_crc(record: &StoredRecord) -> u32 {
        let bytes = unsafe {
            core::slice::from_raw_parts(
                record as *const _ as *const u8,
                core::mem::size_of::<StoredRecord>() - 4,
            )
        };
        CRC.checksum(bytes)
    }

    fn load_bank(addr: u32) -> Result<StoredRecord, ()> {
        let record = unsafe { *(addr as *const StoredRecord) };
        if record.magic != Self::MAGIC || record.version != Self::VERSION {
            return Err(());
        }
        if record.crc != Self::calculate_crc(&record) {
            return Err(());
        }
        Ok(record)
    }

    fn write_bank(&mut self, addr: u32, record: &StoredRecord) -> Result<(), HalError> {
        self.flash
            .blocking_erase(addr, addr + Self::PAGE_SIZE)
            .map_err(|_| HalError::StoreFailed)?;
        let bytes = unsafe {
            core::slice::from_raw_parts(record as *const _ as *const u8, core::mem::size_of::<StoredRecord>())
        };
        self.flash.blocking_write(addr, bytes).map_err(|_| HalError::StoreFailed)
    }
}

impl PersistentStore for FlashPersistentStore {
    async fn save_persistent(&mut self, snapshot: PersistentSnapshot) -> Result<(), HalError> {
        let mut record: StoredRecord = snapshot.into();
        record.crc = Self::calculate_crc(&record);
        self.write_bank(Self::BANK_A_ADDR, &record)?;
        self.write_bank(Self::BANK_B_ADDR, &record)?;
        Ok(())
    }

    async fn load_persistent(&mut self) -> Result<PersistentSnapshot, HalError> {
        match Self::load_bank(Self::BANK_A_ADDR) {
            Ok(record) => Ok(record.into()),
            Err(()) => match Self::load_bank(Self::BANK_B_ADDR) {
                Ok(record) => Ok(record.into()),
                Err(()) => Err(HalError::StoreFailed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_changes_when_record_contents_change() {
        let snapshot = PersistentSnapshot {
            soc_hundredths: 5_500,
            cumulative_charge_mah: 1_000,
            cumulative_discharge_mah: 900,
            runtime_hours: 12,
        };
        let mut record: StoredRecord = snapshot.into();
        record.crc = FlashPersistentStore::calculate_crc(&record);

        let mut other = record;
        other.soc_hundredths += 1;
        assert_ne!(FlashPersistentStore::calculate_crc(&other), record.crc);
    }

    #[test]
    fn round_trips_through_the_conversion_layer() {
        let snapshot = PersistentSnapshot {
            soc_hundredths: 4_200,
            cumulative_charge_mah: 50,
            cumulative_discharge_mah: 30,
            runtime_hours: 7,
        };
        let record: StoredRecord = snapshot.into();
        let back: PersistentSnapshot = record.into();
        assert_eq!(back, snapshot);
    }
}
