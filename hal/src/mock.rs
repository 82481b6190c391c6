//! Injectable-state mocks for desktop tests (spec §9: "a mock for desktop
//! tests with injectable state"), grounded in the teacher's
//! `renode-mock`-gated task modules (`tasks/mock_can.rs`, `tasks/mock_foc.rs`)
//! which exist for the same host/Renode-testing reason, but exposing plain
//! settable fields instead of a fixed canned sequence so a test can drive
//! comm-loss, clock advancement and store failures directly.

use heapless::Vec;

use crate::error::HalError;
use crate::traits::{CellMonitorDriver, EmsLink, MonotonicClock, ModuleReadings, PersistentStore};
use marine_ess_core::{EmsMessage, StatusSnapshot};

/// Re-exported so tests can reach for `mock::RingFaultLog` alongside the
/// other mocks without a second `use marine_ess_core::...` line.
pub use marine_ess_core::RingFaultLog;

/// Cell-monitor stand-in whose next reading (or failure) is set by the test.
pub struct MockCellMonitor<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize> {
    pub present: bool,
    pub next_reading: Option<[u16; CELLS_PER_MODULE]>,
    pub next_temps: [i16; SENSORS_PER_MODULE],
    pub next_current_ma: i32,
    pub next_safety_status: u8,
    pub fail_next_read: bool,
    pub last_balance_mask: Option<[bool; CELLS_PER_MODULE]>,
}

impl<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize>
    MockCellMonitor<CELLS_PER_MODULE, SENSORS_PER_MODULE>
{
    pub const fn new() -> Self {
        Self {
            present: true,
            next_reading: None,
            next_temps: [250; SENSORS_PER_MODULE],
            next_current_ma: 0,
            next_safety_status: 0,
            fail_next_read: false,
            last_balance_mask: None,
        }
    }
}

impl<const CELLS_PER_MODULE: usize, const SENSORS_PER_MODULE: usize> CellMonitorDriver<CELLS_PER_MODULE, SENSORS_PER_MODULE>
    for MockCellMonitor<CELLS_PER_MODULE, SENSORS_PER_MODULE>
{
    async fn init(&mut self, _module_id: u16) -> Result<(), HalError> {
        if self.present {
            Ok(())
        } else {
            Err(HalError::DeviceNotPresent)
        }
    }

    async fn read_all(
        &mut self,
        _module_id: u16,
    ) -> Result<ModuleReadings<CELLS_PER_MODULE, SENSORS_PER_MODULE>, HalError> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return Err(HalError::CommFailed);
        }
        let cell_mv = self.next_reading.unwrap_or([3_700; CELLS_PER_MODULE]);
        Ok(ModuleReadings {
            cell_mv,
            temp_deci_c: self.next_temps,
            current_ma: self.next_current_ma,
            safety_status: self.next_safety_status,
        })
    }

    async fn set_balance_mask(
        &mut self,
        _module_id: u16,
        mask: &[bool; CELLS_PER_MODULE],
    ) -> Result<(), HalError> {
        self.last_balance_mask = Some(*mask);
        Ok(())
    }
}

/// Monotonic clock whose value the test advances manually.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockClock {
    pub now_ms: u32,
}

impl MonotonicClock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now_ms
    }
}

/// Persistent store backed by a single in-memory slot.
pub struct MockStore {
    pub contents: Option<crate::traits::PersistentSnapshot>,
    pub fail_next_save: bool,
    pub fail_next_load: bool,
}

impl MockStore {
    pub const fn new() -> Self {
        Self {
            contents: None,
            fail_next_save: false,
            fail_next_load: false,
        }
    }
}

impl PersistentStore for MockStore {
    async fn save_persistent(
        &mut self,
        snapshot: crate::traits::PersistentSnapshot,
    ) -> Result<(), HalError> {
        if self.fail_next_save {
            self.fail_next_save = false;
            return Err(HalError::StoreFailed);
        }
        self.contents = Some(snapshot);
        Ok(())
    }

    async fn load_persistent(&mut self) -> Result<crate::traits::PersistentSnapshot, HalError> {
        if self.fail_next_load {
            self.fail_next_load = false;
            return Err(HalError::StoreFailed);
        }
        Ok(self.contents.unwrap_or_default())
    }
}

/// EMS line queued up by the test instead of decoded off a wire.
pub struct MockEmsLink<const MAX_PUBLISHED: usize = 8> {
    pub pending_commands: Vec<EmsMessage, 8>,
    pub published: Vec<StatusSnapshot, MAX_PUBLISHED>,
}

impl<const MAX_PUBLISHED: usize> MockEmsLink<MAX_PUBLISHED> {
    pub fn new() -> Self {
        Self {
            pending_commands: Vec::new(),
            published: Vec::new(),
        }
    }

    pub fn push_command(&mut self, msg: EmsMessage) {
        let _ = self.pending_commands.push(msg);
    }
}

impl<const MAX_PUBLISHED: usize> Default for MockEmsLink<MAX_PUBLISHED> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_PUBLISHED: usize> EmsLink for MockEmsLink<MAX_PUBLISHED> {
    async fn poll_command(&mut self) -> Option<EmsMessage> {
        if self.pending_commands.is_empty() {
            None
        } else {
            Some(self.pending_commands.remove(0))
        }
    }

    async fn publish_status(&mut self, snapshot: &StatusSnapshot) {
        let _ = self.published.push(*snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_reports_injected_value() {
        let clock = MockClock { now_ms: 12_345 };
        assert_eq!(clock.now_ms(), 12_345);
    }

    #[test]
    fn store_round_trips_without_a_backing_device() {
        let mut store = MockStore::new();
        let snap = crate::traits::PersistentSnapshot {
            soc_hundredths: 5_000,
            cumulative_charge_mah: 10,
            cumulative_discharge_mah: 5,
            runtime_hours: 2,
        };
        futures_lite_block_on(store.save_persistent(snap)).unwrap();
        let loaded = futures_lite_block_on(store.load_persistent()).unwrap();
        assert_eq!(loaded, snap);
    }

    /// Minimal no-std-friendly executor stand-in: every mock method resolves
    /// on first poll, so a hand-rolled no-op waker is enough to drive it
    /// without pulling in a full async runtime for unit tests.
    fn futures_lite_block_on<F: core::future::Future>(fut: F) -> F::Output {
        use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(core::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        let raw = RawWaker::new(core::ptr::null(), &VTABLE);
        let waker = unsafe { Waker::from_raw(raw) };
        let mut cx = Context::from_waker(&waker);
        let mut fut = core::pin::pin!(fut);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(v) => v,
            Poll::Pending => panic!("mock future did not resolve synchronously"),
        }
    }
}
