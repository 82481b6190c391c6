//! EMS-command ingestion task (spec §5: "EMS RX → core", event-driven):
//! decodes commands off the shared [`EmsLink`] and stores the latest one
//! for `core_tick` to act on next tick.
//!
//! A real FDCAN `poll_command` suspends on the peripheral's RX interrupt;
//! the host mock resolves immediately, so this is paced with a short
//! ticker rather than a bare loop to avoid starving the executor (the same
//! reason the teacher's `can_comm` task yields with `Timer::after_micros`
//! between iterations).

use embassy_time::{Duration, Ticker};

use marine_ess_hal::traits::EmsLink;

use super::{EMS_LINK, PENDING_EMS};

#[embassy_executor::task]
pub async fn run() {
    let mut ticker = Ticker::every(Duration::from_millis(5));
    loop {
        ticker.next().await;

        let received = {
            let mut link_guard = EMS_LINK.lock().await;
            match link_guard.as_mut() {
                Some(link) => link.poll_command().await,
                None => None,
            }
        };

        if let Some(msg) = received {
            defmt::debug!("EMS command received: {:?} at t={}", msg.command, msg.timestamp_ms);
            *PENDING_EMS.lock().await = msg;
        }
    }
}
