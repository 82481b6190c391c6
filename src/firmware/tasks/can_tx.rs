//! Status-publish task (spec §5: "State→CAN TX", 100 ms): captures a
//! [`StatusSnapshot`](marine_ess_core::StatusSnapshot) per pack and hands it
//! to the shared [`EmsLink`].

use embassy_time::{Duration, Ticker};

use marine_ess_core::StatusSnapshot;
use marine_ess_hal::traits::EmsLink;

use super::{ARRAY, EMS_LINK};

#[embassy_executor::task]
pub async fn run() {
    let mut ticker = Ticker::every(Duration::from_millis(100));
    loop {
        ticker.next().await;

        let mut snapshots = heapless::Vec::<StatusSnapshot, { super::MAX_PACKS }>::new();
        {
            let guard = ARRAY.lock().await;
            if let Some(array) = guard.as_ref() {
                for c in array.controllers.iter() {
                    let _ = snapshots.push(StatusSnapshot::capture(&c.pack));
                }
            }
        }

        let mut link_guard = EMS_LINK.lock().await;
        if let Some(link) = link_guard.as_mut() {
            for snapshot in &snapshots {
                link.publish_status(snapshot).await;
            }
        }
    }
}
