use std::collections::HashMap;

use backend_domain::{AttendanceEvent, SchoolId};
use tokio::sync::{broadcast, RwLock};

const CHANNEL_BUFFER: usize = 256;

/// School-scoped live feed of committed attendance records.
///
/// Publishing never blocks and never fails: a school without subscribers
/// simply drops the event.
#[derive(Default)]
pub struct AttendanceStreamHub {
    channels: RwLock<HashMap<SchoolId, broadcast::Sender<AttendanceEvent>>>,
}

impl AttendanceStreamHub {
    pub async fn subscribe(&self, school_id: SchoolId) -> broadcast::Receiver<AttendanceEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(school_id)
            .or_insert_with(|| {
                let (tx, _rx) = broadcast::channel(CHANNEL_BUFFER);
                tx
            })
            .subscribe()
    }

    /// Returns how many subscribers received the event.
    pub async fn publish(&self, event: &AttendanceEvent) -> usize {
        let delivered = {
            let channels = self.channels.read().await;
            let Some(tx) = channels.get(&event.school_id) else {
                return 0;
            };
            tx.send(event.clone()).ok()
        };
        match delivered {
            Some(count) => count,
            None => {
                self.prune(event.school_id).await;
                0
            }
        }
    }

    pub async fn subscriber_count(&self, school_id: SchoolId) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&school_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    async fn prune(&self, school_id: SchoolId) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&school_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(&school_id);
        }
    }
}
