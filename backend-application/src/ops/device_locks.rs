use std::collections::HashMap;
use std::sync::Arc;

use backend_domain::DeviceId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Single-flight guard: at most one ingestion per device at a time.
/// Locks are created on first use and never block unrelated devices.
#[derive(Default)]
pub struct DeviceLocks {
    locks: Mutex<HashMap<DeviceId, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    pub async fn acquire(&self, device_id: DeviceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(device_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn is_busy(&self, device_id: DeviceId) -> bool {
        let locks = self.locks.lock().await;
        locks
            .get(&device_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }
}
