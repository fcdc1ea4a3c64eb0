use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per patient, held for a whole trigger.
#[derive(Default)]
pub struct PatientLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PatientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, patient_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            locks.entry(patient_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
