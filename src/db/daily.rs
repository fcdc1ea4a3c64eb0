use std::sync::Arc;
use tracing::warn;

use super::{daily_state_doc, DocumentStore};
use crate::error::StoreResult;
use crate::model::DailyGenerationState;

/// Load/store for the per-patient daily counters document.
#[derive(Clone)]
pub struct DailyStateRepository {
    store: Arc<dyn DocumentStore>,
}

impl DailyStateRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stored state, or a fresh one dated `today` when absent or unreadable.
    pub async fn load(&self, patient_id: &str, today: &str) -> StoreResult<DailyGenerationState> {
        let path = daily_state_doc(patient_id);
        match self.store.get(&path).await? {
            Some(doc) => match serde_json::from_value(doc) {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!("Daily state for patient {} is unreadable, starting fresh: {}", patient_id, e);
                    Ok(DailyGenerationState::new(today))
                }
            },
            None => Ok(DailyGenerationState::new(today)),
        }
    }

    pub async fn save(&self, patient_id: &str, state: &DailyGenerationState) -> StoreResult<()> {
        self.store
            .set(&daily_state_doc(patient_id), serde_json::to_value(state)?)
            .await
    }
}
