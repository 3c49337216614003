// ABOUTME: Drives photo submission, result parsing and the optimistic history update
// ABOUTME: Remembers the last successful analysis across restarts

use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{Backend, ImageUpload};
use crate::error::{ClientError, ClientResult};
use crate::history::MealHistoryCache;
use crate::store::{read_json, write_json, KeyValueStore, StoreKey};
use crate::types::{MealRecord, User};

/// Analysis orchestrator.
///
/// Concurrent calls are not serialized here. Whoever triggers an analysis is
/// responsible for not starting a second one while the first is outstanding.
pub struct AnalysisOrchestrator {
    history: Arc<MealHistoryCache>,
    store: Arc<dyn KeyValueStore>,
}

impl AnalysisOrchestrator {
    pub fn new(history: Arc<MealHistoryCache>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { history, store }
    }

    /// Submit `image` for analysis on behalf of `user`.
    ///
    /// Fails with `Unauthenticated` before any network traffic when there is
    /// no session. On success the record is prepended to the user's history.
    pub async fn analyze(
        &self,
        backend: &dyn Backend,
        user: Option<&User>,
        image: ImageUpload,
    ) -> ClientResult<MealRecord> {
        let user = user.ok_or(ClientError::Unauthenticated)?;
        let record = self.request(backend, user, image).await?;
        self.commit(user, &record);
        Ok(record)
    }

    /// Run the analysis without touching local state. Pair with
    /// [`AnalysisOrchestrator::commit`] once the caller knows the session that
    /// submitted the photo is still current.
    pub async fn request(
        &self,
        backend: &dyn Backend,
        user: &User,
        image: ImageUpload,
    ) -> ClientResult<MealRecord> {
        let response = backend.analyze(&user.user_id, image).await?;
        let record = MealRecord::from(response);

        info!(
            "Analyzed meal {} ({}, {} kcal)",
            record.id,
            record.display_name(),
            record.calories_label()
        );
        Ok(record)
    }

    /// Prepend `record` to the user's history and remember it as the last
    /// analysis. Persistence failures are logged, not returned.
    pub fn commit(&self, user: &User, record: &MealRecord) {
        if let Err(e) = self.history.insert_optimistic(&user.user_id, record.clone()) {
            warn!("Analysis result cached in memory only: {}", e);
        }
        if let Err(e) = write_json(self.store.as_ref(), &StoreKey::LastAnalysis, record) {
            warn!("Failed to persist last analysis: {}", e);
        }
    }

    /// Most recent successful analysis, if one was persisted and is readable
    pub fn last_analysis(&self) -> Option<MealRecord> {
        match read_json(self.store.as_ref(), &StoreKey::LastAnalysis) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable last analysis: {}", e);
                None
            }
        }
    }
}
