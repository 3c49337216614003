// ABOUTME: Per-user meal history cache with cache-first reads and server refresh
// ABOUTME: Optimistic inserts are prepended locally; a successful refresh replaces everything

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::store::{read_json, write_json, KeyValueStore, StoreKey};
use crate::types::{MealHistory, MealRecord, UserId};

/// Result of a history refresh. Failures are reported here instead of being
/// raised so the caller can keep showing the cached list.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Server truth replaced the cached list
    Replaced { count: usize },
    /// The cached list was left untouched
    Failed(ClientError),
    /// The history was cleared while the request was in flight; the response
    /// was dropped
    Superseded,
}

impl RefreshOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, RefreshOutcome::Replaced { .. })
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            RefreshOutcome::Failed(e) => Some(e),
            RefreshOutcome::Replaced { .. } | RefreshOutcome::Superseded => None,
        }
    }
}

/// Mutations hold the `entries` write lock across their snapshot write, so a
/// `clear` can never be followed by a stale write for the same user.
pub struct MealHistoryCache {
    store: Arc<dyn KeyValueStore>,
    entries: RwLock<HashMap<UserId, MealHistory>>,
    /// Bumped by every `clear`
    generation: AtomicU64,
    limit: usize,
}

impl MealHistoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            limit,
        }
    }

    /// Maximum number of meals requested per refresh
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Cached meals for `user_id`: the in-memory list, else the persisted
    /// snapshot, else empty. Never fails.
    pub fn load_cached(&self, user_id: &UserId) -> MealHistory {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(meals) = entries.get(user_id) {
                return meals.clone();
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(meals) = entries.get(user_id) {
            return meals.clone();
        }
        match self.read_snapshot(user_id) {
            Some(meals) => {
                entries.insert(user_id.clone(), meals.clone());
                meals
            }
            None => Vec::new(),
        }
    }

    /// Replace the cached list with server truth. On failure the cached list
    /// is left as it was. A response that arrives after a `clear` is dropped.
    pub async fn refresh(&self, backend: &dyn Backend, user_id: &UserId) -> RefreshOutcome {
        let generation = self.generation.load(Ordering::SeqCst);
        let mut meals = match backend.fetch_meals(user_id, self.limit).await {
            Ok(meals) => meals,
            Err(e) => {
                warn!("Meal history refresh failed for {}: {}", user_id, e);
                return RefreshOutcome::Failed(e);
            }
        };
        meals.truncate(self.limit);
        let count = meals.len();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping history refresh for {} issued before a clear", user_id);
            return RefreshOutcome::Superseded;
        }
        if let Err(e) = self.write_snapshot(user_id, &meals) {
            warn!("Failed to persist refreshed history for {}: {}", user_id, e);
        }
        entries.insert(user_id.clone(), meals);

        debug!("Refreshed {} meals for {}", count, user_id);
        RefreshOutcome::Replaced { count }
    }

    /// Prepend `record` and persist right away. The in-memory list is always
    /// updated; the returned error only concerns persistence.
    pub fn insert_optimistic(&self, user_id: &UserId, record: MealRecord) -> ClientResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(user_id) {
            let persisted = self.read_snapshot(user_id).unwrap_or_default();
            entries.insert(user_id.clone(), persisted);
        }
        let meals = entries.entry(user_id.clone()).or_default();
        meals.insert(0, record);

        debug!("Optimistically inserted meal for {} ({} cached)", user_id, meals.len());
        self.write_snapshot(user_id, meals)
    }

    /// Forget the cached list for `user_id`, including its snapshot, so a later
    /// `load_cached` cannot resurrect it without a refresh.
    pub fn clear(&self, user_id: &UserId) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.remove(user_id);
        if let Err(e) = self.store.remove(&StoreKey::MealHistory(user_id.clone())) {
            warn!("Failed to remove history snapshot for {}: {}", user_id, e);
        }
    }

    fn read_snapshot(&self, user_id: &UserId) -> Option<MealHistory> {
        let key = StoreKey::MealHistory(user_id.clone());
        match read_json::<MealHistory>(self.store.as_ref(), &key) {
            Ok(meals) => meals,
            Err(e) => {
                warn!("Ignoring unreadable history snapshot for {}: {}", user_id, e);
                None
            }
        }
    }

    fn write_snapshot(&self, user_id: &UserId, meals: &MealHistory) -> ClientResult<()> {
        write_json(
            self.store.as_ref(),
            &StoreKey::MealHistory(user_id.clone()),
            meals,
        )
    }
}
