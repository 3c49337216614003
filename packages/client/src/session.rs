// ABOUTME: Persisted session store owning the authenticated user's identity
// ABOUTME: Survives restarts; corrupt or incomplete data is treated as no session

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::store::{read_json, write_json, KeyValueStore, StoreKey};
use crate::types::User;

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the saved user. Never fails: unreadable data is logged and
    /// reported as absent.
    pub fn load(&self) -> Option<User> {
        match read_json::<User>(self.store.as_ref(), &StoreKey::Session) {
            Ok(Some(user)) if user.user_id.is_empty() => {
                warn!("Discarding persisted session without a user id");
                None
            }
            Ok(Some(user)) => {
                debug!("Restored session for user {}", user.user_id);
                Some(user)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Discarding unreadable persisted session: {}", e);
                None
            }
        }
    }

    pub fn save(&self, user: &User) -> ClientResult<()> {
        write_json(self.store.as_ref(), &StoreKey::Session, user)
    }

    pub fn clear(&self) -> ClientResult<()> {
        self.store.remove(&StoreKey::Session)
    }
}
