//! Registration cache for a single application identity.

use crate::backend::Store;
use crate::error::StoreError;
use crate::types::RegistrationRecord;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Cached push registration for one application.
///
/// All operations read and rewrite the whole document under the backend's
/// document lock, so a token and its version are always written and observed
/// together. Stores for different app ids may share one file.
pub struct RegistrationStore {
    app_id: String,
    backend: Store,
    lock: Arc<Mutex<()>>,
}

impl RegistrationStore {
    /// Create a store for `app_id` on top of `backend`.
    pub fn new(app_id: impl Into<String>, backend: Store) -> Self {
        let lock = backend.document_lock();
        Self {
            app_id: app_id.into(),
            backend,
            lock,
        }
    }

    /// Application identity this store is keyed by.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Return the cached record if it was registered by `current_version`.
    ///
    /// A record from another version is reported as absent but left on disk.
    pub async fn get_valid(
        &self,
        current_version: i32,
    ) -> Result<Option<RegistrationRecord>, StoreError> {
        match self.get_raw().await? {
            None => {
                info!(app_id = %self.app_id, "Registration not found");
                Ok(None)
            }
            Some(record) if record.is_valid_for(current_version) => Ok(Some(record)),
            Some(record) => {
                info!(
                    app_id = %self.app_id,
                    registered_version = record.app_version,
                    current_version,
                    "App version changed, cached registration is stale"
                );
                Ok(None)
            }
        }
    }

    /// Return the stored record regardless of version.
    pub async fn get_raw(&self) -> Result<Option<RegistrationRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.backend.load().await?;
        Ok(data.records.get(&self.app_id).cloned())
    }

    /// Overwrite the token and version together.
    pub async fn save(&self, token: &str, version: i32) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.backend.load().await?;

        info!(app_id = %self.app_id, app_version = version, "Saving registration");
        data.records
            .insert(self.app_id.clone(), RegistrationRecord::new(token, version));

        self.backend.save(&data).await
    }

    /// Remove the cached record.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.backend.load().await?;

        if data.records.remove(&self.app_id).is_none() {
            debug!(app_id = %self.app_id, "No registration to clear");
            return Ok(());
        }

        info!(app_id = %self.app_id, "Cleared registration");
        self.backend.save(&data).await
    }
}
