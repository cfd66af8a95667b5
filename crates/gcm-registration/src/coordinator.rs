//! Registration lifecycle with single-flight network calls.

use crate::error::{RegistrationError, RegistrationResult};
use crate::sender::{RegistrationRequest, RemoteSender};
use futures::future::{BoxFuture, FutureExt, Shared};
use registration_store::RegistrationStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

type InFlight = Shared<BoxFuture<'static, RegistrationResult<String>>>;

/// Lifecycle state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing attempted yet, or unregistered.
    Idle,
    /// A registration call is in flight.
    Registering,
    /// A valid token is cached for the last requested version.
    Registered,
    /// The last registration attempt failed.
    Failed,
}

struct Inner {
    state: CoordinatorState,
    in_flight: Option<InFlight>,
}

/// Decides when to register and makes sure only one registration call runs
/// at a time.
///
/// Callers that arrive while a registration is in flight wait on the same
/// call and receive the same token or error. While an unregistration runs,
/// callers wait for it to finish before consulting the cache.
pub struct RegistrationCoordinator {
    store: Arc<RegistrationStore>,
    sender: Arc<dyn RemoteSender>,
    inner: Arc<Mutex<Inner>>,
    // Held by unregister for its whole run, and by ensure_registered while it
    // decides between cache, join and start.
    lifecycle: Mutex<()>,
}

impl RegistrationCoordinator {
    pub fn new(store: Arc<RegistrationStore>, sender: Arc<dyn RemoteSender>) -> Self {
        Self {
            store,
            sender,
            inner: Arc::new(Mutex::new(Inner {
                state: CoordinatorState::Idle,
                in_flight: None,
            })),
            lifecycle: Mutex::new(()),
        }
    }

    /// Backing registration store.
    pub fn store(&self) -> &Arc<RegistrationStore> {
        &self.store
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> CoordinatorState {
        self.inner.lock().await.state
    }

    /// Return a token valid for `current_version`, registering if needed.
    ///
    /// A cached token for this version is returned without touching the
    /// network. Failures are returned as-is and never retried here.
    #[instrument(skip(self, request), fields(app_id = %self.store.app_id()))]
    pub async fn ensure_registered(
        &self,
        current_version: i32,
        request: &RegistrationRequest,
    ) -> RegistrationResult<String> {
        let flight = {
            let _lifecycle = self.lifecycle.lock().await;
            let mut inner = self.inner.lock().await;

            match inner.in_flight.clone() {
                Some(flight) => {
                    debug!("Joining in-flight registration");
                    flight
                }
                None => {
                    if let Some(record) = self.store.get_valid(current_version).await? {
                        debug!("Using cached registration");
                        inner.state = CoordinatorState::Registered;
                        return Ok(record.token);
                    }

                    let flight = self.start_registration(current_version, request.clone());
                    inner.in_flight = Some(flight.clone());
                    inner.state = CoordinatorState::Registering;
                    flight
                }
            }
        };

        flight.await
    }

    /// Run [`ensure_registered`](Self::ensure_registered) on the runtime
    /// without blocking the caller.
    pub fn spawn_ensure_registered(
        self: &Arc<Self>,
        current_version: i32,
        request: RegistrationRequest,
    ) -> JoinHandle<RegistrationResult<String>> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator
                .ensure_registered(current_version, &request)
                .await
        })
    }

    /// Revoke the registration, then forget the cached token.
    ///
    /// If the push service refuses, the cached token is kept so revocation
    /// can be retried against it. No registration starts and no cached token
    /// is handed out until this returns.
    #[instrument(skip(self), fields(app_id = %self.store.app_id()))]
    pub async fn unregister(&self) -> RegistrationResult<()> {
        let _lifecycle = self.lifecycle.lock().await;

        let pending = self.inner.lock().await.in_flight.clone();
        if let Some(flight) = pending {
            debug!("Waiting for in-flight registration before unregistering");
            let _ = flight.await;
        }

        if let Err(e) = self.sender.unregister().await {
            warn!(error = %e, "Unregister failed, keeping cached registration");
            return Err(e);
        }

        self.store.clear().await?;

        let mut inner = self.inner.lock().await;
        if inner.in_flight.is_none() {
            inner.state = CoordinatorState::Idle;
        }
        drop(inner);

        info!("Device unregistered");
        Ok(())
    }

    /// Spawn the network call and wrap it so every waiter can share it.
    fn start_registration(&self, version: i32, request: RegistrationRequest) -> InFlight {
        let store = Arc::clone(&self.store);
        let sender = Arc::clone(&self.sender);
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            info!(app_version = version, "Registering with push service");
            let result = register_and_save(sender.as_ref(), &store, version, &request).await;

            let mut inner = inner.lock().await;
            inner.in_flight = None;
            match &result {
                Ok(_) => {
                    info!(app_version = version, "Device registered");
                    inner.state = CoordinatorState::Registered;
                }
                Err(e) => {
                    warn!(error = %e, "Registration failed");
                    inner.state = CoordinatorState::Failed;
                }
            }
            result
        });

        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    let mut inner = inner.lock().await;
                    inner.in_flight = None;
                    inner.state = CoordinatorState::Failed;
                    Err(RegistrationError::Internal(format!(
                        "registration task failed: {}",
                        e
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn register_and_save(
    sender: &dyn RemoteSender,
    store: &RegistrationStore,
    version: i32,
    request: &RegistrationRequest,
) -> RegistrationResult<String> {
    let token = sender.register(request).await?;
    store.save(&token, version).await?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::MockRemoteSender;
    use mockall::Sequence;
    use registration_store::Store;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn request() -> RegistrationRequest {
        RegistrationRequest::new("123456789")
    }

    fn coordinator(sender: MockRemoteSender) -> RegistrationCoordinator {
        let store = Arc::new(RegistrationStore::new("demo", Store::memory()));
        RegistrationCoordinator::new(store, Arc::new(sender))
    }

    #[tokio::test]
    async fn test_cached_token_skips_network() {
        let mut sender = MockRemoteSender::new();
        sender.expect_register().times(0);

        let coordinator = coordinator(sender);
        coordinator.store().save("abc", 5).await.unwrap();

        let token = coordinator.ensure_registered(5, &request()).await.unwrap();
        assert_eq!(token, "abc");
        assert_eq!(coordinator.state().await, CoordinatorState::Registered);
    }

    #[tokio::test]
    async fn test_empty_store_registers_once_and_saves() {
        let mut sender = MockRemoteSender::new();
        sender
            .expect_register()
            .withf(|req| req.sender_id == "123456789")
            .times(1)
            .returning(|_| Ok("xyz".into()));

        let coordinator = coordinator(sender);
        assert_eq!(coordinator.state().await, CoordinatorState::Idle);

        let token = coordinator.ensure_registered(1, &request()).await.unwrap();
        assert_eq!(token, "xyz");

        let record = coordinator.store().get_valid(1).await.unwrap().unwrap();
        assert_eq!(record.token, "xyz");
        assert_eq!(coordinator.state().await, CoordinatorState::Registered);

        // Second call is a cache hit
        let token = coordinator.ensure_registered(1, &request()).await.unwrap();
        assert_eq!(token, "xyz");
    }

    #[tokio::test]
    async fn test_version_change_registers_again() {
        let mut sender = MockRemoteSender::new();
        sender
            .expect_register()
            .times(1)
            .returning(|_| Ok("fresh".into()));

        let coordinator = coordinator(sender);
        coordinator.store().save("old", 1).await.unwrap();

        let token = coordinator.ensure_registered(2, &request()).await.unwrap();
        assert_eq!(token, "fresh");
        assert!(coordinator.store().get_valid(1).await.unwrap().is_none());
        assert_eq!(
            coordinator.store().get_valid(2).await.unwrap().unwrap().token,
            "fresh"
        );
    }

    #[tokio::test]
    async fn test_failed_registration_is_not_retried_or_saved() {
        let mut seq = Sequence::new();
        let mut sender = MockRemoteSender::new();
        sender
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RegistrationError::Network("offline".into())));
        sender
            .expect_register()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("second".into()));

        let coordinator = coordinator(sender);

        let result = coordinator.ensure_registered(1, &request()).await;
        assert_eq!(result, Err(RegistrationError::Network("offline".into())));
        assert!(coordinator.store().get_raw().await.unwrap().is_none());
        assert_eq!(coordinator.state().await, CoordinatorState::Failed);

        // Retrying is up to the caller
        let token = coordinator.ensure_registered(1, &request()).await.unwrap();
        assert_eq!(token, "second");
        assert_eq!(coordinator.state().await, CoordinatorState::Registered);
    }

    #[tokio::test]
    async fn test_unregister_clears_store() {
        let mut sender = MockRemoteSender::new();
        sender.expect_unregister().times(1).returning(|| Ok(()));

        let coordinator = coordinator(sender);
        coordinator.store().save("abc", 3).await.unwrap();
        coordinator.ensure_registered(3, &request()).await.unwrap();

        assert_ok!(coordinator.unregister().await);

        assert!(coordinator.store().get_valid(3).await.unwrap().is_none());
        assert_eq!(coordinator.state().await, CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_failed_unregister_keeps_token() {
        let mut sender = MockRemoteSender::new();
        sender
            .expect_unregister()
            .times(1)
            .returning(|| Err(RegistrationError::Network("timeout".into())));

        let coordinator = coordinator(sender);
        coordinator.store().save("abc", 3).await.unwrap();
        coordinator.ensure_registered(3, &request()).await.unwrap();

        let result = coordinator.unregister().await;
        assert!(result.unwrap_err().is_network());

        let record = coordinator.store().get_valid(3).await.unwrap().unwrap();
        assert_eq!(record.token, "abc");
        assert_eq!(coordinator.state().await, CoordinatorState::Registered);
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registration.json");
        std::fs::write(&path, b"not json").unwrap();

        let mut sender = MockRemoteSender::new();
        sender.expect_register().times(0);

        let store = Arc::new(RegistrationStore::new("demo", Store::file(&path)));
        let coordinator = RegistrationCoordinator::new(store, Arc::new(sender));

        let result = coordinator.ensure_registered(1, &request()).await;
        assert!(matches!(result, Err(RegistrationError::Store(_))));
    }

    #[tokio::test]
    async fn test_save_failure_after_register_is_surfaced() {
        let dir = TempDir::new().unwrap();
        // Parent path is a regular file, so the first write fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let mut sender = MockRemoteSender::new();
        sender
            .expect_register()
            .times(1)
            .returning(|_| Ok("xyz".into()));

        let store = Arc::new(RegistrationStore::new(
            "demo",
            Store::file(blocker.join("registration.json")),
        ));
        let coordinator = RegistrationCoordinator::new(store, Arc::new(sender));

        let result = coordinator.ensure_registered(1, &request()).await;
        assert!(matches!(result, Err(RegistrationError::Store(_))));
        assert_eq!(coordinator.state().await, CoordinatorState::Failed);
    }

    #[tokio::test]
    async fn test_spawn_ensure_registered() {
        let mut sender = MockRemoteSender::new();
        sender
            .expect_register()
            .times(1)
            .returning(|_| Ok("bg".into()));

        let coordinator = Arc::new(coordinator(sender));
        let handle = coordinator.spawn_ensure_registered(7, request());

        assert_eq!(handle.await.unwrap().unwrap(), "bg");
        assert_eq!(
            coordinator.store().get_valid(7).await.unwrap().unwrap().token,
            "bg"
        );
    }
}
