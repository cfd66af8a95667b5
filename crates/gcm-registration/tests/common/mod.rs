//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gcm_registration::{
    RegistrationCoordinator, RegistrationError, RegistrationRequest, RegistrationResult,
    RemoteSender,
};
use registration_store::{RegistrationStore, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Remote sender that counts calls and holds each registration until released.
///
/// Unregistration is only held when built with [`GatedSender::gating_unregister`].
pub struct GatedSender {
    pub register_calls: AtomicUsize,
    pub unregister_calls: AtomicUsize,
    release: Notify,
    release_unregister: Option<Notify>,
    outcome: RegistrationResult<String>,
}

impl GatedSender {
    pub fn succeeding(token: &str) -> Arc<Self> {
        Self::with_outcome(Ok(token.to_string()))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::with_outcome(Err(RegistrationError::Network(message.to_string())))
    }

    /// Succeeds, and also holds each unregistration until released.
    pub fn gating_unregister(token: &str) -> Arc<Self> {
        Arc::new(Self {
            release_unregister: Some(Notify::new()),
            ..Self::new(Ok(token.to_string()))
        })
    }

    fn with_outcome(outcome: RegistrationResult<String>) -> Arc<Self> {
        Arc::new(Self::new(outcome))
    }

    fn new(outcome: RegistrationResult<String>) -> Self {
        Self {
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
            release: Notify::new(),
            release_unregister: None,
            outcome,
        }
    }

    /// Let the pending registration complete.
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Let the pending unregistration complete.
    pub fn release_unregister(&self) {
        if let Some(gate) = &self.release_unregister {
            gate.notify_one();
        }
    }

    pub fn unregistrations(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    /// Wait until an unregistration call has started.
    pub async fn wait_for_unregistration(&self) {
        while self.unregistrations() == 0 {
            tokio::task::yield_now().await;
        }
    }

    pub fn registrations(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// Wait until a registration call has started.
    pub async fn wait_for_registration(&self) {
        while self.registrations() == 0 {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl RemoteSender for GatedSender {
    async fn register(&self, _request: &RegistrationRequest) -> RegistrationResult<String> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        self.outcome.clone()
    }

    async fn unregister(&self) -> RegistrationResult<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.release_unregister {
            gate.notified().await;
        }
        Ok(())
    }
}

/// Coordinator over a memory store and the given sender.
pub fn memory_coordinator(sender: Arc<GatedSender>) -> Arc<RegistrationCoordinator> {
    let store = Arc::new(RegistrationStore::new("it.example.demo", Store::memory()));
    Arc::new(RegistrationCoordinator::new(store, sender))
}

pub fn request() -> RegistrationRequest {
    RegistrationRequest::new("123456789")
}
