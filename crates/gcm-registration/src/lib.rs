//! Push registration lifecycle.
//!
//! - Caches the registration token per application version
//! - Registers again when the running version changes
//! - Runs at most one registration call at a time per coordinator
//! - Forgets the cached token only after the push service accepted revocation

pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod sender;

pub use config::Config;
pub use coordinator::{CoordinatorState, RegistrationCoordinator};
pub use error::{RegistrationError, RegistrationResult};
pub use notify::{
    LogForwarder, MessageDispatcher, Notification, NotificationForwarder, PushEvent,
};
pub use sender::{RegistrationRequest, RemoteSender};
