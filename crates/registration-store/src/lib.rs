//! Version-keyed cache for push registration tokens.
//!
//! A token is cached together with the application version that obtained it
//! and is only handed back to that same version. Storage is either a JSON
//! file on disk or process memory.

mod backend;
mod error;
mod store;
mod types;

pub use backend::{FileStore, MemoryStore, Store};
pub use error::StoreError;
pub use store::RegistrationStore;
pub use types::*;
