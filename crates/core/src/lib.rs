//! Domain layer of the seminar hub: records, validation, storage ports and
//! the seminar service that enforces ownership and membership rules.

pub mod constants;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

pub use service::{Resource, SeminarService, ServiceError};
pub use store::{IdentityDirectory, IdentityError, SeminarStore, StoreError};
