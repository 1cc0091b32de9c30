//! Ports the seminar service depends on.
//!
//! Implementations live outside the core crate: the SQLite store in
//! `seminar-hub-storage` and the identity directory adapter in the app.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    Category, MembershipInsertOutcome, Seminar, SeminarInput, SeminarListing, UserId,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a storage backend.
#[derive(Debug, Error)]
#[error("storage backend error: {0}")]
pub struct StoreError(#[source] BoxError);

impl StoreError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }
}

/// Failure reported by the identity directory.
#[derive(Debug, Error)]
#[error("identity directory error: {0}")]
pub struct IdentityError(#[source] BoxError);

impl IdentityError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(err.into())
    }
}

/// Relational storage for categories, seminars and memberships.
///
/// Listings are ordered by schedule, then id.
#[async_trait]
pub trait SeminarStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    async fn category_exists(&self, category_id: i64) -> Result<bool, StoreError>;

    async fn list_seminars(&self) -> Result<Vec<SeminarListing>, StoreError>;

    /// Lists the seminars `participant` holds a membership for.
    async fn list_by_participant(
        &self,
        participant: &UserId,
    ) -> Result<Vec<SeminarListing>, StoreError>;

    async fn find_seminar(&self, seminar_id: &str) -> Result<Option<SeminarListing>, StoreError>;

    async fn insert_seminar(&self, seminar: &Seminar) -> Result<(), StoreError>;

    /// Overwrites the editable fields of a seminar owned by `organizer`.
    ///
    /// Returns `false` when no seminar with that id and organizer exists.
    async fn update_seminar(
        &self,
        seminar_id: &str,
        organizer: &UserId,
        input: &SeminarInput,
    ) -> Result<bool, StoreError>;

    /// Removes the seminar and all of its memberships in one atomic unit.
    ///
    /// Returns the number of membership rows removed, or `None` when the seminar no
    /// longer exists.
    async fn delete_seminar(&self, seminar_id: &str) -> Result<Option<u64>, StoreError>;

    async fn add_membership(
        &self,
        seminar_id: &str,
        participant: &UserId,
    ) -> Result<MembershipInsertOutcome, StoreError>;

    /// Returns `false` when the pair had no membership row.
    async fn remove_membership(
        &self,
        seminar_id: &str,
        participant: &UserId,
    ) -> Result<bool, StoreError>;
}

/// Read-only lookup from user id to display name.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolves the ids it knows; unknown ids are simply absent from the map.
    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>, IdentityError>;
}
