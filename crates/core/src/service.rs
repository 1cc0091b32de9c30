use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::DATE_TIME_FORMAT;
use crate::store::{IdentityDirectory, IdentityError, SeminarStore, StoreError};
use crate::types::{
    Category, DeleteConfirmation, MembershipInsertOutcome, Seminar, SeminarDetails,
    SeminarDraft, SeminarForm, SeminarInput, SeminarListing, SeminarSummary, UserId,
};
use crate::validation::{parse_seminar_draft, ValidationErrors};

/// Entry point for every seminar operation exposed to callers.
#[derive(Clone)]
pub struct SeminarService {
    store: Arc<dyn SeminarStore>,
    identity: Arc<dyn IdentityDirectory>,
    display_tz: Tz,
}

impl SeminarService {
    pub fn new(
        store: Arc<dyn SeminarStore>,
        identity: Arc<dyn IdentityDirectory>,
        display_tz: Tz,
    ) -> Self {
        Self {
            store,
            identity,
            display_tz,
        }
    }

    /// Lists every seminar ordered by schedule.
    pub async fn list_all(&self) -> Result<Vec<SeminarSummary>, ServiceError> {
        let rows = self.store.list_seminars().await?;
        self.summaries(rows).await
    }

    /// Lists the seminars `participant` has joined. Empty when there are none.
    pub async fn list_joined(
        &self,
        participant: &UserId,
    ) -> Result<Vec<SeminarSummary>, ServiceError> {
        let rows = self.store.list_by_participant(participant).await?;
        self.summaries(rows).await
    }

    pub async fn get_details(&self, seminar_id: &str) -> Result<SeminarDetails, ServiceError> {
        let listing = self.load(seminar_id).await?;
        let names = self
            .resolve_names([listing.seminar.organizer_id.as_str()])
            .await?;
        let seminar = listing.seminar;

        Ok(SeminarDetails {
            organizer: display_name(&names, &seminar.organizer_id),
            schedule: self.format_schedule(seminar.scheduled_at),
            id: seminar.id,
            topic: seminar.topic,
            lecturer: seminar.lecturer,
            details: seminar.details,
            duration_minutes: seminar.duration_minutes,
            category: listing.category_name,
        })
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.store.list_categories().await?)
    }

    /// Returns the empty create form together with the selectable categories.
    pub async fn create_form(&self) -> Result<SeminarForm, ServiceError> {
        Ok(SeminarForm {
            values: None,
            categories: self.list_categories().await?,
        })
    }

    /// Validates and persists a new seminar organized by the caller, returning its id.
    pub async fn create(
        &self,
        organizer: &UserId,
        input: impl Into<SeminarDraft>,
    ) -> Result<String, ServiceError> {
        let draft = input.into();
        observe("create", async {
            let input = parse_seminar_draft(draft)?;
            self.ensure_category(input.category_id).await?;

            let seminar = Seminar::from_input(Uuid::new_v4().to_string(), organizer, &input);
            self.store.insert_seminar(&seminar).await?;
            info!(
                stage = "service",
                op = "create",
                seminar_id = %seminar.id,
                organizer = %organizer,
                "seminar created"
            );
            Ok(seminar.id)
        })
        .await
    }

    /// Returns the edit form prefilled with the current values. Only the organizer may open it.
    pub async fn edit_form(
        &self,
        seminar_id: &str,
        caller: &UserId,
    ) -> Result<SeminarForm, ServiceError> {
        let listing = self.load(seminar_id).await?;
        ensure_organizer(&listing.seminar, caller)?;

        Ok(SeminarForm {
            values: Some(SeminarInput::from(&listing.seminar)),
            categories: self.list_categories().await?,
        })
    }

    /// Overwrites the editable fields. The id and organizer never change.
    pub async fn edit(
        &self,
        seminar_id: &str,
        caller: &UserId,
        input: impl Into<SeminarDraft>,
    ) -> Result<(), ServiceError> {
        let draft = input.into();
        observe("edit", async {
            let listing = self.load(seminar_id).await?;
            ensure_organizer(&listing.seminar, caller)?;
            let input = parse_seminar_draft(draft)?;
            self.ensure_category(input.category_id).await?;

            // The guarded update fails when the seminar vanished after the load above.
            if !self.store.update_seminar(seminar_id, caller, &input).await? {
                return Err(ServiceError::NotFound(Resource::Seminar));
            }
            info!(stage = "service", op = "edit", seminar_id, "seminar updated");
            Ok(())
        })
        .await
    }

    pub async fn delete_confirmation(
        &self,
        seminar_id: &str,
        caller: &UserId,
    ) -> Result<DeleteConfirmation, ServiceError> {
        let listing = self.load(seminar_id).await?;
        ensure_organizer(&listing.seminar, caller)?;
        let seminar = listing.seminar;

        Ok(DeleteConfirmation {
            schedule: self.format_schedule(seminar.scheduled_at),
            id: seminar.id,
            topic: seminar.topic,
        })
    }

    /// Removes the seminar and all of its memberships.
    pub async fn delete(&self, seminar_id: &str, caller: &UserId) -> Result<(), ServiceError> {
        observe("delete", async {
            let listing = self.load(seminar_id).await?;
            ensure_organizer(&listing.seminar, caller)?;

            // A concurrent delete may have removed the row after the load above.
            let Some(memberships_removed) = self.store.delete_seminar(seminar_id).await? else {
                return Err(ServiceError::NotFound(Resource::Seminar));
            };
            info!(
                stage = "service",
                op = "delete",
                seminar_id,
                memberships_removed,
                "seminar deleted"
            );
            Ok(())
        })
        .await
    }

    /// Joins the seminar. Joining twice is a successful no-op.
    pub async fn join(&self, seminar_id: &str, participant: &UserId) -> Result<(), ServiceError> {
        observe("join", async {
            self.load(seminar_id).await?;

            match self.store.add_membership(seminar_id, participant).await? {
                MembershipInsertOutcome::Inserted => {
                    info!(stage = "service", op = "join", seminar_id, participant = %participant, "participant joined");
                    Ok(())
                }
                MembershipInsertOutcome::AlreadyJoined => {
                    debug!(stage = "service", op = "join", seminar_id, participant = %participant, "participant already joined");
                    Ok(())
                }
                MembershipInsertOutcome::MissingSeminar => {
                    Err(ServiceError::NotFound(Resource::Seminar))
                }
            }
        })
        .await
    }

    /// Leaves the seminar. Fails when the participant never joined it.
    pub async fn leave(&self, seminar_id: &str, participant: &UserId) -> Result<(), ServiceError> {
        observe("leave", async {
            self.load(seminar_id).await?;

            if !self.store.remove_membership(seminar_id, participant).await? {
                return Err(ServiceError::NotFound(Resource::Membership));
            }
            info!(stage = "service", op = "leave", seminar_id, participant = %participant, "participant left");
            Ok(())
        })
        .await
    }

    async fn load(&self, seminar_id: &str) -> Result<SeminarListing, ServiceError> {
        self.store
            .find_seminar(seminar_id)
            .await?
            .ok_or(ServiceError::NotFound(Resource::Seminar))
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), ServiceError> {
        if self.store.category_exists(category_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(Resource::Category))
        }
    }

    async fn summaries(
        &self,
        rows: Vec<SeminarListing>,
    ) -> Result<Vec<SeminarSummary>, ServiceError> {
        let names = self
            .resolve_names(rows.iter().map(|row| row.seminar.organizer_id.as_str()))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SeminarSummary {
                organizer: display_name(&names, &row.seminar.organizer_id),
                id: row.seminar.id,
                topic: row.seminar.topic,
                lecturer: row.seminar.lecturer,
                category: row.category_name,
                starts_at: row.seminar.scheduled_at,
            })
            .collect())
    }

    async fn resolve_names<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ServiceError> {
        let unique: BTreeSet<&str> = ids.into_iter().collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<String> = unique.into_iter().map(str::to_string).collect();
        Ok(self.identity.display_names(&ids).await?)
    }

    fn format_schedule(&self, value: DateTime<Utc>) -> String {
        value
            .with_timezone(&self.display_tz)
            .format(DATE_TIME_FORMAT)
            .to_string()
    }
}

fn ensure_organizer(seminar: &Seminar, caller: &UserId) -> Result<(), ServiceError> {
    if seminar.is_organized_by(caller) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

fn display_name(names: &HashMap<String, String>, user_id: &str) -> String {
    names
        .get(user_id)
        .cloned()
        .unwrap_or_else(|| user_id.to_string())
}

async fn observe<T>(
    op: &'static str,
    work: impl std::future::Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    let result = work.await;
    let label = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };
    if let Err(err) = &result {
        warn!(stage = "service", op, result = label, error = %err, "seminar operation rejected");
    }
    counter!("seminar_operations_total", "op" => op, "result" => label).increment(1);
    result
}

/// Entity a [`ServiceError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Seminar,
    Category,
    Membership,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seminar => "seminar",
            Self::Category => "category",
            Self::Membership => "membership",
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{} not found", .0.as_str())]
    NotFound(Resource),
    #[error("caller is not the organizer of the seminar")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ServiceError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Forbidden => "forbidden",
            Self::Store(_) => "storage",
            Self::Identity(_) => "identity",
        }
    }
}
