use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier handed out by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Classification label attached to a seminar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Seminar as persisted in the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seminar {
    pub id: String,
    pub topic: String,
    pub lecturer: String,
    pub details: String,
    pub organizer_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub category_id: i64,
}

impl Seminar {
    /// Builds a new seminar owned by `organizer` from validated input.
    pub fn from_input(id: String, organizer: &UserId, input: &SeminarInput) -> Self {
        Self {
            id,
            topic: input.topic.clone(),
            lecturer: input.lecturer.clone(),
            details: input.details.clone(),
            organizer_id: organizer.as_str().to_string(),
            scheduled_at: input.scheduled_at,
            duration_minutes: input.duration_minutes,
            category_id: input.category_id,
        }
    }

    pub fn is_organized_by(&self, user: &UserId) -> bool {
        self.organizer_id == user.as_str()
    }
}

/// Fields a caller may supply when creating or editing a seminar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarInput {
    pub topic: String,
    pub lecturer: String,
    pub details: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub category_id: i64,
}

/// Seminar fields as submitted by a client, before presence and range checks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeminarDraft {
    pub topic: Option<String>,
    pub lecturer: Option<String>,
    pub details: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub category_id: Option<i64>,
}

impl From<SeminarInput> for SeminarDraft {
    fn from(input: SeminarInput) -> Self {
        Self {
            topic: Some(input.topic),
            lecturer: Some(input.lecturer),
            details: Some(input.details),
            scheduled_at: Some(input.scheduled_at),
            duration_minutes: Some(i64::from(input.duration_minutes)),
            category_id: Some(input.category_id),
        }
    }
}

impl From<&Seminar> for SeminarInput {
    fn from(seminar: &Seminar) -> Self {
        Self {
            topic: seminar.topic.clone(),
            lecturer: seminar.lecturer.clone(),
            details: seminar.details.clone(),
            scheduled_at: seminar.scheduled_at,
            duration_minutes: seminar.duration_minutes,
            category_id: seminar.category_id,
        }
    }
}

/// A seminar joined with the name of its category.
#[derive(Debug, Clone, PartialEq)]
pub struct SeminarListing {
    pub seminar: Seminar,
    pub category_name: String,
}

/// Result of inserting a membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipInsertOutcome {
    Inserted,
    AlreadyJoined,
    MissingSeminar,
}

/// Row shown in the "all" and "joined" lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarSummary {
    pub id: String,
    pub topic: String,
    pub lecturer: String,
    pub category: String,
    pub starts_at: DateTime<Utc>,
    pub organizer: String,
}

/// Full seminar view with the schedule rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarDetails {
    pub id: String,
    pub topic: String,
    pub lecturer: String,
    pub details: String,
    pub schedule: String,
    pub duration_minutes: u32,
    pub category: String,
    pub organizer: String,
}

/// Data needed to render the create or edit form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeminarForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<SeminarInput>,
    pub categories: Vec<Category>,
}

/// What the delete confirmation step shows before the seminar is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    pub id: String,
    pub topic: String,
    pub schedule: String,
}
