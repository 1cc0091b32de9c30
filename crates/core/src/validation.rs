use std::fmt;

use serde::Serialize;

use crate::constants::{
    CATEGORY_NAME_MAX_LEN, CATEGORY_NAME_MIN_LEN, DETAILS_MAX_LEN, DETAILS_MIN_LEN,
    DURATION_MAX_MINUTES, DURATION_MIN_MINUTES, LECTURER_MAX_LEN, LECTURER_MIN_LEN,
    TOPIC_MAX_LEN, TOPIC_MIN_LEN,
};
use crate::types::{SeminarDraft, SeminarInput};

/// A single rejected field together with a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Non-empty collection of field errors returned by the validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` when `field` is among the rejected fields.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|err| err.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|err| err.field).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn text(&mut self, field: &'static str, value: &str, min: usize, max: usize) {
        if value.trim().is_empty() {
            self.push(field, format!("{field} is required"));
            return;
        }
        let len = value.chars().count();
        if len < min || len > max {
            self.push(
                field,
                format!("{field} must be between {min} and {max} characters (got {len})"),
            );
        }
    }

    fn range(&mut self, field: &'static str, value: i64, min: u32, max: u32) {
        if value < i64::from(min) || value > i64::from(max) {
            self.push(field, format!("{field} must be between {min} and {max}"));
        }
    }

    fn present<T>(&mut self, field: &'static str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, format!("{field} is required"));
        }
        value
    }

    fn push(&mut self, field: &'static str, message: String) {
        self.0.push(FieldError { field, message });
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

/// Checks every bound on the editable seminar fields, reporting all failures at once.
pub fn validate_seminar(input: &SeminarInput) -> Result<(), ValidationErrors> {
    parse_seminar_draft(SeminarDraft::from(input.clone())).map(|_| ())
}

/// Turns a submitted draft into [`SeminarInput`], reporting absent and out-of-range
/// fields together with the usual bounds.
pub fn parse_seminar_draft(draft: SeminarDraft) -> Result<SeminarInput, ValidationErrors> {
    let mut collector = Collector::default();
    let topic = draft.topic.unwrap_or_default();
    let lecturer = draft.lecturer.unwrap_or_default();
    let details = draft.details.unwrap_or_default();
    collector.text("topic", &topic, TOPIC_MIN_LEN, TOPIC_MAX_LEN);
    collector.text("lecturer", &lecturer, LECTURER_MIN_LEN, LECTURER_MAX_LEN);
    collector.text("details", &details, DETAILS_MIN_LEN, DETAILS_MAX_LEN);
    let scheduled_at = collector.present("scheduled_at", draft.scheduled_at);
    let duration_minutes = collector
        .present("duration_minutes", draft.duration_minutes)
        .and_then(|minutes| {
            collector.range(
                "duration_minutes",
                minutes,
                DURATION_MIN_MINUTES,
                DURATION_MAX_MINUTES,
            );
            u32::try_from(minutes).ok()
        });
    let category_id = collector.present("category_id", draft.category_id);

    // Every `None` below has already been recorded as a field error.
    match (scheduled_at, duration_minutes, category_id) {
        (Some(scheduled_at), Some(duration_minutes), Some(category_id))
            if collector.0.is_empty() =>
        {
            Ok(SeminarInput {
                topic,
                lecturer,
                details,
                scheduled_at,
                duration_minutes,
                category_id,
            })
        }
        _ => Err(ValidationErrors(collector.0)),
    }
}

pub fn validate_category_name(name: &str) -> Result<(), ValidationErrors> {
    let mut collector = Collector::default();
    collector.text("name", name, CATEGORY_NAME_MIN_LEN, CATEGORY_NAME_MAX_LEN);
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn input() -> SeminarInput {
        SeminarInput {
            topic: "Intro to Graphs".to_string(),
            lecturer: "Ada Lovelace".to_string(),
            details: "Vertices, edges and what lies between.".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2026, 11, 2, 18, 30, 0).unwrap(),
            duration_minutes: 60,
            category_id: 1,
        }
    }

    #[test]
    fn accepts_valid_input() {
        assert!(validate_seminar(&input()).is_ok());
    }

    #[test]
    fn topic_length_boundary() {
        let mut short = input();
        short.topic = "Grph".to_string();
        let err = validate_seminar(&short).expect_err("4 chars is too short");
        assert!(err.has_field("topic"));

        let mut exact = input();
        exact.topic = "Graph".to_string();
        assert!(validate_seminar(&exact).is_ok());
    }

    #[test]
    fn duration_is_inclusive_on_both_ends() {
        for minutes in [29, 181] {
            let mut value = input();
            value.duration_minutes = minutes;
            let err = validate_seminar(&value).expect_err("out of range");
            assert_eq!(err.errors().len(), 1);
            assert_eq!(err.errors()[0].field, "duration_minutes");
        }
        for minutes in [30, 180] {
            let mut value = input();
            value.duration_minutes = minutes;
            assert!(validate_seminar(&value).is_ok(), "{minutes} should be accepted");
        }
    }

    #[test]
    fn reports_every_failing_field_in_order() {
        let mut value = input();
        value.topic = "   ".to_string();
        value.lecturer = "x".repeat(61);
        value.details = "too short".to_string();
        value.duration_minutes = 0;

        let err = validate_seminar(&value).expect_err("all fields invalid");
        let fields: Vec<_> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["topic", "lecturer", "details", "duration_minutes"]);
        assert_eq!(err.errors()[0].message, "topic is required");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let mut value = input();
        value.topic = "Ünïcø".to_string();
        assert!(validate_seminar(&value).is_ok());
    }

    fn draft() -> SeminarDraft {
        let value = input();
        SeminarDraft {
            topic: Some(value.topic),
            lecturer: Some(value.lecturer),
            details: Some(value.details),
            scheduled_at: Some(value.scheduled_at),
            duration_minutes: Some(60),
            category_id: Some(1),
        }
    }

    #[test]
    fn complete_draft_becomes_input() {
        assert_eq!(parse_seminar_draft(draft()).expect("valid draft"), input());
    }

    #[test]
    fn draft_reports_absent_and_negative_fields() {
        let mut value = draft();
        value.topic = None;
        value.duration_minutes = Some(-5);
        value.category_id = None;

        let err = parse_seminar_draft(value).expect_err("invalid draft");
        let fields: Vec<_> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, ["topic", "duration_minutes", "category_id"]);
        assert_eq!(err.errors()[0].message, "topic is required");
        assert_eq!(err.errors()[1].message, "duration_minutes must be between 30 and 180");
    }

    #[test]
    fn empty_draft_names_every_field() {
        let err = parse_seminar_draft(SeminarDraft::default()).expect_err("empty draft");
        let fields: Vec<_> = err.errors().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            ["topic", "lecturer", "details", "scheduled_at", "duration_minutes", "category_id"]
        );
    }

    #[test]
    fn category_name_bounds() {
        assert!(validate_category_name("AI").is_err());
        assert!(validate_category_name("Art").is_ok());
        assert!(validate_category_name(&"c".repeat(51)).is_err());
    }
}
