//! Field bounds shared by validation, storage checks and the create/edit forms.

pub const TOPIC_MIN_LEN: usize = 5;
pub const TOPIC_MAX_LEN: usize = 100;

pub const LECTURER_MIN_LEN: usize = 5;
pub const LECTURER_MAX_LEN: usize = 60;

pub const DETAILS_MIN_LEN: usize = 10;
pub const DETAILS_MAX_LEN: usize = 500;

pub const DURATION_MIN_MINUTES: u32 = 30;
pub const DURATION_MAX_MINUTES: u32 = 180;

pub const CATEGORY_NAME_MIN_LEN: usize = 3;
pub const CATEGORY_NAME_MAX_LEN: usize = 50;

/// `dd/MM/yyyy HH:mm`, used wherever a schedule is shown as text.
pub const DATE_TIME_FORMAT: &str = "%d/%m/%Y %H:%M";
