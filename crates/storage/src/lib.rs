use std::{borrow::Cow, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Row, SqlitePool,
};
use thiserror::Error;

use seminar_hub_core::store::{SeminarStore, StoreError};
use seminar_hub_core::types::{
    Category, MembershipInsertOutcome, Seminar, SeminarInput, SeminarListing, UserId,
};
use seminar_hub_core::validation::ValidationErrors;

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for reading and seeding categories.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for manipulating seminars.
    pub fn seminars(&self) -> SeminarRepository {
        SeminarRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for the seminar/participant join table.
    pub fn memberships(&self) -> MembershipRepository {
        MembershipRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository over the `categories` table.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Lists all categories ordered by name.
    pub async fn list(&self) -> Result<Vec<Category>, CategoryError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    pub async fn exists(&self, category_id: i64) -> Result<bool, CategoryError> {
        let row = sqlx::query("SELECT 1 FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Inserts a category after validating its name. Production categories come from the
    /// seed migration only.
    #[cfg(test)]
    pub async fn insert(&self, name: &str) -> Result<Category, CategoryError> {
        seminar_hub_core::validation::validate_category_name(name)?;
        let row = sqlx::query("INSERT INTO categories (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(Category {
            id: row.get("id"),
            name: name.to_string(),
        })
    }
}

/// Errors that can occur while reading or seeding categories.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("invalid category: {0}")]
    Invalid(#[from] ValidationErrors),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const SEMINAR_COLUMNS: &str = "s.id, s.topic, s.lecturer, s.details, s.organizer_id, \
     s.schedule_utc, s.duration_minutes, s.category_id, c.name AS category_name";

/// Repository responsible for the `seminars` table.
#[derive(Clone)]
pub struct SeminarRepository {
    pool: SqlitePool,
}

impl SeminarRepository {
    /// Lists every seminar joined with its category, ordered by schedule.
    pub async fn list(&self) -> Result<Vec<SeminarListing>, SeminarError> {
        let rows = sqlx::query_as::<_, SeminarRow>(&format!(
            "SELECT {SEMINAR_COLUMNS} \
               FROM seminars AS s \
               JOIN categories AS c ON c.id = s.category_id \
              ORDER BY s.schedule_utc ASC, s.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SeminarRow::into_domain).collect()
    }

    /// Lists the seminars a participant holds a membership for.
    pub async fn list_by_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<SeminarListing>, SeminarError> {
        let rows = sqlx::query_as::<_, SeminarRow>(&format!(
            "SELECT {SEMINAR_COLUMNS} \
               FROM seminar_participants AS sp \
               JOIN seminars AS s ON s.id = sp.seminar_id \
               JOIN categories AS c ON c.id = s.category_id \
              WHERE sp.participant_id = ? \
              ORDER BY s.schedule_utc ASC, s.id ASC"
        ))
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SeminarRow::into_domain).collect()
    }

    pub async fn find(&self, seminar_id: &str) -> Result<Option<SeminarListing>, SeminarError> {
        let row = sqlx::query_as::<_, SeminarRow>(&format!(
            "SELECT {SEMINAR_COLUMNS} \
               FROM seminars AS s \
               JOIN categories AS c ON c.id = s.category_id \
              WHERE s.id = ?"
        ))
        .bind(seminar_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SeminarRow::into_domain).transpose()
    }

    pub async fn insert(&self, seminar: &Seminar) -> Result<(), SeminarError> {
        sqlx::query(
            "INSERT INTO seminars \
             (id, topic, lecturer, details, organizer_id, schedule_utc, duration_minutes, category_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&seminar.id)
        .bind(&seminar.topic)
        .bind(&seminar.lecturer)
        .bind(&seminar.details)
        .bind(&seminar.organizer_id)
        .bind(to_rfc3339(seminar.scheduled_at))
        .bind(i64::from(seminar.duration_minutes))
        .bind(seminar.category_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrites the editable columns when the seminar belongs to `organizer_id`.
    pub async fn update(
        &self,
        seminar_id: &str,
        organizer_id: &str,
        input: &SeminarInput,
    ) -> Result<bool, SeminarError> {
        let result = sqlx::query(
            "UPDATE seminars \
                SET topic = ?, lecturer = ?, details = ?, schedule_utc = ?, \
                    duration_minutes = ?, category_id = ? \
              WHERE id = ? AND organizer_id = ?",
        )
        .bind(&input.topic)
        .bind(&input.lecturer)
        .bind(&input.details)
        .bind(to_rfc3339(input.scheduled_at))
        .bind(i64::from(input.duration_minutes))
        .bind(input.category_id)
        .bind(seminar_id)
        .bind(organizer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes the memberships and then the seminar inside one transaction.
    ///
    /// Returns the number of membership rows removed, or `None` when no seminar row was
    /// deleted, in which case nothing is committed.
    pub async fn delete_cascade(&self, seminar_id: &str) -> Result<Option<u64>, SeminarError> {
        let mut tx = self.pool.begin().await?;

        let memberships = sqlx::query("DELETE FROM seminar_participants WHERE seminar_id = ?")
            .bind(seminar_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let seminars = sqlx::query("DELETE FROM seminars WHERE id = ?")
            .bind(seminar_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if seminars == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(memberships))
    }
}

/// Seminar joined with its category name as read from SQLite.
#[derive(Debug, sqlx::FromRow)]
pub struct SeminarRow {
    pub id: String,
    pub topic: String,
    pub lecturer: String,
    pub details: String,
    pub organizer_id: String,
    pub schedule_utc: DateTime<Utc>,
    pub duration_minutes: i64,
    pub category_id: i64,
    pub category_name: String,
}

impl SeminarRow {
    /// Converts the database row into the domain listing.
    pub fn into_domain(self) -> Result<SeminarListing, SeminarError> {
        let duration_minutes = u32::try_from(self.duration_minutes).map_err(|_| {
            SeminarError::InvalidRow(format!(
                "seminar {} has duration {}",
                self.id, self.duration_minutes
            ))
        })?;

        Ok(SeminarListing {
            seminar: Seminar {
                id: self.id,
                topic: self.topic,
                lecturer: self.lecturer,
                details: self.details,
                organizer_id: self.organizer_id,
                scheduled_at: self.schedule_utc,
                duration_minutes,
                category_id: self.category_id,
            },
            category_name: self.category_name,
        })
    }
}

/// Errors that can occur while reading or mutating seminars.
#[derive(Debug, Error)]
pub enum SeminarError {
    #[error("invalid seminar row: {0}")]
    InvalidRow(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the `seminar_participants` join table.
#[derive(Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    /// Inserts the membership, relying on the composite primary key to reject duplicates.
    pub async fn insert(
        &self,
        seminar_id: &str,
        participant_id: &str,
    ) -> Result<MembershipInsertOutcome, MembershipError> {
        let result = sqlx::query(
            "INSERT INTO seminar_participants (seminar_id, participant_id) VALUES (?, ?)",
        )
        .bind(seminar_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(MembershipInsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) => {
                if let Some(code) = db_err.code() {
                    if code == Cow::Borrowed("1555") || code == Cow::Borrowed("2067") {
                        return Ok(MembershipInsertOutcome::AlreadyJoined);
                    }
                    if code == Cow::Borrowed("787") {
                        return Ok(MembershipInsertOutcome::MissingSeminar);
                    }
                }

                Err(MembershipError::Database(sqlx::Error::Database(db_err)))
            }
            Err(err) => Err(MembershipError::Database(err)),
        }
    }

    /// Removes the membership, returning `false` when none existed.
    pub async fn delete(
        &self,
        seminar_id: &str,
        participant_id: &str,
    ) -> Result<bool, MembershipError> {
        let result = sqlx::query(
            "DELETE FROM seminar_participants WHERE seminar_id = ? AND participant_id = ?",
        )
        .bind(seminar_id)
        .bind(participant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    pub async fn count_for_seminar(&self, seminar_id: &str) -> Result<u64, MembershipError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM seminar_participants WHERE seminar_id = ?")
            .bind(seminar_id)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.get("total");
        Ok(total as u64)
    }
}

/// Errors that can occur when mutating memberships.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CategoryError> for StoreError {
    fn from(err: CategoryError) -> Self {
        StoreError::new(err)
    }
}

impl From<SeminarError> for StoreError {
    fn from(err: SeminarError) -> Self {
        StoreError::new(err)
    }
}

impl From<MembershipError> for StoreError {
    fn from(err: MembershipError) -> Self {
        StoreError::new(err)
    }
}

#[async_trait]
impl SeminarStore for Database {
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.categories().list().await?)
    }

    async fn category_exists(&self, category_id: i64) -> Result<bool, StoreError> {
        Ok(self.categories().exists(category_id).await?)
    }

    async fn list_seminars(&self) -> Result<Vec<SeminarListing>, StoreError> {
        Ok(self.seminars().list().await?)
    }

    async fn list_by_participant(
        &self,
        participant: &UserId,
    ) -> Result<Vec<SeminarListing>, StoreError> {
        Ok(self.seminars().list_by_participant(participant.as_str()).await?)
    }

    async fn find_seminar(&self, seminar_id: &str) -> Result<Option<SeminarListing>, StoreError> {
        Ok(self.seminars().find(seminar_id).await?)
    }

    async fn insert_seminar(&self, seminar: &Seminar) -> Result<(), StoreError> {
        Ok(self.seminars().insert(seminar).await?)
    }

    async fn update_seminar(
        &self,
        seminar_id: &str,
        organizer: &UserId,
        input: &SeminarInput,
    ) -> Result<bool, StoreError> {
        Ok(self
            .seminars()
            .update(seminar_id, organizer.as_str(), input)
            .await?)
    }

    async fn delete_seminar(&self, seminar_id: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.seminars().delete_cascade(seminar_id).await?)
    }

    async fn add_membership(
        &self,
        seminar_id: &str,
        participant: &UserId,
    ) -> Result<MembershipInsertOutcome, StoreError> {
        Ok(self
            .memberships()
            .insert(seminar_id, participant.as_str())
            .await?)
    }

    async fn remove_membership(
        &self,
        seminar_id: &str,
        participant: &UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .memberships()
            .delete(seminar_id, participant.as_str())
            .await?)
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    fn seminar(topic: &str, organizer: &str, hour: u32) -> Seminar {
        Seminar {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            lecturer: "Grace Hopper".to_string(),
            details: "Compilers, bugs and nanoseconds.".to_string(),
            organizer_id: organizer.to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2026, 11, 2, hour, 0, 0).unwrap(),
            duration_minutes: 90,
            category_id: 1,
        }
    }

    async fn membership_rows(db: &Database) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM seminar_participants")
            .fetch_one(db.pool())
            .await
            .expect("count memberships");
        row.0
    }

    #[tokio::test]
    async fn migrations_apply_and_seed_categories() {
        let db = setup_db().await;

        let tables: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('categories', 'seminars', 'seminar_participants')")
                .fetch_one(db.pool())
                .await
                .expect("fetch tables");
        assert_eq!(tables.0, 3);

        let categories = db.categories().list().await.expect("list categories");
        assert_eq!(categories.len(), 4);
        assert_eq!(categories[0].name, "Arts & Culture");
        assert!(db.categories().exists(1).await.unwrap());
        assert!(!db.categories().exists(42).await.unwrap());
    }

    #[tokio::test]
    async fn category_insert_validates_name() {
        let db = setup_db().await;
        let err = db.categories().insert("AI").await.unwrap_err();
        assert!(matches!(err, CategoryError::Invalid(_)));

        let created = db.categories().insert("Health").await.expect("insert");
        assert!(db.categories().exists(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_schedule_and_category() {
        let db = setup_db().await;
        let record = seminar("Intro to Graphs", "user-a", 18);
        db.seminars().insert(&record).await.expect("insert");

        let listing = db
            .seminars()
            .find(&record.id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(listing.seminar, record);
        assert_eq!(listing.category_name, "Technology & Innovation");
        assert!(db.seminars().find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_by_schedule() {
        let db = setup_db().await;
        let late = seminar("Evening Session", "user-a", 20);
        let early = seminar("Morning Session", "user-b", 8);
        db.seminars().insert(&late).await.unwrap();
        db.seminars().insert(&early).await.unwrap();

        let topics: Vec<_> = db
            .seminars()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.seminar.topic)
            .collect();
        assert_eq!(topics, ["Morning Session", "Evening Session"]);
    }

    #[tokio::test]
    async fn update_is_guarded_by_organizer() {
        let db = setup_db().await;
        let record = seminar("Intro to Graphs", "user-a", 18);
        db.seminars().insert(&record).await.unwrap();

        let mut input = SeminarInput::from(&record);
        input.topic = "Graphs Revisited".to_string();

        let updated = db
            .seminars()
            .update(&record.id, "user-b", &input)
            .await
            .unwrap();
        assert!(!updated);

        let updated = db
            .seminars()
            .update(&record.id, "user-a", &input)
            .await
            .unwrap();
        assert!(updated);

        let listing = db.seminars().find(&record.id).await.unwrap().unwrap();
        assert_eq!(listing.seminar.topic, "Graphs Revisited");
        assert_eq!(listing.seminar.organizer_id, "user-a");
    }

    #[tokio::test]
    async fn membership_insert_reports_duplicates_and_missing_seminars() {
        let db = setup_db().await;
        let record = seminar("Intro to Graphs", "user-a", 18);
        db.seminars().insert(&record).await.unwrap();
        let repo = db.memberships();

        let outcome = repo.insert(&record.id, "user-b").await.expect("insert");
        assert_eq!(outcome, MembershipInsertOutcome::Inserted);

        let outcome = repo.insert(&record.id, "user-b").await.expect("duplicate");
        assert_eq!(outcome, MembershipInsertOutcome::AlreadyJoined);
        assert_eq!(repo.count_for_seminar(&record.id).await.unwrap(), 1);

        let outcome = repo.insert("missing", "user-b").await.expect("missing");
        assert_eq!(outcome, MembershipInsertOutcome::MissingSeminar);
    }

    #[tokio::test]
    async fn membership_delete_touches_only_the_pair() {
        let db = setup_db().await;
        let record = seminar("Intro to Graphs", "user-a", 18);
        db.seminars().insert(&record).await.unwrap();
        let repo = db.memberships();
        repo.insert(&record.id, "user-a").await.unwrap();
        repo.insert(&record.id, "user-b").await.unwrap();

        assert!(repo.delete(&record.id, "user-b").await.unwrap());
        assert!(!repo.delete(&record.id, "user-b").await.unwrap());
        assert_eq!(membership_rows(&db).await, 1);

        let joined = db.seminars().list_by_participant("user-a").await.unwrap();
        assert_eq!(joined.len(), 1);
        assert!(db
            .seminars()
            .list_by_participant("user-b")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delete_cascade_removes_memberships_and_seminar() {
        let db = setup_db().await;
        let doomed = seminar("Intro to Graphs", "user-a", 18);
        let kept = seminar("Other Seminar", "user-a", 19);
        db.seminars().insert(&doomed).await.unwrap();
        db.seminars().insert(&kept).await.unwrap();
        db.memberships().insert(&doomed.id, "user-b").await.unwrap();
        db.memberships().insert(&doomed.id, "user-c").await.unwrap();
        db.memberships().insert(&kept.id, "user-b").await.unwrap();

        let removed = db.seminars().delete_cascade(&doomed.id).await.expect("delete");
        assert_eq!(removed, Some(2));
        assert!(db.seminars().find(&doomed.id).await.unwrap().is_none());
        assert_eq!(membership_rows(&db).await, 1);
        assert!(db.seminars().find(&kept.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_cascade_of_a_vanished_seminar_reports_nothing_removed() {
        let db = setup_db().await;
        let record = seminar("Intro to Graphs", "user-a", 18);
        db.seminars().insert(&record).await.unwrap();
        db.memberships().insert(&record.id, "user-b").await.unwrap();

        assert_eq!(db.seminars().delete_cascade(&record.id).await.unwrap(), Some(1));
        assert_eq!(db.seminars().delete_cascade(&record.id).await.unwrap(), None);
        assert_eq!(db.seminars().delete_cascade("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_cascade_rolls_back_when_seminar_removal_fails() {
        let db = setup_db().await;
        let record = seminar("Locked Seminar", "user-a", 18);
        db.seminars().insert(&record).await.unwrap();
        db.memberships().insert(&record.id, "user-b").await.unwrap();

        sqlx::query(
            "CREATE TRIGGER block_locked_delete BEFORE DELETE ON seminars \
             WHEN old.topic = 'Locked Seminar' \
             BEGIN SELECT RAISE(ABORT, 'seminar is locked'); END;",
        )
        .execute(db.pool())
        .await
        .expect("create trigger");

        let err = db.seminars().delete_cascade(&record.id).await;
        assert!(matches!(err, Err(SeminarError::Database(_))));
        assert!(db.seminars().find(&record.id).await.unwrap().is_some());
        assert_eq!(membership_rows(&db).await, 1);
    }

    #[tokio::test]
    async fn data_survives_reconnect_to_file_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("seminars.db").display()
        );

        let record = seminar("Intro to Graphs", "user-a", 18);
        {
            let db = Database::connect(&url).await.expect("connect");
            db.run_migrations().await.expect("migrations");
            db.seminars().insert(&record).await.unwrap();
            db.pool().close().await;
        }

        let db = Database::connect(&url).await.expect("reconnect");
        db.run_migrations().await.expect("migrations are idempotent");
        let listing = db.seminars().find(&record.id).await.unwrap();
        assert_eq!(listing.map(|l| l.seminar), Some(record));
    }

    #[tokio::test]
    async fn store_trait_delegates_to_repositories() {
        let db = setup_db().await;
        let store: &dyn SeminarStore = &db;
        let record = seminar("Intro to Graphs", "user-a", 18);
        store.insert_seminar(&record).await.unwrap();

        let participant = UserId::from("user-b");
        let outcome = store.add_membership(&record.id, &participant).await.unwrap();
        assert_eq!(outcome, MembershipInsertOutcome::Inserted);
        assert_eq!(store.list_by_participant(&participant).await.unwrap().len(), 1);
        assert!(store.remove_membership(&record.id, &participant).await.unwrap());
        assert_eq!(store.delete_seminar(&record.id).await.unwrap(), Some(0));
        assert!(store.list_seminars().await.unwrap().is_empty());
    }
}
