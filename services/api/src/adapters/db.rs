//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StudyStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use study_tracker_core::domain::{
    Priority, RecentCompletion, Subject, Subtopic, Topic, User, UserCredentials,
};
use study_tracker_core::ports::{StoreError, StoreResult, StudyStore};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StudyStore` port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn map_db_err(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound(what.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{what} already exists"))
        }
        _ => StoreError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    first_name: String,
    email: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            first_name: self.first_name,
            email: self.email,
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct SubjectRecord {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    deadline: Option<NaiveDate>,
    priority: String,
    total_topics: i32,
    completed_topics: i32,
}
impl SubjectRecord {
    fn to_domain(self) -> Subject {
        Subject {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            deadline: self.deadline,
            priority: Priority::parse(&self.priority).unwrap_or(Priority::Medium),
            total_topics: self.total_topics,
            completed_topics: self.completed_topics,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    subject_id: Uuid,
    name: String,
    difficulty: String,
    total_subtopics: i32,
    completed_subtopics: i32,
    is_completed: bool,
}
impl TopicRecord {
    fn to_domain(self) -> Topic {
        Topic {
            id: self.id,
            subject_id: self.subject_id,
            name: self.name,
            difficulty: self.difficulty,
            total_subtopics: self.total_subtopics,
            completed_subtopics: self.completed_subtopics,
            is_completed: self.is_completed,
        }
    }
}

#[derive(FromRow)]
struct SubtopicRecord {
    id: Uuid,
    topic_id: Uuid,
    name: String,
    is_completed: bool,
    date_completed: Option<DateTime<Utc>>,
}
impl SubtopicRecord {
    fn to_domain(self) -> Subtopic {
        Subtopic {
            id: self.id,
            topic_id: self.topic_id,
            name: self.name,
            is_completed: self.is_completed,
            date_completed: self.date_completed,
        }
    }
}

#[derive(FromRow)]
struct RecentCompletionRecord {
    id: Uuid,
    name: String,
    topic_name: String,
    subject_name: String,
    date_completed: DateTime<Utc>,
}
impl RecentCompletionRecord {
    fn to_domain(self) -> RecentCompletion {
        RecentCompletion {
            subtopic_id: self.id,
            name: self.name,
            topic_name: self.topic_name,
            subject_name: self.subject_name,
            date_completed: self.date_completed,
        }
    }
}

//=========================================================================================
// `StudyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyStore for PgStore {
    async fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, first_name, last_name, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id, first_name, last_name, email",
        )
        .bind(Uuid::new_v4())
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("User {email}")))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, first_name, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("User {email}")))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, "Auth session"))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid> {
        let (user_id,): (Uuid,) = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Auth session"))?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, "Auth session"))?;
        Ok(())
    }

    async fn insert_subject(&self, subject: &Subject) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO subjects (id, owner_id, name, deadline, priority, total_topics, completed_topics) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(subject.id)
        .bind(subject.owner_id)
        .bind(&subject.name)
        .bind(subject.deadline)
        .bind(subject.priority.as_str())
        .bind(subject.total_topics)
        .bind(subject.completed_topics)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Subject"))?;
        Ok(())
    }

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Subject> {
        let record = sqlx::query_as::<_, SubjectRecord>(
            "SELECT id, owner_id, name, deadline, priority, total_topics, completed_topics \
             FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("Subject {subject_id}")))?;
        Ok(record.to_domain())
    }

    async fn list_subjects(&self, owner_id: Uuid) -> StoreResult<Vec<Subject>> {
        let records = sqlx::query_as::<_, SubjectRecord>(
            "SELECT id, owner_id, name, deadline, priority, total_topics, completed_topics \
             FROM subjects WHERE owner_id = $1 \
             ORDER BY CASE priority WHEN 'High' THEN 3 WHEN 'Medium' THEN 2 ELSE 1 END DESC, \
                      deadline ASC NULLS LAST, created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Subjects"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_subject_rollup(
        &self,
        subject_id: Uuid,
        total_topics: i32,
        completed_topics: i32,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE subjects SET total_topics = $1, completed_topics = $2 WHERE id = $3")
            .bind(total_topics)
            .bind(completed_topics)
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, &format!("Subject {subject_id}")))?;
        Ok(())
    }

    async fn delete_subject_cascade(&self, subject_id: Uuid) -> StoreResult<()> {
        // One transaction for the whole subtree: a failure anywhere rolls
        // the entire delete back when `tx` is dropped uncommitted.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        sqlx::query(
            "DELETE FROM subtopics WHERE topic_id IN (SELECT id FROM topics WHERE subject_id = $1)",
        )
        .bind(subject_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_err(e, "Subtopics"))?;

        sqlx::query("DELETE FROM topics WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err(e, "Topics"))?;

        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(subject_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_err(e, "Subject"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Subject {subject_id}")));
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn insert_topic(&self, topic: &Topic) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO topics (id, subject_id, name, difficulty, total_subtopics, completed_subtopics, is_completed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(topic.id)
        .bind(topic.subject_id)
        .bind(&topic.name)
        .bind(&topic.difficulty)
        .bind(topic.total_subtopics)
        .bind(topic.completed_subtopics)
        .bind(topic.is_completed)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Topic"))?;
        Ok(())
    }

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Topic> {
        let record = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, subject_id, name, difficulty, total_subtopics, completed_subtopics, is_completed \
             FROM topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("Topic {topic_id}")))?;
        Ok(record.to_domain())
    }

    async fn list_topics(&self, subject_id: Uuid) -> StoreResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, subject_id, name, difficulty, total_subtopics, completed_subtopics, is_completed \
             FROM topics WHERE subject_id = $1 ORDER BY created_at ASC",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Topics"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_topic_rollup(
        &self,
        topic_id: Uuid,
        total_subtopics: i32,
        completed_subtopics: i32,
        is_completed: bool,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE topics SET total_subtopics = $1, completed_subtopics = $2, is_completed = $3 \
             WHERE id = $4",
        )
        .bind(total_subtopics)
        .bind(completed_subtopics)
        .bind(is_completed)
        .bind(topic_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("Topic {topic_id}")))?;
        Ok(())
    }

    async fn insert_subtopic(&self, subtopic: &Subtopic) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO subtopics (id, topic_id, name, is_completed, date_completed) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(subtopic.id)
        .bind(subtopic.topic_id)
        .bind(&subtopic.name)
        .bind(subtopic.is_completed)
        .bind(subtopic.date_completed)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Subtopic"))?;
        Ok(())
    }

    async fn get_subtopic(&self, subtopic_id: Uuid) -> StoreResult<Subtopic> {
        let record = sqlx::query_as::<_, SubtopicRecord>(
            "SELECT id, topic_id, name, is_completed, date_completed \
             FROM subtopics WHERE id = $1",
        )
        .bind(subtopic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_err(e, &format!("Subtopic {subtopic_id}")))?;
        Ok(record.to_domain())
    }

    async fn list_subtopics(&self, topic_id: Uuid) -> StoreResult<Vec<Subtopic>> {
        let records = sqlx::query_as::<_, SubtopicRecord>(
            "SELECT id, topic_id, name, is_completed, date_completed \
             FROM subtopics WHERE topic_id = $1 ORDER BY created_at ASC",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Subtopics"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_subtopic_completion(
        &self,
        subtopic_id: Uuid,
        is_completed: bool,
        date_completed: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE subtopics SET is_completed = $1, date_completed = $2 WHERE id = $3")
            .bind(is_completed)
            .bind(date_completed)
            .bind(subtopic_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err(e, &format!("Subtopic {subtopic_id}")))?;
        Ok(())
    }

    async fn recently_completed_subtopics(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<RecentCompletion>> {
        let records = sqlx::query_as::<_, RecentCompletionRecord>(
            "SELECT st.id, st.name, t.name AS topic_name, s.name AS subject_name, st.date_completed \
             FROM subtopics st \
             JOIN topics t ON st.topic_id = t.id \
             JOIN subjects s ON t.subject_id = s.id \
             WHERE s.owner_id = $1 AND st.date_completed IS NOT NULL \
             ORDER BY st.date_completed DESC LIMIT $2",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_err(e, "Recent completions"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
