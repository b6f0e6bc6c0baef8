//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the persistence contract (trait) for the application's core logic.
//! This trait forms the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database behind it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{RecentCompletion, Subject, Subtopic, Topic, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all store operations.
/// This abstracts away the specific errors of the underlying database driver.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Persistence Port (Trait)
//=========================================================================================

/// The durable key-indexed store behind the study hierarchy.
///
/// Listing order matters: `list_subjects` is priority-descending then
/// deadline-ascending (missing deadlines last), `list_topics` and
/// `list_subtopics` are creation order, and
/// `recently_completed_subtopics` is completion-date-descending.
#[async_trait]
pub trait StudyStore: Send + Sync {
    // --- Users & Auth ---
    async fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()>;

    // --- Subjects ---
    async fn insert_subject(&self, subject: &Subject) -> StoreResult<()>;

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Subject>;

    async fn list_subjects(&self, owner_id: Uuid) -> StoreResult<Vec<Subject>>;

    async fn update_subject_rollup(
        &self,
        subject_id: Uuid,
        total_topics: i32,
        completed_topics: i32,
    ) -> StoreResult<()>;

    /// Deletes the subject and every descendant topic and subtopic in one
    /// atomic transaction. Partial failure must leave all rows in place.
    async fn delete_subject_cascade(&self, subject_id: Uuid) -> StoreResult<()>;

    // --- Topics ---
    async fn insert_topic(&self, topic: &Topic) -> StoreResult<()>;

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Topic>;

    async fn list_topics(&self, subject_id: Uuid) -> StoreResult<Vec<Topic>>;

    async fn update_topic_rollup(
        &self,
        topic_id: Uuid,
        total_subtopics: i32,
        completed_subtopics: i32,
        is_completed: bool,
    ) -> StoreResult<()>;

    // --- Subtopics ---
    async fn insert_subtopic(&self, subtopic: &Subtopic) -> StoreResult<()>;

    async fn get_subtopic(&self, subtopic_id: Uuid) -> StoreResult<Subtopic>;

    async fn list_subtopics(&self, topic_id: Uuid) -> StoreResult<Vec<Subtopic>>;

    async fn set_subtopic_completion(
        &self,
        subtopic_id: Uuid,
        is_completed: bool,
        date_completed: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    // --- Reporting ---
    async fn recently_completed_subtopics(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<RecentCompletion>>;
}
