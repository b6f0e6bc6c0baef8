//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format,
//! except for serde derives on the types that travel to the view layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a registered account. Owns zero or more subjects.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub first_name: String,
    pub email: String,
    pub hashed_password: String,
}

/// Subject priority, stored as text in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Parses the user-facing priority string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }

    /// Sort rank for priority-descending listings.
    pub fn rank(&self) -> i32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

/// Top level of the study hierarchy. The topic counters are derived
/// caches maintained by the progress rollup, never edited directly.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub deadline: Option<NaiveDate>,
    pub priority: Priority,
    pub total_topics: i32,
    pub completed_topics: i32,
}

/// Middle level of the hierarchy. `is_completed` is derived: true only
/// when the topic has at least one subtopic and all are completed.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub difficulty: String,
    pub total_subtopics: i32,
    pub completed_subtopics: i32,
    pub is_completed: bool,
}

/// Leaf of the hierarchy. `date_completed` is set exactly when
/// `is_completed` flips to true and cleared when it flips back.
#[derive(Debug, Clone)]
pub struct Subtopic {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub name: String,
    pub is_completed: bool,
    pub date_completed: Option<DateTime<Utc>>,
}

/// A completed subtopic joined with its ancestors' names, as returned
/// by the recent-activity query for the reports view.
#[derive(Debug, Clone)]
pub struct RecentCompletion {
    pub subtopic_id: Uuid,
    pub name: String,
    pub topic_name: String,
    pub subject_name: String,
    pub date_completed: DateTime<Utc>,
}
