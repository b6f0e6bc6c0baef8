//! crates/study_tracker_core/src/hierarchy.rs
//!
//! The hierarchy manager: ownership-chain authorization plus the create,
//! delete, and toggle operations on the Subject -> Topic -> Subtopic tree.
//!
//! Every mutation takes the requesting user id explicitly; there is no
//! ambient notion of a logged-in user at this layer.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{Priority, Subject, Subtopic, Topic};
use crate::error::{TrackerError, TrackerResult};
use crate::ports::StudyStore;
use crate::progress;

//=========================================================================================
// Ownership-Chain Authorization
//=========================================================================================

/// A typed reference to any entity in the hierarchy.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef {
    Subject(Uuid),
    Topic(Uuid),
    Subtopic(Uuid),
}

/// The resolved ownership chain of an authorized entity. Callers get the
/// ancestor ids back so they do not have to re-fetch them.
#[derive(Debug, Clone, Copy)]
pub struct OwnershipChain {
    pub subject_id: Uuid,
    pub topic_id: Option<Uuid>,
    pub subtopic_id: Option<Uuid>,
}

/// Walks the ownership chain from the referenced entity up to its user and
/// checks it against the requester.
///
/// One chain walk serves all three entity types: a subtopic resolves its
/// topic, a topic resolves its subject, and the subject carries the owner.
/// `NotFound` (id does not resolve) and `AccessDenied` (resolves, wrong
/// owner) stay distinct here.
pub async fn authorize(
    store: &dyn StudyStore,
    user_id: Uuid,
    entity: EntityRef,
) -> TrackerResult<OwnershipChain> {
    let mut topic_id = None;
    let mut subtopic_id = None;

    let subject_id = match entity {
        EntityRef::Subject(id) => id,
        EntityRef::Topic(id) => {
            let topic = store.get_topic(id).await?;
            topic_id = Some(id);
            topic.subject_id
        }
        EntityRef::Subtopic(id) => {
            let subtopic = store.get_subtopic(id).await?;
            let topic = store.get_topic(subtopic.topic_id).await?;
            subtopic_id = Some(id);
            topic_id = Some(topic.id);
            topic.subject_id
        }
    };

    let subject = store.get_subject(subject_id).await?;
    if subject.owner_id != user_id {
        return Err(TrackerError::AccessDenied);
    }

    Ok(OwnershipChain {
        subject_id,
        topic_id,
        subtopic_id,
    })
}

//=========================================================================================
// Validation Helpers
//=========================================================================================

fn require_name(name: &str, what: &str) -> TrackerResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::Validation(format!("{what} name is required")));
    }
    Ok(trimmed.to_string())
}

fn parse_deadline(deadline: Option<&str>) -> TrackerResult<Option<NaiveDate>> {
    match deadline {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                TrackerError::Validation(format!("'{s}' is not a valid date (expected YYYY-MM-DD)"))
            }),
    }
}

fn parse_priority(priority: Option<&str>) -> TrackerResult<Priority> {
    match priority {
        None => Ok(Priority::Medium),
        Some(s) if s.trim().is_empty() => Ok(Priority::Medium),
        Some(s) => Priority::parse(s).ok_or_else(|| {
            TrackerError::Validation(format!("'{s}' is not a valid priority (Low/Medium/High)"))
        }),
    }
}

//=========================================================================================
// Hierarchy Operations
//=========================================================================================

/// Creates a subject for the user. The deadline, when present, must be a
/// `YYYY-MM-DD` calendar date; the priority defaults to Medium.
pub async fn create_subject(
    store: &dyn StudyStore,
    user_id: Uuid,
    name: &str,
    deadline: Option<&str>,
    priority: Option<&str>,
) -> TrackerResult<Subject> {
    let name = require_name(name, "Subject")?;
    let deadline = parse_deadline(deadline)?;
    let priority = parse_priority(priority)?;

    let subject = Subject {
        id: Uuid::new_v4(),
        owner_id: user_id,
        name,
        deadline,
        priority,
        total_topics: 0,
        completed_topics: 0,
    };
    store.insert_subject(&subject).await?;
    Ok(subject)
}

/// Creates a topic under an owned subject, then runs the rollup so the
/// subject's topic counters pick it up. A fresh topic has zero subtopics
/// and is therefore not completed.
pub async fn create_topic(
    store: &dyn StudyStore,
    user_id: Uuid,
    subject_id: Uuid,
    name: &str,
    difficulty: &str,
) -> TrackerResult<Topic> {
    let name = require_name(name, "Topic")?;
    authorize(store, user_id, EntityRef::Subject(subject_id)).await?;

    let topic = Topic {
        id: Uuid::new_v4(),
        subject_id,
        name,
        difficulty: difficulty.trim().to_string(),
        total_subtopics: 0,
        completed_subtopics: 0,
        is_completed: false,
    };
    store.insert_topic(&topic).await?;
    progress::recompute_topic(store, topic.id).await?;
    Ok(topic)
}

/// Creates a subtopic under an owned topic (ownership resolved through
/// Topic -> Subject -> User), then rolls the counters up.
pub async fn create_subtopic(
    store: &dyn StudyStore,
    user_id: Uuid,
    topic_id: Uuid,
    name: &str,
) -> TrackerResult<Subtopic> {
    let name = require_name(name, "Subtopic")?;
    authorize(store, user_id, EntityRef::Topic(topic_id)).await?;

    let subtopic = Subtopic {
        id: Uuid::new_v4(),
        topic_id,
        name,
        is_completed: false,
        date_completed: None,
    };
    store.insert_subtopic(&subtopic).await?;
    progress::recompute_topic(store, topic_id).await?;
    Ok(subtopic)
}

/// Deletes an owned subject and its whole subtree. The store performs the
/// cascade in one transaction, so a failure part-way removes nothing.
pub async fn delete_subject(
    store: &dyn StudyStore,
    user_id: Uuid,
    subject_id: Uuid,
) -> TrackerResult<()> {
    authorize(store, user_id, EntityRef::Subject(subject_id)).await?;
    store.delete_subject_cascade(subject_id).await?;
    Ok(())
}

/// Flips a subtopic between Pending and Completed, stamping or clearing
/// `date_completed`, then rolls the counters up through the parent topic
/// to the subject.
pub async fn toggle_subtopic(
    store: &dyn StudyStore,
    user_id: Uuid,
    subtopic_id: Uuid,
) -> TrackerResult<Subtopic> {
    let chain = authorize(store, user_id, EntityRef::Subtopic(subtopic_id)).await?;
    let subtopic = store.get_subtopic(subtopic_id).await?;

    let now_completed = !subtopic.is_completed;
    let date_completed = if now_completed { Some(Utc::now()) } else { None };
    store
        .set_subtopic_completion(subtopic_id, now_completed, date_completed)
        .await?;

    // chain.topic_id is always present for a subtopic reference
    if let Some(topic_id) = chain.topic_id {
        progress::recompute_topic(store, topic_id).await?;
    }

    store.get_subtopic(subtopic_id).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_accepts_iso_dates_only() {
        assert!(parse_deadline(Some("2025-12-01")).unwrap().is_some());
        assert!(parse_deadline(None).unwrap().is_none());
        assert!(parse_deadline(Some("")).unwrap().is_none());
        assert!(parse_deadline(Some("12/01/2025")).is_err());
        assert!(parse_deadline(Some("2025-13-40")).is_err());
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(parse_priority(None).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some("")).unwrap(), Priority::Medium);
        assert_eq!(parse_priority(Some("high")).unwrap(), Priority::High);
        assert!(parse_priority(Some("urgent")).is_err());
    }

    #[test]
    fn names_must_be_non_empty() {
        assert!(require_name("  ", "Subject").is_err());
        assert_eq!(require_name(" Algebra ", "Topic").unwrap(), "Algebra");
    }
}
