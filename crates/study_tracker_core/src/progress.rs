//! crates/study_tracker_core/src/progress.rs
//!
//! The progress aggregator: bottom-up recomputation of the derived
//! completion counters after any structural or completion change.
//!
//! The counters are caches, not sources of truth. They are always rebuilt
//! from a full count of the live children, never incremented in place, so a
//! missed update can only cause stale values that the next recompute (or a
//! subject detail view) corrects.

use uuid::Uuid;

use crate::error::TrackerResult;
use crate::ports::{StoreError, StudyStore};

/// Recomputes a topic's subtopic counters and completion flag, persists
/// them, then propagates to the parent subject.
///
/// A topic with no subtopics is never completed. Silently a no-op when the
/// topic does not resolve; callers validate existence and ownership first.
pub async fn recompute_topic(store: &dyn StudyStore, topic_id: Uuid) -> TrackerResult<()> {
    let topic = match store.get_topic(topic_id).await {
        Ok(topic) => topic,
        Err(StoreError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let subtopics = store.list_subtopics(topic_id).await?;
    let total = subtopics.len() as i32;
    let completed = subtopics.iter().filter(|s| s.is_completed).count() as i32;
    let is_completed = total > 0 && completed == total;

    store
        .update_topic_rollup(topic_id, total, completed, is_completed)
        .await?;

    recompute_subject(store, topic.subject_id).await
}

/// Recomputes a subject's topic counters and persists them. The subject is
/// the top of the hierarchy, so nothing propagates further. Silently a
/// no-op when the subject does not resolve.
pub async fn recompute_subject(store: &dyn StudyStore, subject_id: Uuid) -> TrackerResult<()> {
    match store.get_subject(subject_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let topics = store.list_topics(subject_id).await?;
    let total = topics.len() as i32;
    let completed = topics.iter().filter(|t| t.is_completed).count() as i32;

    store
        .update_subject_rollup(subject_id, total, completed)
        .await?;
    Ok(())
}

/// Refresh safeguard for the subject detail view: rebuild every child
/// topic's rollup, then the subject's, tolerating drift from edits made
/// directly against the store.
pub async fn refresh_subject(store: &dyn StudyStore, subject_id: Uuid) -> TrackerResult<()> {
    let topics = store.list_topics(subject_id).await?;
    for topic in &topics {
        let subtopics = store.list_subtopics(topic.id).await?;
        let total = subtopics.len() as i32;
        let completed = subtopics.iter().filter(|s| s.is_completed).count() as i32;
        let is_completed = total > 0 && completed == total;
        store
            .update_topic_rollup(topic.id, total, completed, is_completed)
            .await?;
    }
    recompute_subject(store, subject_id).await
}
