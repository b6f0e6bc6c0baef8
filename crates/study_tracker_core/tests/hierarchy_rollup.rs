//! Integration tests for the hierarchy operations and the progress rollup,
//! run against an in-memory implementation of the `StudyStore` port.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use study_tracker_core::domain::{
    RecentCompletion, Subject, Subtopic, Topic, User, UserCredentials,
};
use study_tracker_core::hierarchy::{self, EntityRef};
use study_tracker_core::ports::{StoreError, StoreResult, StudyStore};
use study_tracker_core::reports::{self, NextTopic};
use study_tracker_core::{progress, TrackerError};

//=========================================================================================
// In-Memory Store
//=========================================================================================

struct StoredUser {
    user: User,
    hashed_password: String,
}

struct StoredSession {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: Vec<StoredUser>,
    sessions: Vec<StoredSession>,
    subjects: Vec<Subject>,
    topics: Vec<Topic>,
    subtopics: Vec<Subtopic>,
}

/// A `StudyStore` backed by vectors, preserving insertion order so the
/// "creation order" listing contract holds. `fail_cascade` simulates a
/// mid-transaction persistence failure: the call errors and nothing is
/// removed, which is exactly what a rolled-back transaction looks like.
#[derive(Default)]
struct MemStore {
    inner: Mutex<Inner>,
    fail_cascade: AtomicBool,
}

#[async_trait]
impl StudyStore for MemStore {
    async fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        hashed_password: &str,
    ) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.user.email == email) {
            return Err(StoreError::Conflict(format!(
                "email {email} already registered"
            )));
        }
        let user = User {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        };
        inner.users.push(StoredUser {
            user: user.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<UserCredentials> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .iter()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                user_id: u.user.id,
                first_name: u.user.first_name.clone(),
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.lock().unwrap().sessions.push(StoredSession {
            id: session_id.to_string(),
            user_id,
            expires_at,
        });
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> StoreResult<Uuid> {
        let inner = self.inner.lock().unwrap();
        inner
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.expires_at > Utc::now())
            .map(|s| s.user_id)
            .ok_or_else(|| StoreError::NotFound("session".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .retain(|s| s.id != session_id);
        Ok(())
    }

    async fn insert_subject(&self, subject: &Subject) -> StoreResult<()> {
        self.inner.lock().unwrap().subjects.push(subject.clone());
        Ok(())
    }

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Subject> {
        let inner = self.inner.lock().unwrap();
        inner
            .subjects
            .iter()
            .find(|s| s.id == subject_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("subject {subject_id}")))
    }

    async fn list_subjects(&self, owner_id: Uuid) -> StoreResult<Vec<Subject>> {
        let inner = self.inner.lock().unwrap();
        let mut subjects: Vec<Subject> = inner
            .subjects
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        // priority desc, then deadline asc with missing deadlines last
        subjects.sort_by_key(|s| (Reverse(s.priority.rank()), s.deadline.is_none(), s.deadline));
        Ok(subjects)
    }

    async fn update_subject_rollup(
        &self,
        subject_id: Uuid,
        total_topics: i32,
        completed_topics: i32,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let subject = inner
            .subjects
            .iter_mut()
            .find(|s| s.id == subject_id)
            .ok_or_else(|| StoreError::NotFound(format!("subject {subject_id}")))?;
        subject.total_topics = total_topics;
        subject.completed_topics = completed_topics;
        Ok(())
    }

    async fn delete_subject_cascade(&self, subject_id: Uuid) -> StoreResult<()> {
        if self.fail_cascade.load(Ordering::SeqCst) {
            return Err(StoreError::Unexpected(
                "injected cascade failure".to_string(),
            ));
        }
        let mut inner = self.inner.lock().unwrap();
        let topic_ids: Vec<Uuid> = inner
            .topics
            .iter()
            .filter(|t| t.subject_id == subject_id)
            .map(|t| t.id)
            .collect();
        inner.subtopics.retain(|s| !topic_ids.contains(&s.topic_id));
        inner.topics.retain(|t| t.subject_id != subject_id);
        inner.subjects.retain(|s| s.id != subject_id);
        Ok(())
    }

    async fn insert_topic(&self, topic: &Topic) -> StoreResult<()> {
        self.inner.lock().unwrap().topics.push(topic.clone());
        Ok(())
    }

    async fn get_topic(&self, topic_id: Uuid) -> StoreResult<Topic> {
        let inner = self.inner.lock().unwrap();
        inner
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("topic {topic_id}")))
    }

    async fn list_topics(&self, subject_id: Uuid) -> StoreResult<Vec<Topic>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .topics
            .iter()
            .filter(|t| t.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn update_topic_rollup(
        &self,
        topic_id: Uuid,
        total_subtopics: i32,
        completed_subtopics: i32,
        is_completed: bool,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let topic = inner
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| StoreError::NotFound(format!("topic {topic_id}")))?;
        topic.total_subtopics = total_subtopics;
        topic.completed_subtopics = completed_subtopics;
        topic.is_completed = is_completed;
        Ok(())
    }

    async fn insert_subtopic(&self, subtopic: &Subtopic) -> StoreResult<()> {
        self.inner.lock().unwrap().subtopics.push(subtopic.clone());
        Ok(())
    }

    async fn get_subtopic(&self, subtopic_id: Uuid) -> StoreResult<Subtopic> {
        let inner = self.inner.lock().unwrap();
        inner
            .subtopics
            .iter()
            .find(|s| s.id == subtopic_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("subtopic {subtopic_id}")))
    }

    async fn list_subtopics(&self, topic_id: Uuid) -> StoreResult<Vec<Subtopic>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .subtopics
            .iter()
            .filter(|s| s.topic_id == topic_id)
            .cloned()
            .collect())
    }

    async fn set_subtopic_completion(
        &self,
        subtopic_id: Uuid,
        is_completed: bool,
        date_completed: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let subtopic = inner
            .subtopics
            .iter_mut()
            .find(|s| s.id == subtopic_id)
            .ok_or_else(|| StoreError::NotFound(format!("subtopic {subtopic_id}")))?;
        subtopic.is_completed = is_completed;
        subtopic.date_completed = date_completed;
        Ok(())
    }

    async fn recently_completed_subtopics(
        &self,
        owner_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<RecentCompletion>> {
        let inner = self.inner.lock().unwrap();
        let mut completions: Vec<RecentCompletion> = inner
            .subtopics
            .iter()
            .filter_map(|s| {
                let date = s.date_completed?;
                let topic = inner.topics.iter().find(|t| t.id == s.topic_id)?;
                let subject = inner
                    .subjects
                    .iter()
                    .find(|subj| subj.id == topic.subject_id && subj.owner_id == owner_id)?;
                Some(RecentCompletion {
                    subtopic_id: s.id,
                    name: s.name.clone(),
                    topic_name: topic.name.clone(),
                    subject_name: subject.name.clone(),
                    date_completed: date,
                })
            })
            .collect();
        completions.sort_by_key(|c| Reverse(c.date_completed));
        completions.truncate(limit as usize);
        Ok(completions)
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn signup(store: &MemStore, email: &str) -> Uuid {
    store
        .create_user("Test", "User", email, "hash")
        .await
        .unwrap()
        .id
}

fn counts(store: &MemStore) -> (usize, usize, usize) {
    let inner = store.inner.lock().unwrap();
    (
        inner.subjects.len(),
        inner.topics.len(),
        inner.subtopics.len(),
    )
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn recompute_topic_is_idempotent() {
    let store = MemStore::default();
    let user = signup(&store, "a@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Math", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Algebra", "Hard")
        .await
        .unwrap();
    let sub = hierarchy::create_subtopic(&store, user, topic.id, "Linear Eqns")
        .await
        .unwrap();
    hierarchy::create_subtopic(&store, user, topic.id, "Quadratics")
        .await
        .unwrap();
    hierarchy::toggle_subtopic(&store, user, sub.id).await.unwrap();

    progress::recompute_topic(&store, topic.id).await.unwrap();
    let first = store.get_topic(topic.id).await.unwrap();
    progress::recompute_topic(&store, topic.id).await.unwrap();
    let second = store.get_topic(topic.id).await.unwrap();

    assert_eq!(first.total_subtopics, second.total_subtopics);
    assert_eq!(first.completed_subtopics, second.completed_subtopics);
    assert_eq!(first.is_completed, second.is_completed);
    assert_eq!(first.total_subtopics, 2);
    assert_eq!(first.completed_subtopics, 1);
    assert!(!first.is_completed);
}

#[tokio::test]
async fn recompute_missing_ids_is_a_no_op() {
    let store = MemStore::default();
    progress::recompute_topic(&store, Uuid::new_v4()).await.unwrap();
    progress::recompute_subject(&store, Uuid::new_v4())
        .await
        .unwrap();
}

#[tokio::test]
async fn subject_counts_match_live_topics() {
    let store = MemStore::default();
    let user = signup(&store, "b@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Physics", None, None)
        .await
        .unwrap();
    for name in ["Mechanics", "Optics", "Waves"] {
        let topic = hierarchy::create_topic(&store, user, subject.id, name, "Medium")
            .await
            .unwrap();
        let sub = hierarchy::create_subtopic(&store, user, topic.id, "Intro")
            .await
            .unwrap();
        if name != "Waves" {
            hierarchy::toggle_subtopic(&store, user, sub.id).await.unwrap();
        }
    }

    let subject = store.get_subject(subject.id).await.unwrap();
    assert_eq!(subject.total_topics, 3);
    assert_eq!(subject.completed_topics, 2);
    assert!(subject.completed_topics <= subject.total_topics);
}

#[tokio::test]
async fn new_topic_with_no_subtopics_is_not_completed() {
    let store = MemStore::default();
    let user = signup(&store, "c@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Chemistry", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Stoichiometry", "Easy")
        .await
        .unwrap();

    let topic = store.get_topic(topic.id).await.unwrap();
    assert_eq!(topic.total_subtopics, 0);
    assert_eq!(topic.completed_subtopics, 0);
    assert!(!topic.is_completed);

    let subject = store.get_subject(subject.id).await.unwrap();
    assert_eq!(subject.total_topics, 1);
    assert_eq!(subject.completed_topics, 0);
}

#[tokio::test]
async fn toggle_stamps_and_clears_completion_date() {
    let store = MemStore::default();
    let user = signup(&store, "d@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "History", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "WW2", "Medium")
        .await
        .unwrap();
    let sub = hierarchy::create_subtopic(&store, user, topic.id, "Pacific Theatre")
        .await
        .unwrap();
    assert!(!sub.is_completed);
    assert!(sub.date_completed.is_none());

    let completed = hierarchy::toggle_subtopic(&store, user, sub.id).await.unwrap();
    assert!(completed.is_completed);
    assert!(completed.date_completed.is_some());

    let pending = hierarchy::toggle_subtopic(&store, user, sub.id).await.unwrap();
    assert!(!pending.is_completed);
    assert!(pending.date_completed.is_none());
}

#[tokio::test]
async fn cascade_delete_removes_whole_subtree() {
    let store = MemStore::default();
    let user = signup(&store, "e@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Biology", None, None)
        .await
        .unwrap();
    for t in 0..2 {
        let topic = hierarchy::create_topic(&store, user, subject.id, &format!("T{t}"), "Easy")
            .await
            .unwrap();
        for s in 0..3 {
            hierarchy::create_subtopic(&store, user, topic.id, &format!("S{s}"))
                .await
                .unwrap();
        }
    }
    assert_eq!(counts(&store), (1, 2, 6));

    hierarchy::delete_subject(&store, user, subject.id).await.unwrap();
    assert_eq!(counts(&store), (0, 0, 0));
}

#[tokio::test]
async fn failed_cascade_removes_nothing() {
    let store = MemStore::default();
    let user = signup(&store, "f@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Geology", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Rocks", "Easy")
        .await
        .unwrap();
    hierarchy::create_subtopic(&store, user, topic.id, "Igneous")
        .await
        .unwrap();
    let before = counts(&store);

    store.fail_cascade.store(true, Ordering::SeqCst);
    let err = hierarchy::delete_subject(&store, user, subject.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Persistence(_)));
    assert_eq!(counts(&store), before);
}

#[tokio::test]
async fn foreign_subtopic_toggle_is_denied_without_mutation() {
    let store = MemStore::default();
    let owner = signup(&store, "owner@example.com").await;
    let intruder = signup(&store, "intruder@example.com").await;
    let subject = hierarchy::create_subject(&store, owner, "Law", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, owner, subject.id, "Contracts", "Hard")
        .await
        .unwrap();
    let sub = hierarchy::create_subtopic(&store, owner, topic.id, "Offer & Acceptance")
        .await
        .unwrap();

    let err = hierarchy::toggle_subtopic(&store, intruder, sub.id)
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::AccessDenied));

    let sub = store.get_subtopic(sub.id).await.unwrap();
    assert!(!sub.is_completed);
    assert!(sub.date_completed.is_none());
}

#[tokio::test]
async fn authorize_distinguishes_missing_from_foreign() {
    let store = MemStore::default();
    let owner = signup(&store, "own2@example.com").await;
    let other = signup(&store, "oth2@example.com").await;
    let subject = hierarchy::create_subject(&store, owner, "Art", None, None)
        .await
        .unwrap();

    let missing = hierarchy::authorize(&store, owner, EntityRef::Subject(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(missing, TrackerError::NotFound));

    let foreign = hierarchy::authorize(&store, other, EntityRef::Subject(subject.id))
        .await
        .unwrap_err();
    assert!(matches!(foreign, TrackerError::AccessDenied));
}

#[tokio::test]
async fn invalid_deadline_creates_nothing() {
    let store = MemStore::default();
    let user = signup(&store, "g@example.com").await;
    let err = hierarchy::create_subject(&store, user, "Music", Some("next tuesday"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));
    assert_eq!(counts(&store).0, 0);
}

#[tokio::test]
async fn math_algebra_scenario_rolls_up_to_the_dashboard() {
    let store = MemStore::default();
    let user = signup(&store, "math@example.com").await;
    let subject =
        hierarchy::create_subject(&store, user, "Math", Some("2025-12-01"), Some("High"))
            .await
            .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Algebra", "Medium")
        .await
        .unwrap();
    let linear = hierarchy::create_subtopic(&store, user, topic.id, "Linear Eqns")
        .await
        .unwrap();
    let quadratics = hierarchy::create_subtopic(&store, user, topic.id, "Quadratics")
        .await
        .unwrap();
    hierarchy::toggle_subtopic(&store, user, linear.id).await.unwrap();

    let t = store.get_topic(topic.id).await.unwrap();
    assert_eq!(t.total_subtopics, 2);
    assert_eq!(t.completed_subtopics, 1);
    assert!(!t.is_completed);
    let s = store.get_subject(subject.id).await.unwrap();
    assert_eq!(s.total_topics, 1);
    assert_eq!(s.completed_topics, 0);

    let dash = reports::dashboard(&store, user).await.unwrap();
    assert_eq!(dash.completion_percentage, 0);
    assert!(matches!(dash.next_topic, NextTopic::Topic { .. }));

    hierarchy::toggle_subtopic(&store, user, quadratics.id)
        .await
        .unwrap();

    let t = store.get_topic(topic.id).await.unwrap();
    assert!(t.is_completed);
    let s = store.get_subject(subject.id).await.unwrap();
    assert_eq!(s.completed_topics, 1);

    let dash = reports::dashboard(&store, user).await.unwrap();
    assert_eq!(dash.completion_percentage, 100);
    assert!(matches!(dash.next_topic, NextTopic::AllComplete));
    assert_eq!(dash.chart.completed, 1);
    assert_eq!(dash.chart.pending, 0);
    assert_eq!(dash.study_streak, 0);
}

#[tokio::test]
async fn reports_list_five_most_recent_completions() {
    let store = MemStore::default();
    let user = signup(&store, "h@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "CS", None, Some("High"))
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Algorithms", "Hard")
        .await
        .unwrap();
    let mut sub_ids = Vec::new();
    for i in 0..7 {
        let sub = hierarchy::create_subtopic(&store, user, topic.id, &format!("Lesson {i}"))
            .await
            .unwrap();
        sub_ids.push(sub.id);
    }
    for id in &sub_ids {
        hierarchy::toggle_subtopic(&store, user, *id).await.unwrap();
    }

    let report = reports::reports(&store, user).await.unwrap();
    assert_eq!(report.recent_completions.len(), 5);
    assert_eq!(report.subjects.len(), 1);
    assert_eq!(report.subjects[0].progress_percent, 100);
    // most recent first
    assert_eq!(report.recent_completions[0].name, "Lesson 6");
}

#[tokio::test]
async fn subjects_list_orders_by_priority_then_deadline() {
    let store = MemStore::default();
    let user = signup(&store, "i@example.com").await;
    hierarchy::create_subject(&store, user, "Later", Some("2026-06-01"), Some("High"))
        .await
        .unwrap();
    hierarchy::create_subject(&store, user, "Sooner", Some("2026-01-01"), Some("High"))
        .await
        .unwrap();
    hierarchy::create_subject(&store, user, "Background", None, Some("Low"))
        .await
        .unwrap();
    hierarchy::create_subject(&store, user, "Default", None, None)
        .await
        .unwrap();

    let names: Vec<String> = store
        .list_subjects(user)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["Sooner", "Later", "Default", "Background"]);
}

#[tokio::test]
async fn refresh_subject_corrects_external_drift() {
    let store = MemStore::default();
    let user = signup(&store, "j@example.com").await;
    let subject = hierarchy::create_subject(&store, user, "Stats", None, None)
        .await
        .unwrap();
    let topic = hierarchy::create_topic(&store, user, subject.id, "Bayes", "Hard")
        .await
        .unwrap();
    let sub = hierarchy::create_subtopic(&store, user, topic.id, "Priors")
        .await
        .unwrap();

    // drift: complete the subtopic directly in the store, bypassing the rollup
    store
        .set_subtopic_completion(sub.id, true, Some(Utc::now()))
        .await
        .unwrap();
    let stale = store.get_topic(topic.id).await.unwrap();
    assert!(!stale.is_completed);

    progress::refresh_subject(&store, subject.id).await.unwrap();

    let topic = store.get_topic(topic.id).await.unwrap();
    assert!(topic.is_completed);
    assert_eq!(topic.completed_subtopics, 1);
    let subject = store.get_subject(subject.id).await.unwrap();
    assert_eq!(subject.completed_topics, 1);
}
