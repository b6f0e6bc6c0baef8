//! crates/study_tracker_core/src/reports.rs
//!
//! Assembles the dashboard and reports payloads from the aggregator's
//! outputs. These are read-only views; nothing here mutates the store.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Priority, Subject};
use crate::error::TrackerResult;
use crate::ports::StudyStore;

/// Integer completion percentage, 0 when there is nothing to count.
pub fn percent(completed: i32, total: i32) -> i32 {
    if total <= 0 {
        0
    } else {
        completed * 100 / total
    }
}

//=========================================================================================
// Payload Types
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SubjectSummary {
    pub id: Uuid,
    pub name: String,
    pub deadline: Option<String>,
    pub priority: Priority,
    pub total_topics: i32,
    pub completed_topics: i32,
    pub progress_percent: i32,
}

impl From<&Subject> for SubjectSummary {
    fn from(s: &Subject) -> Self {
        SubjectSummary {
            id: s.id,
            name: s.name.clone(),
            deadline: s.deadline.map(|d| d.to_string()),
            priority: s.priority,
            total_topics: s.total_topics,
            completed_topics: s.completed_topics,
            progress_percent: percent(s.completed_topics, s.total_topics),
        }
    }
}

/// The "next recommended topic": the first incomplete topic in
/// subject-then-topic order, or a sentinel when everything is done.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextTopic {
    Topic {
        subject_id: Uuid,
        subject_name: String,
        topic_id: Uuid,
        topic_name: String,
    },
    AllComplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartCounts {
    pub completed: i32,
    pub pending: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub subjects: Vec<SubjectSummary>,
    pub total_subjects: usize,
    pub total_topics: i32,
    pub completed_topics: i32,
    pub completion_percentage: i32,
    pub next_topic: NextTopic,
    pub chart: ChartCounts,
    /// Streak computation is a placeholder; always zero for now.
    pub study_streak: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectProgress {
    pub id: Uuid,
    pub name: String,
    pub progress_percent: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentSubtopic {
    pub id: Uuid,
    pub name: String,
    pub topic_name: String,
    pub subject_name: String,
    pub date_completed: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reports {
    pub subjects: Vec<SubjectProgress>,
    pub recent_completions: Vec<RecentSubtopic>,
}

//=========================================================================================
// Assembly
//=========================================================================================

/// Builds the dashboard payload from the user's subjects, in the store's
/// priority-then-deadline order.
pub async fn dashboard(store: &dyn StudyStore, user_id: Uuid) -> TrackerResult<Dashboard> {
    let subjects = store.list_subjects(user_id).await?;

    let total_topics: i32 = subjects.iter().map(|s| s.total_topics).sum();
    let completed_topics: i32 = subjects.iter().map(|s| s.completed_topics).sum();

    let mut next_topic = NextTopic::AllComplete;
    'outer: for subject in &subjects {
        let topics = store.list_topics(subject.id).await?;
        for topic in topics {
            if !topic.is_completed {
                next_topic = NextTopic::Topic {
                    subject_id: subject.id,
                    subject_name: subject.name.clone(),
                    topic_id: topic.id,
                    topic_name: topic.name,
                };
                break 'outer;
            }
        }
    }

    Ok(Dashboard {
        total_subjects: subjects.len(),
        total_topics,
        completed_topics,
        completion_percentage: percent(completed_topics, total_topics),
        next_topic,
        chart: ChartCounts {
            completed: completed_topics,
            pending: total_topics - completed_topics,
        },
        study_streak: 0,
        subjects: subjects.iter().map(SubjectSummary::from).collect(),
    })
}

/// Builds the reports payload: per-subject progress plus the five most
/// recently completed subtopics across all owned subjects.
pub async fn reports(store: &dyn StudyStore, user_id: Uuid) -> TrackerResult<Reports> {
    let subjects = store.list_subjects(user_id).await?;
    let recent = store.recently_completed_subtopics(user_id, 5).await?;

    Ok(Reports {
        subjects: subjects
            .iter()
            .map(|s| SubjectProgress {
                id: s.id,
                name: s.name.clone(),
                progress_percent: percent(s.completed_topics, s.total_topics),
            })
            .collect(),
        recent_completions: recent
            .into_iter()
            .map(|r| RecentSubtopic {
                id: r.subtopic_id,
                name: r.name,
                topic_name: r.topic_name,
                subject_name: r.subject_name,
                date_completed: r.date_completed.to_rfc3339(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_guards_against_empty_totals() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(2, 2), 100);
        assert_eq!(percent(1, 3), 33);
    }
}
