//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_tracker_core::domain::{Subtopic, Topic};
use study_tracker_core::hierarchy::{self, EntityRef};
use study_tracker_core::{progress, reports, TrackerError};
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        list_subjects_handler,
        create_subject_handler,
        subject_detail_handler,
        delete_subject_handler,
        create_topic_handler,
        topic_detail_handler,
        create_subtopic_handler,
        toggle_subtopic_handler,
        dashboard_handler,
        reports_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            CreateSubjectRequest,
            CreateTopicRequest,
            CreateSubtopicRequest,
            SubjectResponse,
            SubjectDetailResponse,
            TopicResponse,
            TopicDetailResponse,
            SubtopicResponse,
        )
    ),
    tags(
        (name = "Study Tracker API", description = "API endpoints for tracking study progress across subjects, topics, and subtopics.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSubjectRequest {
    pub name: String,
    /// Optional deadline in `YYYY-MM-DD` format.
    pub deadline: Option<String>,
    /// Low, Medium, or High. Defaults to Medium.
    pub priority: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTopicRequest {
    pub name: String,
    pub difficulty: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSubtopicRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct SubjectResponse {
    pub id: Uuid,
    pub name: String,
    pub deadline: Option<String>,
    pub priority: String,
    pub total_topics: i32,
    pub completed_topics: i32,
    pub progress_percent: i32,
}

impl From<&study_tracker_core::Subject> for SubjectResponse {
    fn from(s: &study_tracker_core::Subject) -> Self {
        SubjectResponse {
            id: s.id,
            name: s.name.clone(),
            deadline: s.deadline.map(|d| d.to_string()),
            priority: s.priority.as_str().to_string(),
            total_topics: s.total_topics,
            completed_topics: s.completed_topics,
            progress_percent: reports::percent(s.completed_topics, s.total_topics),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TopicResponse {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub name: String,
    pub difficulty: String,
    pub total_subtopics: i32,
    pub completed_subtopics: i32,
    pub is_completed: bool,
}

impl From<Topic> for TopicResponse {
    fn from(t: Topic) -> Self {
        TopicResponse {
            id: t.id,
            subject_id: t.subject_id,
            name: t.name,
            difficulty: t.difficulty,
            total_subtopics: t.total_subtopics,
            completed_subtopics: t.completed_subtopics,
            is_completed: t.is_completed,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubtopicResponse {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub name: String,
    pub is_completed: bool,
    pub date_completed: Option<String>,
}

impl From<Subtopic> for SubtopicResponse {
    fn from(s: Subtopic) -> Self {
        SubtopicResponse {
            id: s.id,
            topic_id: s.topic_id,
            name: s.name,
            is_completed: s.is_completed,
            date_completed: s.date_completed.map(|d| d.to_rfc3339()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubjectDetailResponse {
    #[serde(flatten)]
    pub subject: SubjectResponse,
    pub topics: Vec<TopicResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct TopicDetailResponse {
    #[serde(flatten)]
    pub topic: TopicResponse,
    pub subtopics: Vec<SubtopicResponse>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps core errors to HTTP responses. NotFound and AccessDenied share one
/// message so a request cannot probe whether a foreign id exists.
fn error_response(e: TrackerError) -> (StatusCode, String) {
    match e {
        TrackerError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        TrackerError::NotFound | TrackerError::AccessDenied => (
            StatusCode::NOT_FOUND,
            "Not found or access denied".to_string(),
        ),
        TrackerError::Persistence(msg) => {
            error!("Store failure: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            )
        }
    }
}

//=========================================================================================
// Subject Handlers
//=========================================================================================

/// List the user's subjects, priority-descending then deadline-ascending.
#[utoipa::path(
    get,
    path = "/subjects",
    responses(
        (status = 200, description = "Subjects owned by the user", body = [SubjectResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_subjects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subjects = state
        .store
        .list_subjects(user_id)
        .await
        .map_err(|e| error_response(e.into()))?;
    let payload: Vec<SubjectResponse> = subjects.iter().map(SubjectResponse::from).collect();
    Ok(Json(payload))
}

/// Create a new subject.
#[utoipa::path(
    post,
    path = "/subjects",
    request_body = CreateSubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectResponse),
        (status = 400, description = "Missing name or malformed deadline/priority"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = hierarchy::create_subject(
        state.store.as_ref(),
        user_id,
        &req.name,
        req.deadline.as_deref(),
        req.priority.as_deref(),
    )
    .await
    .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(SubjectResponse::from(&subject))))
}

/// Subject detail view with its topics.
///
/// Selecting a subject re-runs the rollup first, so counters drifted by
/// out-of-band store edits come back consistent.
#[utoipa::path(
    get,
    path = "/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Subject with topics", body = SubjectDetailResponse),
        (status = 404, description = "Not found or access denied")
    )
)]
pub async fn subject_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let store = state.store.as_ref();
    hierarchy::authorize(store, user_id, EntityRef::Subject(id))
        .await
        .map_err(error_response)?;
    progress::refresh_subject(store, id)
        .await
        .map_err(error_response)?;

    let subject = store
        .get_subject(id)
        .await
        .map_err(|e| error_response(e.into()))?;
    let topics = store
        .list_topics(id)
        .await
        .map_err(|e| error_response(e.into()))?;

    Ok(Json(SubjectDetailResponse {
        subject: SubjectResponse::from(&subject),
        topics: topics.into_iter().map(TopicResponse::from).collect(),
    }))
}

/// Delete a subject and its whole subtree.
#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses(
        (status = 204, description = "Subject and all descendants deleted"),
        (status = 404, description = "Not found or access denied"),
        (status = 500, description = "Cascade failed and was rolled back")
    )
)]
pub async fn delete_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    hierarchy::delete_subject(state.store.as_ref(), user_id, id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Topic and Subtopic Handlers
//=========================================================================================

/// Add a topic to an owned subject.
#[utoipa::path(
    post,
    path = "/subjects/{id}/topics",
    params(("id" = Uuid, Path, description = "Subject id")),
    request_body = CreateTopicRequest,
    responses(
        (status = 201, description = "Topic created", body = TopicResponse),
        (status = 400, description = "Missing name"),
        (status = 404, description = "Not found or access denied")
    )
)]
pub async fn create_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic = hierarchy::create_topic(
        state.store.as_ref(),
        user_id,
        id,
        &req.name,
        req.difficulty.as_deref().unwrap_or(""),
    )
    .await
    .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(TopicResponse::from(topic))))
}

/// Topic detail view with its subtopics.
#[utoipa::path(
    get,
    path = "/topics/{id}",
    params(("id" = Uuid, Path, description = "Topic id")),
    responses(
        (status = 200, description = "Topic with subtopics", body = TopicDetailResponse),
        (status = 404, description = "Not found or access denied")
    )
)]
pub async fn topic_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let store = state.store.as_ref();
    hierarchy::authorize(store, user_id, EntityRef::Topic(id))
        .await
        .map_err(error_response)?;

    let topic = store
        .get_topic(id)
        .await
        .map_err(|e| error_response(e.into()))?;
    let subtopics = store
        .list_subtopics(id)
        .await
        .map_err(|e| error_response(e.into()))?;

    Ok(Json(TopicDetailResponse {
        topic: TopicResponse::from(topic),
        subtopics: subtopics.into_iter().map(SubtopicResponse::from).collect(),
    }))
}

/// Add a subtopic to an owned topic.
#[utoipa::path(
    post,
    path = "/topics/{id}/subtopics",
    params(("id" = Uuid, Path, description = "Topic id")),
    request_body = CreateSubtopicRequest,
    responses(
        (status = 201, description = "Subtopic created", body = SubtopicResponse),
        (status = 400, description = "Missing name"),
        (status = 404, description = "Not found or access denied")
    )
)]
pub async fn create_subtopic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateSubtopicRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subtopic = hierarchy::create_subtopic(state.store.as_ref(), user_id, id, &req.name)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(SubtopicResponse::from(subtopic))))
}

/// Toggle a subtopic between Pending and Completed.
#[utoipa::path(
    post,
    path = "/subtopics/{id}/toggle",
    params(("id" = Uuid, Path, description = "Subtopic id")),
    responses(
        (status = 200, description = "Updated subtopic", body = SubtopicResponse),
        (status = 404, description = "Not found or access denied")
    )
)]
pub async fn toggle_subtopic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subtopic = hierarchy::toggle_subtopic(state.store.as_ref(), user_id, id)
        .await
        .map_err(error_response)?;
    Ok(Json(SubtopicResponse::from(subtopic)))
}

//=========================================================================================
// Dashboard and Reports Handlers
//=========================================================================================

/// Dashboard payload: ordered subjects, rollup totals, completion
/// percentage, next recommended topic, and chart-ready counts.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard payload"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let dashboard = reports::dashboard(state.store.as_ref(), user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(dashboard))
}

/// Reports payload: per-subject progress percentages and the five most
/// recently completed subtopics.
#[utoipa::path(
    get,
    path = "/reports",
    responses(
        (status = 200, description = "Reports payload"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn reports_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = reports::reports(state.store.as_ref(), user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}
