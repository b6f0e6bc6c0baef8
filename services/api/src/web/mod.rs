pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers the server binary wires into the router.
pub use middleware::require_auth;
pub use rest::{
    create_subject_handler, create_subtopic_handler, create_topic_handler, dashboard_handler,
    delete_subject_handler, list_subjects_handler, reports_handler, subject_detail_handler,
    toggle_subtopic_handler, topic_detail_handler,
};
