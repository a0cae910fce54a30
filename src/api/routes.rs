//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

/// Build the `/api/v1` router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        // Studies
        .route("/studies", post(handlers::studies::create_study))
        .route("/studies", get(handlers::studies::list_studies))
        .route("/studies/:id", get(handlers::studies::get_study))
        .route("/studies/:id", axum::routing::patch(handlers::studies::update_study))
        .route("/studies/:id", axum::routing::delete(handlers::studies::delete_study))
        // Tasks (reorder before the parameterized task route for clarity)
        .route("/studies/:id/tasks", post(handlers::tasks::create_task))
        .route("/studies/:id/tasks", get(handlers::tasks::list_tasks))
        .route("/studies/:id/tasks/reorder", post(handlers::tasks::reorder_tasks))
        .route("/tasks/:id", get(handlers::tasks::get_task))
        .route("/tasks/:id", axum::routing::patch(handlers::tasks::update_task))
        .route("/tasks/:id", axum::routing::delete(handlers::tasks::delete_task))
        // Participants
        .route("/studies/:id/participants", post(handlers::participants::enroll_participant))
        .route("/studies/:id/participants", get(handlers::participants::list_participants))
        .route("/studies/:id/participants/bulk", post(handlers::participants::bulk_enroll))
        .route("/participants/:id", get(handlers::participants::get_participant))
        .route("/participants/:id", axum::routing::patch(handlers::participants::update_participant))
        .route("/participants/:id", axum::routing::delete(handlers::participants::delete_participant))
        .route("/participants/:id/transition", post(handlers::participants::transition_participant))
        // Responses
        .route("/responses", post(handlers::responses::submit_response))
        .route("/responses", get(handlers::responses::list_responses))
        // Analysis
        .route("/analysis/responses/:id", post(handlers::analysis::analyze_response))
        .route("/analysis/studies/:id", post(handlers::analysis::synthesize_study))
        .route("/analysis/studies/:id", get(handlers::analysis::get_synthesis))
        // Health
        .route("/health", get(handlers::health::health))
        .with_state(state)
}
