//! API routes.

pub mod backup;
pub mod capabilities;
pub mod equipment;
pub mod health;
pub mod ios;
pub mod locations;
pub mod requests;
pub mod samples;
pub mod test_methods;
pub mod users;

use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;

/// Creates the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(health::routes())
        .fallback(not_found)
        .with_state(state)
}

/// Routes under the /api prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/capabilities", capabilities::routes())
        .nest("/locations", locations::routes())
        .nest("/equipment", equipment::routes())
        .nest("/test-methods", test_methods::routes())
        .nest("/users", users::routes())
        .nest("/ios", ios::routes())
        .nest("/requests", requests::routes())
        .nest("/samples", samples::routes())
        .nest("/backup", backup::routes())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
