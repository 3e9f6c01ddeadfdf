//! # lp-api
//!
//! REST API for the lab request portal.
//!
//! Every route lives under `/api` and answers with a JSON envelope:
//! `{"success": true, "data": ...}` on success and
//! `{"success": false, "error": ..., "code": ...}` on failure.

pub mod dto;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{ApiDoc, ApiServer, ApiServerConfig};
pub use state::AppState;
