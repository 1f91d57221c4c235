//! HTTP surface: submission form, wall, and a small JSON API.
//!
//! Routes:
//! - `GET /` submission form
//! - `GET /wall` read-only feed
//! - `POST /api/submit` store a request, then relay it best-effort
//! - `GET /api/requests` JSON feed
//! - `GET /api/health` liveness plus channel state

pub mod pages;
pub mod server;
pub mod state;
pub mod submit;

pub use {
    server::{build_app, start_server},
    state::AppState,
};
