//! HTTP route handlers.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive the
//! OpenAPI document served under `/api/v1/openapi.json`.

pub mod catchers;
pub mod health;
pub mod import;
