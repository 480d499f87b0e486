//! JSON bodies for requests that never reach a handler.

use rocket::Request;
use rocket::serde::json::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CatcherResponse {
    pub error: &'static str,
    pub message: String,
}

fn body(error: &'static str, message: impl Into<String>) -> Json<CatcherResponse> {
    Json(CatcherResponse {
        error,
        message: message.into(),
    })
}

#[catch(401)]
pub fn unauthorized() -> Json<CatcherResponse> {
    body("Unauthorized", "A valid bearer token is required")
}

#[catch(403)]
pub fn forbidden() -> Json<CatcherResponse> {
    body("Forbidden", "Admin role required")
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<CatcherResponse> {
    body("NotFound", format!("No route for {}", request.uri()))
}

#[catch(500)]
pub fn internal_error() -> Json<CatcherResponse> {
    body("InternalError", "Internal server error")
}

pub fn all() -> Vec<rocket::Catcher> {
    catchers![unauthorized, forbidden, not_found, internal_error]
}
