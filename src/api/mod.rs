use actix_web::web;
use serde::de::DeserializeOwned;

use super::error::{Error, Result};

mod brewery;
mod user;

#[derive(Serialize)]
pub enum ResponseStatus {
    Error,
    Fail,
}

/// Register every `/api` route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/signup", web::post().to(user::signup))
            .route("/signin", web::get().to(user::signin))
            .route("/brewery", web::post().to(brewery::create_brewery))
            .route("/brewery/{id}", web::get().to(brewery::get_brewery))
            .route("/brewery/{id}/beer", web::post().to(brewery::add_beer)),
    );
}

/// Parse a JSON request body. Malformed or missing bodies are validation
/// failures rather than server errors.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::ValidationFailure(format!("invalid request body: {}", e)))
}

/// Unwrap a required form field, treating blank strings as missing.
fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::ValidationFailure(format!("{} is required", field))),
    }
}

/// Record ids are opaque to clients; anything unparsable simply does not exist.
fn parse_id(raw: &str, what: &str) -> Result<i32> {
    raw.parse().map_err(|_| Error::not_found(what, raw))
}
